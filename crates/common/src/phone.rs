//! Canonical phone derivation.
//!
//! Network addresses arrive as `local-part@domain-suffix`
//! (e.g. `919876543210@s.whatsapp.net`). The canonical form is the
//! digit-only local-subscriber number: domain suffix stripped, then a
//! recognized country-code prefix stripped so the same subscriber keys to
//! the same phone whether or not the sender included a country code.

/// Recognized country-code prefixes, longest first.
///
/// Order matters: a longer prefix must be tried before any of its own
/// prefixes (`880` before `88`-ish false positives, `971` before `97`).
const COUNTRY_PREFIXES: &[&str] = &[
    "971", "966", "965", "974", "973", "968", "977", "880", "91", "92", "94", "65", "60", "44",
    "1",
];

/// Minimum digits that must remain after prefix stripping.
///
/// Guards short local numbers from being mangled: stripping only happens
/// when more than this many digits are left.
const MIN_SUBSCRIBER_DIGITS: usize = 6;

/// Reduce a raw network address to its canonical phone key.
///
/// Non-digit characters in the local part are dropped before prefix
/// matching, so `+91 98765-43210` and `919876543210@s.whatsapp.net`
/// canonicalize identically.
pub fn canonical_phone(address: &str) -> String {
    let local = address.split('@').next().unwrap_or(address);
    let digits: String = local.chars().filter(char::is_ascii_digit).collect();

    for prefix in COUNTRY_PREFIXES {
        if let Some(rest) = digits.strip_prefix(prefix)
            && rest.len() > MIN_SUBSCRIBER_DIGITS
        {
            return rest.to_string();
        }
    }

    digits
}

/// True when the address belongs to the broadcast/status pseudo-peer.
pub fn is_broadcast_address(address: &str) -> bool {
    address == "status@broadcast" || address.ends_with("@broadcast")
}

/// True when the address is a group conversation.
pub fn is_group_address(address: &str) -> bool {
    address.ends_with("@g.us")
}

/// True when the sender is the alternate linked-device namespace, which
/// delivers a duplicate copy of the same logical message.
pub fn is_linked_device_address(address: &str) -> bool {
    address.ends_with("@lid")
}
