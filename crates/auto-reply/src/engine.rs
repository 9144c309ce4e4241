//! Keyword rules and short-hand conversational flows.

use std::sync::Arc;

use tracing::debug;

use leadline_channels::{BookingDirectory, Lead, Product, ProductCatalog, Result};

use crate::session::SessionCache;

// Plain rule table, first match wins. Product listing sits between menu
// and booking but needs the catalog, so it is handled inline.
const GREETING: &[&str] = &["hi", "hello", "hey", "good morning", "good afternoon", "good evening"];
const MENU: &[&str] = &["menu", "help", "options"];
const PRODUCTS: &[&str] = &["products", "product", "catalog", "offers"];
const BOOKING: &[&str] = &["book", "booking", "reserve"];
const STATUS: &[&str] = &["status", "track", "tracking"];
const CONTACT: &[&str] = &["contact", "phone", "email", "reach"];
const ABOUT: &[&str] = &["about", "who are you"];
const THANKS: &[&str] = &["thanks", "thank you", "thx"];
const PRICING: &[&str] = &["price", "prices", "pricing", "cost", "rates"];
const FEEDBACK: &[&str] = &["feedback", "complaint", "suggestion"];

pub struct AutoReplyEngine {
    catalog: Arc<dyn ProductCatalog>,
    bookings: Arc<dyn BookingDirectory>,
    sessions: Arc<SessionCache>,
}

impl AutoReplyEngine {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        bookings: Arc<dyn BookingDirectory>,
        sessions: Arc<SessionCache>,
    ) -> Self {
        Self {
            catalog,
            bookings,
            sessions,
        }
    }

    /// Produce a reply for an inbound text, or nothing. No match is
    /// silence, not an error.
    pub async fn reply(
        &self,
        phone: &str,
        lead: Option<&Lead>,
        text: &str,
    ) -> Result<Option<String>> {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(None);
        }

        // Stateful short-hand flows run before the rule table.
        if let Some(reply) = self.shorthand(phone, &normalized).await? {
            debug!(phone, "short-hand auto-reply");
            return Ok(Some(reply));
        }

        if hits(&normalized, GREETING) {
            let name = lead.map(|l| format!(" {}", l.name)).unwrap_or_default();
            return Ok(Some(format!(
                "Hello{name}! Welcome to LeadLine. Reply *menu* to see what I can help with."
            )));
        }
        if hits(&normalized, MENU) {
            return Ok(Some(
                "Here's what I can do:\n\
                 - *products* — see our current offers\n\
                 - *book p<number>* — reserve an item from the list\n\
                 - *my bookings* — your existing bookings\n\
                 - *status* — track a booking\n\
                 - *contact* — reach our team directly"
                    .to_string(),
            ));
        }
        if hits(&normalized, PRODUCTS) {
            return Ok(Some(self.list_products(phone).await?));
        }
        if hits(&normalized, BOOKING) {
            return Ok(Some(
                "To reserve, reply *products* first, then *book p<number>* for the item you want."
                    .to_string(),
            ));
        }
        if hits(&normalized, STATUS) {
            return Ok(Some(
                "Reply with your booking id (e.g. *bk-1042*), or *my bookings* to see them all."
                    .to_string(),
            ));
        }
        if hits(&normalized, CONTACT) {
            return Ok(Some(
                "You can reach our team at +971 4 000 0000 or sales@leadline.example. \
                 An officer will also follow up on this chat."
                    .to_string(),
            ));
        }
        if hits(&normalized, ABOUT) {
            return Ok(Some(
                "LeadLine is the sales desk you are chatting with. Ask about our \
                 *products* or talk to an officer any time."
                    .to_string(),
            ));
        }
        if hits(&normalized, THANKS) {
            return Ok(Some(
                "You're welcome! Anything else, just ask.".to_string(),
            ));
        }
        if hits(&normalized, PRICING) {
            return Ok(Some(
                "Reply *products* to see the current list with prices.".to_string(),
            ));
        }
        if hits(&normalized, FEEDBACK) {
            return Ok(Some(
                "We'd love to hear it. Type your feedback here and our team will read \
                 every word."
                    .to_string(),
            ));
        }

        Ok(None)
    }

    /// Numbered product reference, booking creation, booking lookups.
    async fn shorthand(&self, phone: &str, normalized: &str) -> Result<Option<String>> {
        if let Some(index) = item_ref(normalized) {
            return Ok(Some(self.product_detail(phone, index)));
        }

        if let Some(rest) = normalized.strip_prefix("book ")
            && let Some(index) = item_ref(rest.trim())
        {
            return self.book_item(phone, index).await.map(Some);
        }

        if looks_like_booking_id(normalized) {
            return Ok(Some(match self.bookings.find_by_id(normalized).await? {
                Some(booking) => format!(
                    "Booking {}: {} — {}.",
                    booking.id, booking.product_name, booking.status
                ),
                None => format!("No booking found with id {normalized}."),
            }));
        }

        if normalized == "my bookings" || normalized == "bookings" {
            let bookings = self.bookings.find_by_phone(phone).await?;
            if bookings.is_empty() {
                return Ok(Some(
                    "You have no bookings yet. Reply *products* to get started.".to_string(),
                ));
            }
            let lines: Vec<String> = bookings
                .iter()
                .map(|b| format!("{}: {} — {}", b.id, b.product_name, b.status))
                .collect();
            return Ok(Some(format!("Your bookings:\n{}", lines.join("\n"))));
        }

        Ok(None)
    }

    async fn list_products(&self, phone: &str) -> Result<String> {
        let products = self.catalog.list().await?;
        if products.is_empty() {
            return Ok("No products are available right now. Check back soon!".to_string());
        }

        let lines: Vec<String> = products
            .iter()
            .enumerate()
            .map(|(i, p)| format!("p{}. {} — {:.2}", i + 1, p.name, p.price))
            .collect();
        self.sessions.remember(phone, products);

        Ok(format!(
            "Here's what we offer:\n{}\n\nReply *p<number>* for details, or *book p<number>* to reserve.",
            lines.join("\n")
        ))
    }

    fn product_detail(&self, phone: &str, index: usize) -> String {
        match self.cached_item(phone, index) {
            Some(product) => format!(
                "{} — {:.2}\n{}\n\nReply *book p{index}* to reserve it.",
                product.name, product.price, product.description
            ),
            None => stale_list_nudge(),
        }
    }

    async fn book_item(&self, phone: &str, index: usize) -> Result<String> {
        let Some(product) = self.cached_item(phone, index) else {
            return Ok(stale_list_nudge());
        };
        let booking = self.bookings.create(phone, &product.id).await?;
        Ok(format!(
            "Booking confirmed! Your id is {}.\n{} — {}.",
            booking.id, booking.product_name, booking.status
        ))
    }

    /// 1-based item from this phone's cached list.
    fn cached_item(&self, phone: &str, index: usize) -> Option<Product> {
        let products = self.sessions.recall(phone)?;
        products.get(index.checked_sub(1)?).cloned()
    }
}

fn stale_list_nudge() -> String {
    "That list has expired. Reply *products* to see the current one.".to_string()
}

/// Parse a `p<N>` item reference.
fn item_ref(text: &str) -> Option<usize> {
    let digits = text.strip_prefix('p')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `bk`-prefixed tokens with at least one digit read as booking ids.
fn looks_like_booking_id(text: &str) -> bool {
    !text.contains(' ')
        && text.starts_with("bk")
        && text[2..].chars().any(|c| c.is_ascii_digit())
}

/// Single-word patterns match on word boundaries, phrases on containment.
fn hits(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.contains(' ') {
            text.contains(pattern)
        } else {
            text.split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *pattern)
        }
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {async_trait::async_trait, std::sync::Mutex};

    use {super::*, crate::session::DEFAULT_TTL, leadline_channels::Booking};

    struct StubCatalog(Vec<Product>);

    #[async_trait]
    impl ProductCatalog for StubCatalog {
        async fn list(&self) -> Result<Vec<Product>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct StubBookings {
        created: Mutex<Vec<(String, String)>>,
        known: Vec<Booking>,
    }

    #[async_trait]
    impl BookingDirectory for StubBookings {
        async fn find_by_id(&self, booking_id: &str) -> Result<Option<Booking>> {
            Ok(self.known.iter().find(|b| b.id == booking_id).cloned())
        }

        async fn find_by_phone(&self, phone: &str) -> Result<Vec<Booking>> {
            Ok(self
                .known
                .iter()
                .filter(|b| b.phone == phone)
                .cloned()
                .collect())
        }

        async fn create(&self, phone: &str, product_id: &str) -> Result<Booking> {
            self.created
                .lock()
                .unwrap()
                .push((phone.to_string(), product_id.to_string()));
            Ok(Booking {
                id: "bk-1".into(),
                phone: phone.into(),
                product_name: "Starter Plan".into(),
                status: "pending".into(),
            })
        }
    }

    fn products() -> Vec<Product> {
        vec![
            Product {
                id: "prod-1".into(),
                name: "Starter Plan".into(),
                price: 99.0,
                description: "Entry tier.".into(),
            },
            Product {
                id: "prod-2".into(),
                name: "Pro Plan".into(),
                price: 249.0,
                description: "Everything included.".into(),
            },
        ]
    }

    fn engine_with(bookings: StubBookings) -> (AutoReplyEngine, Arc<SessionCache>) {
        let sessions = Arc::new(SessionCache::new(DEFAULT_TTL));
        let engine = AutoReplyEngine::new(
            Arc::new(StubCatalog(products())),
            Arc::new(bookings),
            sessions.clone(),
        );
        (engine, sessions)
    }

    #[tokio::test]
    async fn hi_triggers_a_greeting() {
        let (engine, _) = engine_with(StubBookings::default());
        let reply = engine.reply("111", None, "hi").await.unwrap().unwrap();
        assert!(reply.starts_with("Hello!"));

        let lead = Lead {
            id: "l1".into(),
            name: "Amira".into(),
            phone: "111".into(),
            assigned_officer: None,
        };
        let reply = engine
            .reply("111", Some(&lead), "Good Morning")
            .await
            .unwrap()
            .unwrap();
        assert!(reply.starts_with("Hello Amira!"));
    }

    #[tokio::test]
    async fn greeting_needs_a_word_boundary() {
        let (engine, _) = engine_with(StubBookings::default());
        // "hi" inside "this" must not greet.
        assert!(
            engine
                .reply("111", None, "this one")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn products_then_p1_details_the_first_item() {
        let (engine, _) = engine_with(StubBookings::default());

        let listing = engine
            .reply("111", None, "products")
            .await
            .unwrap()
            .unwrap();
        assert!(listing.contains("p1. Starter Plan"));
        assert!(listing.contains("p2. Pro Plan"));

        let detail = engine.reply("111", None, "p1").await.unwrap().unwrap();
        assert!(detail.contains("Starter Plan"));
        assert!(detail.contains("Entry tier."));
    }

    #[tokio::test]
    async fn book_p2_creates_a_booking_for_the_cached_item() {
        let bookings = StubBookings::default();
        let (engine, _) = engine_with(bookings);

        engine.reply("111", None, "products").await.unwrap();
        let reply = engine.reply("111", None, "book p2").await.unwrap().unwrap();
        assert!(reply.contains("Booking confirmed"));
        assert!(reply.contains("bk-1"));
    }

    #[tokio::test]
    async fn shorthand_without_a_cached_list_nudges() {
        let (engine, _) = engine_with(StubBookings::default());
        let reply = engine.reply("111", None, "p1").await.unwrap().unwrap();
        assert!(reply.contains("*products*"));
    }

    #[tokio::test]
    async fn booking_id_lookup() {
        let bookings = StubBookings {
            created: Mutex::new(Vec::new()),
            known: vec![Booking {
                id: "bk-1042".into(),
                phone: "111".into(),
                product_name: "Pro Plan".into(),
                status: "confirmed".into(),
            }],
        };
        let (engine, _) = engine_with(bookings);

        let reply = engine.reply("111", None, "bk-1042").await.unwrap().unwrap();
        assert!(reply.contains("confirmed"));

        let reply = engine.reply("111", None, "bk-9999").await.unwrap().unwrap();
        assert!(reply.contains("No booking found"));
    }

    #[tokio::test]
    async fn my_bookings_lists_by_phone() {
        let bookings = StubBookings {
            created: Mutex::new(Vec::new()),
            known: vec![Booking {
                id: "bk-7".into(),
                phone: "111".into(),
                product_name: "Starter Plan".into(),
                status: "pending".into(),
            }],
        };
        let (engine, _) = engine_with(bookings);

        let reply = engine
            .reply("111", None, "my bookings")
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("bk-7"));

        let reply = engine
            .reply("222", None, "my bookings")
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("no bookings yet"));
    }

    #[tokio::test]
    async fn no_match_is_silent() {
        let (engine, _) = engine_with(StubBookings::default());
        assert!(
            engine
                .reply("111", None, "qwerty asdf")
                .await
                .unwrap()
                .is_none()
        );
        assert!(engine.reply("111", None, "   ").await.unwrap().is_none());
    }
}
