//! Thread aggregation: turn the flat message log into paginated,
//! visibility-filtered conversation summaries.
//!
//! Threads are derived, never stored. Every query regroups the log, joins
//! leads and officers through the external directory capabilities, applies
//! officer-visibility filtering, re-sorts (the join can reorder groups) and
//! paginates. Unread summary counts always cover the whole filtered set,
//! not just the page.

use std::sync::Arc;

use {serde::Serialize, tracing::debug};

use leadline_channels::{
    Caller, Lead, LeadDirectory, Message, MessageStore, Officer, OfficerDirectory, Page, Result,
    ThreadKey, ThreadRow,
};

/// One conversation summary, ready for the API surface.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub key: ThreadKey,
    pub phone: String,
    pub last_message: Message,
    pub unread_count: i64,
    pub total_messages: i64,
    pub lead: Option<Lead>,
    pub officer: Option<Officer>,
}

/// Listing parameters.
#[derive(Debug, Clone, Default)]
pub struct ThreadQuery {
    pub unread_only: bool,
    /// Case-insensitive match over phone, last message text and lead name.
    pub search: Option<String>,
    /// Explicit single-officer filter; overrides caller-based visibility
    /// entirely, including for non-admin callers.
    pub officer_id: Option<String>,
    pub page: Page,
}

/// One page of threads plus whole-set summary counts.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadPage {
    pub threads: Vec<ThreadSummary>,
    pub total: i64,
    pub unread_conversations: i64,
    pub unread_messages: i64,
}

/// Recomputes conversation threads from the message log on demand.
pub struct ThreadAggregator {
    store: Arc<dyn MessageStore>,
    leads: Arc<dyn LeadDirectory>,
    officers: Arc<dyn OfficerDirectory>,
}

impl ThreadAggregator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        leads: Arc<dyn LeadDirectory>,
        officers: Arc<dyn OfficerDirectory>,
    ) -> Self {
        Self {
            store,
            leads,
            officers,
        }
    }

    /// List threads visible to `caller`.
    pub async fn list(&self, caller: &Caller, query: &ThreadQuery) -> Result<ThreadPage> {
        let rows = self.store.thread_rows().await?;
        debug!(groups = rows.len(), "aggregating threads");

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            if query.unread_only && row.unread_count == 0 {
                continue;
            }
            let summary = self.join(row).await?;
            if !matches_search(&summary, query.search.as_deref()) {
                continue;
            }
            if visible_to(caller, query.officer_id.as_deref(), &summary) {
                summaries.push(summary);
            }
        }

        // The lead/officer join can reorder groups relative to the log scan;
        // re-sort by latest-message time before pagination.
        summaries.sort_by(|a, b| {
            b.last_message
                .timestamp
                .cmp(&a.last_message.timestamp)
                .then(b.last_message.received_at.cmp(&a.last_message.received_at))
        });

        let unread_conversations = summaries.iter().filter(|t| t.unread_count > 0).count() as i64;
        let unread_messages: i64 = summaries.iter().map(|t| t.unread_count).sum();
        let total = summaries.len() as i64;

        let start = query.page.offset() as usize;
        let threads: Vec<ThreadSummary> = summaries
            .into_iter()
            .skip(start)
            .take(query.page.limit as usize)
            .collect();

        Ok(ThreadPage {
            threads,
            total,
            unread_conversations,
            unread_messages,
        })
    }

    /// Join one group to its lead and, through the lead's assignment, to
    /// officer identity.
    async fn join(&self, row: ThreadRow) -> Result<ThreadSummary> {
        let lead = match &row.lead_id {
            Some(id) => self.leads.get(id).await?,
            None => self.leads.find_by_phone(&row.phone).await?,
        };
        let officer = match lead.as_ref().and_then(|l| l.assigned_officer.as_deref()) {
            Some(officer_id) => self.officers.get(officer_id).await?,
            None => None,
        };

        Ok(ThreadSummary {
            key: row.key,
            phone: row.phone,
            last_message: row.last_message,
            unread_count: row.unread_count,
            total_messages: row.total_messages,
            lead,
            officer,
        })
    }
}

fn matches_search(summary: &ThreadSummary, search: Option<&str>) -> bool {
    let Some(needle) = search else {
        return true;
    };
    let needle = needle.to_lowercase();
    if summary.phone.contains(&needle)
        || summary
            .last_message
            .message_text
            .to_lowercase()
            .contains(&needle)
    {
        return true;
    }
    summary
        .lead
        .as_ref()
        .is_some_and(|l| l.name.to_lowercase().contains(&needle))
}

/// Officer-visibility decision for one joined group.
///
/// An explicit officer filter overrides caller-based filtering entirely.
/// Otherwise admins see everything; non-admins see only groups assigned to
/// themselves or one of their linked officers. Orphan groups (no resolvable
/// lead, hence no officer) are admin-only.
fn visible_to(caller: &Caller, officer_filter: Option<&str>, summary: &ThreadSummary) -> bool {
    let assigned = summary
        .lead
        .as_ref()
        .and_then(|l| l.assigned_officer.as_deref());

    if let Some(filter) = officer_filter {
        return assigned == Some(filter);
    }
    if caller.is_admin {
        return true;
    }
    match assigned {
        Some(officer_id) => caller.officer_scope().contains(&officer_id),
        // Orphan: nothing to match a non-admin caller against.
        None => false,
    }
}
