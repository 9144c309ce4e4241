use {
    async_trait::async_trait,
    sqlx::{QueryBuilder, Sqlite, SqlitePool},
    tracing::debug,
};

use {
    leadline_channels::{
        Direction, Error, InsertOutcome, Message, MessageFilter, MessageStats, MessageStore,
        NewMessage, Page, Result, ThreadKey, ThreadRow,
    },
    leadline_common::now_epoch,
};

/// SQLite-backed message store.
///
/// Writes are INSERT OR IGNORE keyed on the external `message_id`, so a
/// redelivered message is a no-op reported as a duplicate, never an error.
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

/// Column order shared by every full-row select.
const MESSAGE_COLUMNS: &str = "message_id, phone, lead_id, outgoing, direction, message_text, \
                               has_media, media_path, is_viewed, viewed_at, timestamp, received_at";

type MessageRow = (
    String,
    String,
    Option<String>,
    bool,
    String,
    String,
    bool,
    Option<String>,
    bool,
    Option<i64>,
    i64,
    i64,
);

fn row_to_message(r: MessageRow) -> Message {
    let outgoing = r.3;
    Message {
        message_id: r.0,
        phone: r.1,
        lead_id: r.2,
        outgoing,
        direction: Direction::parse(&r.4).unwrap_or(if outgoing {
            Direction::Outbound
        } else {
            Direction::Inbound
        }),
        message_text: r.5,
        has_media: r.6,
        media_path: r.7,
        is_viewed: r.8,
        viewed_at: r.9,
        timestamp: r.10,
        received_at: r.11,
    }
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the messages table schema.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id   TEXT    NOT NULL UNIQUE,
                phone        TEXT    NOT NULL,
                lead_id      TEXT,
                outgoing     INTEGER NOT NULL DEFAULT 0,
                direction    TEXT    NOT NULL,
                message_text TEXT    NOT NULL,
                has_media    INTEGER NOT NULL DEFAULT 0,
                media_path   TEXT,
                is_viewed    INTEGER NOT NULL DEFAULT 0,
                viewed_at    INTEGER,
                timestamp    INTEGER NOT NULL,
                received_at  INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| Error::external("create messages table", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_phone_ts
             ON messages (phone, timestamp DESC)",
        )
        .execute(pool)
        .await
        .map_err(|e| Error::external("create phone index", e))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_lead ON messages (lead_id)")
            .execute(pool)
            .await
            .map_err(|e| Error::external("create lead index", e))?;

        Ok(())
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MessageFilter) {
        qb.push(" WHERE 1 = 1");
        if let Some(phone) = &filter.phone {
            qb.push(" AND phone = ").push_bind(phone.clone());
        }
        if let Some(direction) = filter.direction {
            qb.push(" AND direction = ").push_bind(direction.as_str());
        }
        if let Some(viewed) = filter.is_viewed {
            qb.push(" AND is_viewed = ").push_bind(viewed);
        }
        if let Some(media) = filter.has_media {
            qb.push(" AND has_media = ").push_bind(media);
        }
        if let Some(search) = &filter.search {
            qb.push(" AND message_text LIKE ")
                .push_bind(format!("%{search}%"));
        }
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert(&self, msg: NewMessage) -> Result<InsertOutcome> {
        let direction = msg.direction();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO messages
             (message_id, phone, lead_id, outgoing, direction, message_text,
              has_media, media_path, is_viewed, viewed_at, timestamp, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&msg.message_id)
        .bind(&msg.phone)
        .bind(&msg.lead_id)
        .bind(msg.outgoing)
        .bind(direction.as_str())
        .bind(&msg.message_text)
        .bind(msg.has_media)
        .bind(&msg.media_path)
        .bind(msg.is_viewed)
        .bind(if msg.is_viewed { Some(now_epoch()) } else { None })
        .bind(msg.timestamp)
        .bind(now_epoch())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::external("insert message", e))?;

        if result.rows_affected() == 0 {
            debug!(message_id = %msg.message_id, "duplicate delivery ignored");
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn get(&self, message_id: &str) -> Result<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::external("get message", e))?;

        Ok(row.map(row_to_message))
    }

    async fn list(&self, filter: &MessageFilter, page: Page) -> Result<(Vec<Message>, i64)> {
        let mut count_qb =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) as n FROM messages");
        Self::push_filters(&mut count_qb, filter);
        let (total,): (i64,) = count_qb
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::external("count messages", e))?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages"
        ));
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset()));

        let rows: Vec<MessageRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::external("list messages", e))?;

        Ok((rows.into_iter().map(row_to_message).collect(), total))
    }

    async fn mark_viewed(&self, message_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET is_viewed = 1, viewed_at = ?
             WHERE message_id = ? AND is_viewed = 0",
        )
        .bind(now_epoch())
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::external("mark viewed", e))?;

        // Already-viewed counts as present.
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        Ok(self.get(message_id).await?.is_some())
    }

    async fn mark_thread_viewed(&self, key: &ThreadKey) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "UPDATE messages SET is_viewed = 1, viewed_at = ",
        );
        qb.push_bind(now_epoch());
        qb.push(" WHERE outgoing = 0 AND is_viewed = 0 AND ");
        match key {
            ThreadKey::Lead(id) => {
                qb.push("lead_id = ").push_bind(id.clone());
            },
            ThreadKey::Phone(phone) => {
                qb.push("phone = ").push_bind(phone.clone());
            },
        }

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| Error::external("mark thread viewed", e))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, message_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE message_id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::external("delete message", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<MessageStats> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN direction = 'inbound' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN direction = 'outbound' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_viewed = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN has_media = 1 THEN 1 ELSE 0 END), 0)
             FROM messages",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::external("message stats", e))?;

        Ok(MessageStats {
            total: row.0,
            inbound: row.1,
            outbound: row.2,
            unviewed: row.3,
            with_media: row.4,
        })
    }

    async fn thread_rows(&self) -> Result<Vec<ThreadRow>> {
        // Group by lead when resolvable, canonical phone otherwise. The
        // representative is the chronologically latest message (insertion
        // order breaks timestamp ties).
        let groups: Vec<(Option<String>, i64, i64, String)> = sqlx::query_as(
            "SELECT lead_id,
                    COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN outgoing = 0 AND is_viewed = 0 THEN 1 ELSE 0 END), 0)
                        AS unread,
                    (SELECT m2.message_id FROM messages m2
                      WHERE COALESCE('lead:' || m2.lead_id, 'phone:' || m2.phone)
                          = COALESCE('lead:' || messages.lead_id, 'phone:' || messages.phone)
                      ORDER BY m2.timestamp DESC, m2.id DESC LIMIT 1) AS last_id
             FROM messages
             GROUP BY COALESCE('lead:' || lead_id, 'phone:' || phone)",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::external("thread groups", e))?;

        let mut rows = Vec::with_capacity(groups.len());
        for (lead_id, total, unread, last_id) in groups {
            let Some(last) = self.get(&last_id).await? else {
                continue;
            };
            let key = match &lead_id {
                Some(id) => ThreadKey::Lead(id.clone()),
                None => ThreadKey::Phone(last.phone.clone()),
            };
            rows.push(ThreadRow {
                key,
                phone: last.phone.clone(),
                lead_id,
                total_messages: total,
                unread_count: unread,
                last_message: last,
            });
        }
        Ok(rows)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteMessageStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteMessageStore::init(&pool).await.unwrap();
        SqliteMessageStore::new(pool)
    }

    fn inbound(message_id: &str, phone: &str, text: &str, ts: i64) -> NewMessage {
        NewMessage {
            message_id: message_id.into(),
            phone: phone.into(),
            lead_id: None,
            outgoing: false,
            message_text: text.into(),
            has_media: false,
            media_path: None,
            is_viewed: false,
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_is_a_noop() {
        let store = test_store().await;
        let msg = inbound("wamid.1", "9876543210", "hi", 100);

        assert_eq!(store.insert(msg.clone()).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(msg).await.unwrap(), InsertOutcome::Duplicate);

        let (_, total) = store
            .list(&MessageFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn list_filters_compose() {
        let store = test_store().await;
        store.insert(inbound("m1", "111", "hello there", 1)).await.unwrap();
        store.insert(inbound("m2", "222", "pricing please", 2)).await.unwrap();
        let mut out = inbound("m3", "111", "reply", 3);
        out.outgoing = true;
        out.is_viewed = true;
        store.insert(out).await.unwrap();

        let (msgs, total) = store
            .list(
                &MessageFilter {
                    phone: Some("111".into()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(total, 2);
        // Newest first.
        assert_eq!(msgs[0].message_id, "m3");

        let (msgs, _) = store
            .list(
                &MessageFilter {
                    direction: Some(Direction::Inbound),
                    search: Some("pricing".into()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].message_id, "m2");
    }

    #[tokio::test]
    async fn pagination_windows() {
        let store = test_store().await;
        for i in 0..5 {
            store
                .insert(inbound(&format!("m{i}"), "111", "x", i))
                .await
                .unwrap();
        }

        let (msgs, total) = store
            .list(&MessageFilter::default(), Page { page: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].message_id, "m2");
    }

    #[tokio::test]
    async fn mark_viewed_flips_once() {
        let store = test_store().await;
        store.insert(inbound("m1", "111", "hi", 1)).await.unwrap();

        assert!(store.mark_viewed("m1").await.unwrap());
        let msg = store.get("m1").await.unwrap().unwrap();
        assert!(msg.is_viewed);
        assert!(msg.viewed_at.is_some());

        // Second mark is still success (message exists).
        assert!(store.mark_viewed("m1").await.unwrap());
        assert!(!store.mark_viewed("missing").await.unwrap());
    }

    #[tokio::test]
    async fn mark_thread_viewed_by_phone() {
        let store = test_store().await;
        store.insert(inbound("m1", "111", "a", 1)).await.unwrap();
        store.insert(inbound("m2", "111", "b", 2)).await.unwrap();
        store.insert(inbound("m3", "222", "c", 3)).await.unwrap();

        let flipped = store
            .mark_thread_viewed(&ThreadKey::Phone("111".into()))
            .await
            .unwrap();
        assert_eq!(flipped, 2);

        let rows = store.thread_rows().await.unwrap();
        let t111 = rows.iter().find(|r| r.phone == "111").unwrap();
        assert_eq!(t111.unread_count, 0);
    }

    #[tokio::test]
    async fn threads_group_by_lead_across_phones() {
        let store = test_store().await;
        let mut a = inbound("m1", "9876543210", "with cc", 1);
        a.lead_id = Some("lead-7".into());
        let mut b = inbound("m2", "09876543210", "without cc", 2);
        b.lead_id = Some("lead-7".into());
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        let rows = store.thread_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, ThreadKey::Lead("lead-7".into()));
        assert_eq!(rows[0].total_messages, 2);
        assert_eq!(rows[0].unread_count, 2);
        assert_eq!(rows[0].last_message.message_id, "m2");
    }

    #[tokio::test]
    async fn stats_count_by_axis() {
        let store = test_store().await;
        store.insert(inbound("m1", "111", "a", 1)).await.unwrap();
        let mut media = inbound("m2", "111", "pic", 2);
        media.has_media = true;
        media.media_path = Some("image/1.jpg".into());
        store.insert(media).await.unwrap();
        let mut out = inbound("m3", "111", "r", 3);
        out.outgoing = true;
        out.is_viewed = true;
        store.insert(out).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.inbound, 2);
        assert_eq!(stats.outbound, 1);
        assert_eq!(stats.unviewed, 2);
        assert_eq!(stats.with_media, 1);
    }

    #[tokio::test]
    async fn delete_is_explicit() {
        let store = test_store().await;
        store.insert(inbound("m1", "111", "a", 1)).await.unwrap();
        assert!(store.delete("m1").await.unwrap());
        assert!(!store.delete("m1").await.unwrap());
        assert!(store.get("m1").await.unwrap().is_none());
    }
}
