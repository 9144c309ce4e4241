//! SQLite-backed CRM directory tables.
//!
//! Leads, officers, products and bookings live in the CRM's own schema;
//! this store reads (and, for bookings, writes) the slices the chat side
//! needs. Rows are seeded/maintained by the CRM, not by this service,
//! except bookings created through the auto-reply flow.

use {async_trait::async_trait, sqlx::SqlitePool};

use leadline_channels::{
    Booking, BookingDirectory, Error, Lead, LeadDirectory, Officer, OfficerDirectory, Product,
    ProductCatalog, Result,
};

pub struct SqliteDirectory {
    pool: SqlitePool,
}

type LeadRow = (String, String, String, Option<String>);
type BookingRow = (String, String, String, String);

fn lead_from(row: LeadRow) -> Lead {
    Lead {
        id: row.0,
        name: row.1,
        phone: row.2,
        assigned_officer: row.3,
    }
}

fn booking_from(row: BookingRow) -> Booking {
    Booking {
        id: row.0,
        phone: row.1,
        product_name: row.2,
        status: row.3,
    }
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS leads (
                id               TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                phone            TEXT NOT NULL,
                assigned_officer TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS officers (
                id   TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                price       REAL NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id           TEXT PRIMARY KEY,
                phone        TEXT NOT NULL,
                product_name TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'pending'
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_leads_phone ON leads(phone)",
            "CREATE INDEX IF NOT EXISTS idx_bookings_phone ON bookings(phone)",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| Error::external("create directory tables", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LeadDirectory for SqliteDirectory {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>> {
        let row: Option<LeadRow> = sqlx::query_as(
            "SELECT id, name, phone, assigned_officer FROM leads WHERE phone = ? LIMIT 1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::external("find lead by phone", e))?;
        Ok(row.map(lead_from))
    }

    async fn get(&self, lead_id: &str) -> Result<Option<Lead>> {
        let row: Option<LeadRow> =
            sqlx::query_as("SELECT id, name, phone, assigned_officer FROM leads WHERE id = ?")
                .bind(lead_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::external("get lead", e))?;
        Ok(row.map(lead_from))
    }
}

#[async_trait]
impl OfficerDirectory for SqliteDirectory {
    async fn get(&self, officer_id: &str) -> Result<Option<Officer>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM officers WHERE id = ?")
                .bind(officer_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::external("get officer", e))?;
        Ok(row.map(|(id, name)| Officer { id, name }))
    }
}

#[async_trait]
impl ProductCatalog for SqliteDirectory {
    async fn list(&self) -> Result<Vec<Product>> {
        let rows: Vec<(String, String, f64, String)> =
            sqlx::query_as("SELECT id, name, price, description FROM products ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::external("list products", e))?;
        Ok(rows
            .into_iter()
            .map(|(id, name, price, description)| Product {
                id,
                name,
                price,
                description,
            })
            .collect())
    }
}

#[async_trait]
impl BookingDirectory for SqliteDirectory {
    async fn find_by_id(&self, booking_id: &str) -> Result<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as("SELECT id, phone, product_name, status FROM bookings WHERE id = ?")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::external("get booking", e))?;
        Ok(row.map(booking_from))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT id, phone, product_name, status FROM bookings WHERE phone = ? ORDER BY id",
        )
        .bind(phone)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::external("list bookings by phone", e))?;
        Ok(rows.into_iter().map(booking_from).collect())
    }

    async fn create(&self, phone: &str, product_id: &str) -> Result<Booking> {
        let product: Option<(String,)> =
            sqlx::query_as("SELECT name FROM products WHERE id = ?")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::external("resolve booked product", e))?;
        let Some((product_name,)) = product else {
            return Err(Error::not_found(format!("product {product_id}")));
        };

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::external("count bookings", e))?;
        let id = format!("bk-{}", 1000 + count.0 + 1);

        sqlx::query(
            "INSERT INTO bookings (id, phone, product_name, status) VALUES (?, ?, ?, 'pending')",
        )
        .bind(&id)
        .bind(phone)
        .bind(&product_name)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::external("create booking", e))?;

        Ok(Booking {
            id,
            phone: phone.to_string(),
            product_name,
            status: "pending".to_string(),
        })
    }
}
