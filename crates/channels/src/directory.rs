//! External CRM capabilities the core consumes.
//!
//! Leads, officers, products and bookings are owned by external
//! collaborators; the core only needs lookup-shaped slices of them.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::Result;

/// A prospective-customer record, referenced weakly by phone or id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Officer id this lead is assigned to, if any.
    pub assigned_officer: Option<String>,
}

/// A staff identity with assignment-based visibility scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Officer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub phone: String,
    pub product_name: String,
    pub status: String,
}

/// Lead lookup capability.
#[async_trait]
pub trait LeadDirectory: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>>;
    async fn get(&self, lead_id: &str) -> Result<Option<Lead>>;
}

/// Officer identity lookup capability.
#[async_trait]
pub trait OfficerDirectory: Send + Sync {
    async fn get(&self, officer_id: &str) -> Result<Option<Officer>>;
}

/// Product listing capability consumed by the auto-reply engine.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>>;
}

/// Booking lookup/creation capability consumed by the auto-reply engine.
#[async_trait]
pub trait BookingDirectory: Send + Sync {
    async fn find_by_id(&self, booking_id: &str) -> Result<Option<Booking>>;
    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Booking>>;
    async fn create(&self, phone: &str, product_id: &str) -> Result<Booking>;
}

/// Authenticated caller identity, supplied by the outer HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub is_admin: bool,
    pub officer_id: Option<String>,
    pub linked_officer_ids: Vec<String>,
}

impl Caller {
    #[must_use]
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::default()
        }
    }

    /// All officer identities this caller may act as.
    #[must_use]
    pub fn officer_scope(&self) -> Vec<&str> {
        let mut scope: Vec<&str> = self.officer_id.as_deref().into_iter().collect();
        scope.extend(self.linked_officer_ids.iter().map(String::as_str));
        scope
    }
}
