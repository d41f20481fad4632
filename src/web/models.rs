use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Clone, Debug, FromRow)]
pub struct ExhibitionRow {
    pub id: i64,
    pub title: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Clone, Debug, FromRow)]
pub struct UserSummaryRow {
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// A dated event shown on the events page.
#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub name: &'static str,
    pub date: &'static str,
    pub location: &'static str,
    pub description: &'static str,
}

/// A storefront item on the shop page.
#[derive(Clone, Copy, Debug)]
pub struct Product {
    pub id: i64,
    pub title: &'static str,
    pub price_cents: u32,
    pub image: &'static str,
}

impl Product {
    pub fn display_price(&self) -> String {
        format!("${}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}
