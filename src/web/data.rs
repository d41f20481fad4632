use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use super::models::{Event, ExhibitionRow, Product, UserSummaryRow};

pub const EVENTS: &[Event] = &[
    Event {
        name: "Art Exhibition 2025",
        date: "2025-06-15",
        location: "Gallery Hall A",
        description: "An exhibition showcasing modern art.",
    },
    Event {
        name: "Sculpture Workshop",
        date: "2025-07-20",
        location: "Workshop Room B",
        description: "Hands-on sculpture creation session.",
    },
];

pub const PRODUCTS: &[Product] = &[
    Product {
        id: 1,
        title: "Sunset Over The Hills",
        price_cents: 4999,
        image: "/static/images/art1.jpeg",
    },
    Product {
        id: 2,
        title: "Abstract Dreams",
        price_cents: 3999,
        image: "/static/images/art2.jpeg",
    },
    Product {
        id: 3,
        title: "Vintage Portrait",
        price_cents: 5999,
        image: "/static/images/art3.jpeg",
    },
];

/// (title, location, start, end, description)
const DEFAULT_EXHIBITIONS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "Soundscapes of the Future",
        "Chennai Art Museum",
        "2025-06-01",
        "2025-07-15",
        "An immersive audio experience showcasing futuristic sound art.",
    ),
    (
        "Echoes of Tradition",
        "Chennai Art Museum",
        "2025-08-01",
        "2025-09-10",
        "Exploring the rich heritage of traditional music through interactive exhibits.",
    ),
];

pub async fn fetch_exhibitions(pool: &PgPool) -> sqlx::Result<Vec<ExhibitionRow>> {
    sqlx::query_as::<_, ExhibitionRow>(
        "SELECT id, title, location, start_date, end_date, description FROM exhibitions ORDER BY start_date, id",
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_users(pool: &PgPool) -> sqlx::Result<Vec<UserSummaryRow>> {
    sqlx::query_as::<_, UserSummaryRow>(
        "SELECT username, email, role, created_at FROM users ORDER BY created_at, username",
    )
    .fetch_all(pool)
    .await
}

/// Inserts the default exhibitions when the table is empty. Returns how many rows were added.
pub async fn seed_default_exhibitions(pool: &PgPool) -> Result<u64> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exhibitions")
        .fetch_one(pool)
        .await
        .context("failed to count exhibitions")?;

    if existing > 0 {
        return Ok(0);
    }

    let mut transaction = pool
        .begin()
        .await
        .context("failed to open exhibition seed transaction")?;

    let mut inserted = 0_u64;
    for &(title, location, start, end, description) in DEFAULT_EXHIBITIONS {
        let start_date = parse_date(start)?;
        let end_date = parse_date(end)?;

        sqlx::query(
            "INSERT INTO exhibitions (title, location, start_date, end_date, description) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(title)
        .bind(location)
        .bind(start_date)
        .bind(end_date)
        .bind(description)
        .execute(&mut *transaction)
        .await
        .with_context(|| format!("failed to seed exhibition `{title}`"))?;

        inserted += 1;
    }

    transaction
        .commit()
        .await
        .context("failed to commit exhibition seed")?;

    Ok(inserted)
}

pub fn find_product(id: i64) -> Option<&'static Product> {
    PRODUCTS.iter().find(|product| product.id == id)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exhibitions_have_valid_ordered_dates() {
        for &(title, _, start, end, _) in DEFAULT_EXHIBITIONS {
            let start = parse_date(start).expect("start date");
            let end = parse_date(end).expect("end date");
            assert!(start <= end, "{title} ends before it starts");
        }
    }

    #[test]
    fn products_are_addressable_by_id() {
        assert_eq!(find_product(2).map(|p| p.title), Some("Abstract Dreams"));
        assert!(find_product(99).is_none());
        assert_eq!(PRODUCTS[0].display_price(), "$49.99");
    }
}
