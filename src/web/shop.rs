use axum::{
    extract::{Form, Path as AxumPath, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    catalog::{self, ArtworkRow},
    web::{
        AppState, AuthUser, auth,
        data::{self, PRODUCTS},
        escape_html,
        flash::{FlashQuery, with_error, with_status},
        gallery::media_path,
        templates::{PageLayout, render_page},
    },
};

pub const ORDER_CONFIRMATION: &str = "Thank you for your order! We will process it shortly.";

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub quantity: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CheckoutOrder {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CheckoutError {
    UnknownProduct,
    MissingFields { product_id: i64 },
    InvalidQuantity { product_id: i64 },
}

impl CheckoutError {
    /// Where the shopper is sent back to.
    pub fn redirect_target(&self) -> String {
        match self {
            CheckoutError::UnknownProduct => with_error("/shop", "product_not_found"),
            CheckoutError::MissingFields { product_id } => {
                with_error(&format!("/checkout/{product_id}"), "missing_fields")
            }
            CheckoutError::InvalidQuantity { product_id } => {
                with_error(&format!("/checkout/{product_id}"), "invalid_quantity")
            }
        }
    }
}

pub async fn shop(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;
    Html(render_shop_page(user.as_ref(), &flash.render()))
}

pub async fn buy(AxumPath(product_id): AxumPath<i64>) -> Redirect {
    match data::find_product(product_id) {
        Some(product) => info!(
            product_id,
            title = product.title,
            price = %product.display_price(),
            "product purchased"
        ),
        None => warn!(product_id, "purchase of unknown product"),
    }
    Redirect::to(&with_status("/gallery", "purchased"))
}

pub async fn checkout(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(product_id): AxumPath<i64>,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    let artwork = match catalog::fetch_artwork(state.pool_ref(), product_id).await {
        Ok(Some(artwork)) => artwork,
        Ok(None) => return Err(Redirect::to(&with_error("/shop", "product_not_found"))),
        Err(err) => {
            error!(?err, product_id, "failed to load checkout product");
            return Err(Redirect::to(&with_error("/shop", "unknown")));
        }
    };
    let user = auth::current_user(&state, &jar).await;

    Ok(Html(render_checkout_page(
        user.as_ref(),
        &artwork,
        &flash.render(),
    )))
}

pub async fn process_checkout(Form(form): Form<CheckoutForm>) -> Redirect {
    match validate_checkout(&form) {
        Ok(order) => {
            info!(
                product_id = order.product_id,
                quantity = order.quantity,
                "order received"
            );
            Redirect::to("/order_confirmation")
        }
        Err(err) => Redirect::to(&err.redirect_target()),
    }
}

pub async fn order_confirmation() -> &'static str {
    ORDER_CONFIRMATION
}

pub fn validate_checkout(form: &CheckoutForm) -> Result<CheckoutOrder, CheckoutError> {
    let product_id = form
        .product_id
        .trim()
        .parse::<i64>()
        .map_err(|_| CheckoutError::UnknownProduct)?;

    let quantity = form.quantity.trim();
    let missing = [&form.name, &form.email, &form.address]
        .iter()
        .any(|field| field.trim().is_empty());

    if missing || quantity.is_empty() {
        return Err(CheckoutError::MissingFields { product_id });
    }

    let quantity = match quantity.parse::<u32>() {
        Ok(quantity) if quantity > 0 => quantity,
        _ => return Err(CheckoutError::InvalidQuantity { product_id }),
    };

    Ok(CheckoutOrder {
        product_id,
        quantity,
    })
}

fn render_shop_page(user: Option<&AuthUser>, flash_html: &str) -> String {
    let cards = PRODUCTS
        .iter()
        .map(|product| {
            format!(
                r#"<div class="card"><img src="{image}" alt="{title}" loading="lazy"><div class="body"><h3>{title}</h3><p>{price}</p><form method="post" action="/buy/{id}"><button type="submit">Buy now</button></form></div></div>"#,
                id = product.id,
                image = product.image,
                title = escape_html(product.title),
                price = product.display_price(),
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <h1>Museum shop</h1>
        <p class="muted">Prints of catalogued works can be ordered from each artwork's page.</p>
        <div class="grid">{cards}</div>"#
    );

    render_page(
        PageLayout::new("Shop", body)
            .with_user(user)
            .with_flash(flash_html),
    )
}

fn render_checkout_page(user: Option<&AuthUser>, artwork: &ArtworkRow, flash_html: &str) -> String {
    let body = format!(
        r#"        <section class="panel" style="max-width: 620px;">
            <h1>Checkout</h1>
            <img src="{src}" alt="{title}" style="max-width: 100%; border-radius: 8px;">
            <h2>{title}</h2>
            <form method="post" action="/process_checkout">
                <input type="hidden" name="product_id" value="{id}">
                <label for="name">Full name</label>
                <input id="name" name="name" required>
                <label for="email">Email</label>
                <input id="email" type="email" name="email" required>
                <label for="address">Shipping address</label>
                <textarea id="address" name="address" required></textarea>
                <label for="quantity">Quantity</label>
                <input id="quantity" type="number" name="quantity" min="1" value="1" required>
                <button type="submit">Place order</button>
            </form>
        </section>"#,
        id = artwork.id,
        src = media_path(artwork),
        title = escape_html(&artwork.title),
    );

    render_page(
        PageLayout::new("Checkout", body)
            .with_user(user)
            .with_flash(flash_html),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn form(product_id: &str, quantity: &str) -> CheckoutForm {
        CheckoutForm {
            product_id: product_id.to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            address: "1 Gallery Road".to_string(),
            quantity: quantity.to_string(),
        }
    }

    #[test]
    fn complete_checkout_is_accepted() {
        let form = form("7", " 2 ");
        let order = validate_checkout(&form).expect("valid order");
        assert_eq!(
            order,
            CheckoutOrder {
                product_id: 7,
                quantity: 2,
            }
        );
    }

    #[test]
    fn quantity_must_be_a_positive_whole_number() {
        for quantity in ["0", "-1", "1.5", "many"] {
            assert_eq!(
                validate_checkout(&form("7", quantity)),
                Err(CheckoutError::InvalidQuantity { product_id: 7 }),
                "quantity {quantity:?}"
            );
        }
    }

    #[test]
    fn blank_fields_and_bad_ids_are_rejected() {
        let mut missing_address = form("3", "1");
        missing_address.address = "  ".to_string();
        let err = validate_checkout(&missing_address).unwrap_err();
        assert_eq!(err, CheckoutError::MissingFields { product_id: 3 });
        assert_eq!(err.redirect_target(), "/checkout/3?error=missing_fields");

        let err = validate_checkout(&form("abc", "1")).unwrap_err();
        assert_eq!(err.redirect_target(), "/shop?error=product_not_found");
    }

    #[test]
    fn shop_lists_every_product() {
        let html = render_shop_page(None, "");
        for product in PRODUCTS {
            assert!(html.contains(&format!(r#"action="/buy/{}""#, product.id)));
        }
        assert!(html.contains("$49.99"));
    }

    #[test]
    fn checkout_page_carries_the_artwork_id() {
        let artwork = ArtworkRow {
            id: 12,
            title: "Harbour <at> dusk".to_string(),
            artist: String::new(),
            year: String::new(),
            description: String::new(),
            image_filename: "harbour.png".to_string(),
            category: "painting".to_string(),
            created_at: Utc::now(),
        };
        let html = render_checkout_page(None, &artwork, "");
        assert!(html.contains(r#"name="product_id" value="12""#));
        assert!(html.contains("Harbour &lt;at&gt; dusk"));
        assert!(html.contains("/media/painting/harbour.png"));
    }
}
