use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use crate::{
    catalog::{self, ArtworkRow},
    web::{
        AppState, AuthUser, auth, escape_html,
        flash::{FlashQuery, compose_flash_message},
        gallery::render_artwork_cards,
        templates::{PageLayout, render_page},
    },
};

/// Signed-in home page listing every catalogued artwork.
pub async fn home(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let user = match auth::require_user_redirect(&state, &jar).await {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    let pool = state.pool_ref();
    let loaded = match catalog::fetch_artworks(pool).await {
        Ok(artworks) => catalog::count_artworks(pool)
            .await
            .map(|total| (artworks, total)),
        Err(err) => Err(err),
    };

    let (artworks, total, flash_html) = match loaded {
        Ok((artworks, total)) => (artworks, total, flash.render()),
        Err(err) => {
            error!(?err, "failed to load artworks for home page");
            (Vec::new(), 0, compose_flash_message(None, Some("unknown")))
        }
    };

    Html(render_home_page(&user, &artworks, total, &flash_html)).into_response()
}

fn render_home_page(user: &AuthUser, artworks: &[ArtworkRow], total: i64, flash_html: &str) -> String {
    let noun = if total == 1 { "work" } else { "works" };
    let body = format!(
        r#"        <h1>Welcome back, {username}</h1>
        <p class="muted">{total} {noun} in the collection. <a href="/add_artwork">Add an artwork</a> · <a href="/gallery">Browse by category</a></p>
{cards}"#,
        username = escape_html(&user.username),
        cards = render_artwork_cards(artworks),
    );

    render_page(
        PageLayout::new("Home", body)
            .with_user(Some(user))
            .with_flash(flash_html),
    )
}
