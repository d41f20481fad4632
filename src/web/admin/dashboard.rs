use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error};

use crate::{
    catalog::{self, CategoryListing},
    web::{
        AppState, AuthUser, data, escape_html,
        flash::{FlashQuery, with_error},
        models::UserSummaryRow,
        templates::{PageLayout, render_page},
    },
};

use super::auth::require_admin_user;

pub async fn dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    let auth_user = require_admin_user(&state, &jar).await?;
    debug!(user_id = %auth_user.id, "admin dashboard requested");

    let users = data::fetch_users(state.pool_ref()).await.map_err(|err| {
        error!(?err, "failed to load dashboard users");
        Redirect::to(&with_error("/", "unknown"))
    })?;

    let artworks = catalog::fetch_artworks(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to load catalog for dashboard");
            Redirect::to(&with_error("/", "unknown"))
        })?;
    let listings = catalog::group_by_category(artworks);

    Ok(Html(render_dashboard(
        &auth_user,
        &users,
        &listings,
        &flash.render(),
    )))
}

fn render_dashboard(
    auth_user: &AuthUser,
    users: &[UserSummaryRow],
    listings: &[CategoryListing],
    flash_html: &str,
) -> String {
    let user_rows = if users.is_empty() {
        "<tr><td colspan=\"4\">No users yet.</td></tr>".to_string()
    } else {
        users
            .iter()
            .map(|user| {
                format!(
                    "<tr><td>{username}</td><td>{email}</td><td>{role}</td><td>{joined}</td></tr>",
                    username = escape_html(&user.username),
                    email = escape_html(user.email.as_deref().unwrap_or("—")),
                    role = escape_html(&user.role),
                    joined = user.created_at.format("%Y-%m-%d"),
                )
            })
            .collect::<String>()
    };

    let catalog_rows = listings
        .iter()
        .map(|listing| {
            format!(
                r#"<tr><td><a href="/view_artworks?category={slug}">{label}</a></td><td>{count}</td></tr>"#,
                slug = listing.category.slug(),
                label = listing.category.label(),
                count = listing.artworks.len(),
            )
        })
        .collect::<String>();
    let total: usize = listings.iter().map(|listing| listing.artworks.len()).sum();
    let noun = if total == 1 { "artwork" } else { "artworks" };

    let body = format!(
        r#"        <h1>Admin dashboard</h1>
        <section class="panel">
            <h2>Catalog</h2>
            <p class="muted">{total} {noun} catalogued. <a href="/add_artwork">Add artwork</a> · <a href="/upload">Upload a file</a></p>
            <table>
                <thead><tr><th>Category</th><th>Artworks</th></tr></thead>
                <tbody>{catalog_rows}</tbody>
            </table>
        </section>
        <section class="panel">
            <h2>Users</h2>
            <table>
                <thead><tr><th>Username</th><th>Email</th><th>Role</th><th>Joined</th></tr></thead>
                <tbody>{user_rows}</tbody>
            </table>
        </section>"#
    );

    render_page(
        PageLayout::new("Admin", body)
            .with_user(Some(auth_user))
            .with_flash(flash_html),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::catalog::ArtworkRow;

    #[test]
    fn dashboard_lists_users_and_category_counts() {
        let admin = AuthUser {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            role: "admin".to_string(),
        };
        let users = vec![UserSummaryRow {
            username: "admin".to_string(),
            email: None,
            role: "admin".to_string(),
            created_at: Utc::now(),
        }];
        let listings = catalog::group_by_category(vec![ArtworkRow {
            id: 1,
            title: "Sunset".to_string(),
            artist: "Ana".to_string(),
            year: "1999".to_string(),
            description: String::new(),
            image_filename: "sunset.jpg".to_string(),
            category: "painting".to_string(),
            created_at: Utc::now(),
        }]);

        let html = render_dashboard(&admin, &users, &listings, "");
        assert!(html.contains("1 artwork catalogued."));
        assert!(html.contains(r#"<a href="/view_artworks?category=painting">Painting</a></td><td>1</td>"#));
        assert!(html.contains("<td>admin</td><td>—</td><td>admin</td>"));

        let empty = catalog::group_by_category(Vec::new());
        let html = render_dashboard(&admin, &users, &empty, "");
        assert!(html.contains("0 artworks catalogued."));
    }
}
