use axum::{
    extract::{Multipart, Path as AxumPath, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    catalog::{self, ArtworkRow, Category, CategoryListing, NewArtwork},
    web::{
        AppState, auth, escape_html,
        flash::{FlashQuery, compose_flash_message, with_error, with_status},
        templates::{PageLayout, encode_path_segment, render_page},
        uploads::{StoredFile, UploadError, UploadForm, UploadStore, read_upload_form},
    },
};

const MAX_YEAR_CHARS: usize = 10;

#[derive(Default, Deserialize)]
pub struct ArtworkFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
}

pub async fn gallery(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;

    let (listings, flash_html) = match catalog::fetch_artworks(state.pool_ref()).await {
        Ok(rows) => (catalog::group_by_category(rows), flash.render()),
        Err(err) => {
            error!(?err, "failed to load gallery catalog");
            (
                catalog::group_by_category(Vec::new()),
                compose_flash_message(None, Some("unknown")),
            )
        }
    };

    let accept = accept_attribute(state.uploads());
    let sections = listings
        .iter()
        .map(|listing| render_category_section(listing, &accept))
        .collect::<String>();

    let body = format!(
        r#"        <h1>Gallery</h1>
        <p class="muted">Browse the collection by category, or contribute an image.</p>
{sections}"#
    );

    Html(render_page(
        PageLayout::new("Gallery", body)
            .with_user(user.as_ref())
            .with_flash(flash_html),
    ))
}

pub async fn add_image(
    State(state): State<AppState>,
    AxumPath(category): AxumPath<String>,
    multipart: Multipart,
) -> Redirect {
    let Some(category) = Category::parse(&category) else {
        return Redirect::to(&with_error("/gallery", "unknown_category"));
    };

    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(err) => return upload_rejected("/gallery", &err),
    };

    let stored = match save_file(state.uploads(), &form, "image", category).await {
        Ok(stored) => stored,
        Err(err) => return upload_rejected("/gallery", &err),
    };

    let entry = NewArtwork::from_image(category, &stored.filename);
    match catalog::register_image(state.pool_ref(), &entry).await {
        Ok(_) => {
            info!(
                category = category.slug(),
                file = %stored.filename,
                size = stored.size,
                "gallery image uploaded"
            );
            Redirect::to(&with_status("/gallery", "image_uploaded"))
        }
        Err(err) => {
            error!(?err, "failed to catalog uploaded image");
            discard_new_file(state.uploads(), &stored).await;
            Redirect::to(&with_error("/gallery", "upload_failed"))
        }
    }
}

pub async fn add_artwork_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;

    let options = Category::ALL
        .iter()
        .map(|category| {
            format!(
                r#"<option value="{slug}">{label}</option>"#,
                slug = category.slug(),
                label = category.label()
            )
        })
        .collect::<String>();
    let accept = accept_attribute(state.uploads());

    let body = format!(
        r#"        <section class="panel">
            <h1>Add artwork</h1>
            <form method="post" action="/add_artwork" enctype="multipart/form-data">
                <label for="category">Category</label>
                <select id="category" name="category" required>{options}</select>
                <label for="title">Title</label>
                <input id="title" name="title" maxlength="255" required>
                <label for="artist">Artist</label>
                <input id="artist" name="artist" maxlength="255">
                <label for="year">Year</label>
                <input id="year" name="year" maxlength="{MAX_YEAR_CHARS}">
                <label for="description">Description</label>
                <textarea id="description" name="description"></textarea>
                <label for="image">Image</label>
                <input id="image" type="file" name="image" accept="{accept}" required>
                <p class="muted">Allowed types: {allowed}</p>
                <button type="submit">Add artwork</button>
            </form>
        </section>"#,
        allowed = state.uploads().allowed_extensions().join(", "),
    );

    Html(render_page(
        PageLayout::new("Add artwork", body)
            .with_user(user.as_ref())
            .with_flash(flash.render()),
    ))
}

pub async fn process_add_artwork(State(state): State<AppState>, multipart: Multipart) -> Redirect {
    const BACK: &str = "/add_artwork";

    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(err) => return upload_rejected(BACK, &err),
    };

    let Some(title) = form.text("title") else {
        return Redirect::to(&with_error(BACK, "missing_fields"));
    };
    let Some(category_raw) = form.text("category") else {
        return Redirect::to(&with_error(BACK, "missing_fields"));
    };
    let Some(category) = Category::parse(category_raw) else {
        return Redirect::to(&with_error(BACK, "unknown_category"));
    };
    let year = form.text("year").unwrap_or_default();
    if year.chars().count() > MAX_YEAR_CHARS {
        return Redirect::to(&with_error(BACK, "invalid_year"));
    }

    let stored = match save_file(state.uploads(), &form, "image", category).await {
        Ok(stored) => stored,
        Err(err) => return upload_rejected(BACK, &err),
    };

    let artwork = NewArtwork {
        title: title.to_string(),
        artist: form.text("artist").unwrap_or_default().to_string(),
        year: year.to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        image_filename: stored.filename.clone(),
        category,
    };

    match catalog::upsert_artwork(state.pool_ref(), &artwork).await {
        Ok(id) => {
            info!(id, category = category.slug(), "artwork added");
            Redirect::to(&with_status("/gallery", "artwork_added"))
        }
        Err(err) => {
            error!(?err, "failed to add artwork");
            discard_new_file(state.uploads(), &stored).await;
            Redirect::to(&with_error(BACK, "artwork_failed"))
        }
    }
}

pub async fn view_artworks(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(filter): Query<ArtworkFilter>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;
    let mut flash_html =
        compose_flash_message(filter.status.as_deref(), filter.error.as_deref());

    let requested = filter
        .category
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty());
    let category = match requested {
        Some(raw) => {
            let parsed = Category::parse(raw);
            if parsed.is_none() {
                flash_html = compose_flash_message(None, Some("unknown_category"));
            }
            parsed
        }
        None => None,
    };

    let result = match category {
        Some(category) => catalog::fetch_artworks_in(state.pool_ref(), category).await,
        None => catalog::fetch_artworks(state.pool_ref()).await,
    };
    let artworks = result.unwrap_or_else(|err| {
        error!(?err, "failed to load artworks");
        flash_html = compose_flash_message(None, Some("unknown"));
        Vec::new()
    });

    let filters = std::iter::once(r#"<a href="/view_artworks">All</a>"#.to_string())
        .chain(Category::ALL.iter().map(|c| {
            format!(
                r#"<a href="/view_artworks?category={slug}">{label}</a>"#,
                slug = c.slug(),
                label = c.label()
            )
        }))
        .collect::<Vec<_>>()
        .join(" · ");

    let heading = category.map(Category::label).unwrap_or("All artworks");
    let body = format!(
        r#"        <h1>{heading}</h1>
        <p class="muted">{filters}</p>
        {cards}"#,
        cards = render_artwork_cards(&artworks),
    );

    Html(render_page(
        PageLayout::new("Artworks", body)
            .with_user(user.as_ref())
            .with_flash(flash_html),
    ))
}

pub async fn artwork_detail(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(artwork_id): AxumPath<i64>,
) -> Result<Html<String>, Redirect> {
    let artwork = match catalog::fetch_artwork(state.pool_ref(), artwork_id).await {
        Ok(Some(artwork)) => artwork,
        Ok(None) => return Err(Redirect::to(&with_error("/gallery", "artwork_not_found"))),
        Err(err) => {
            error!(?err, artwork_id, "failed to load artwork");
            return Err(Redirect::to(&with_error("/gallery", "unknown")));
        }
    };
    let user = auth::current_user(&state, &jar).await;

    let body = render_artwork_detail(&artwork);
    Ok(Html(render_page(
        PageLayout::new(&artwork.title, body).with_user(user.as_ref()),
    )))
}

/// Card grid shared by the home page and the artwork listing.
pub fn render_artwork_cards(artworks: &[ArtworkRow]) -> String {
    if artworks.is_empty() {
        return r#"<p class="muted">No artworks yet.</p>"#.to_string();
    }

    let cards = artworks
        .iter()
        .map(|artwork| {
            let byline = [artwork.artist.as_str(), artwork.year.as_str()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                r#"<a class="card" href="/artwork/{id}"><img src="{src}" alt="{title}" loading="lazy"><div class="body"><h3>{title}</h3><p>{byline}</p></div></a>"#,
                id = artwork.id,
                src = media_path(artwork),
                title = escape_html(&artwork.title),
                byline = escape_html(&byline),
            )
        })
        .collect::<String>();

    format!(r#"<div class="grid">{cards}</div>"#)
}

/// URL the image bytes of a catalog entry are served from.
pub fn media_path(artwork: &ArtworkRow) -> String {
    format!(
        "/media/{}/{}",
        encode_path_segment(&artwork.category),
        encode_path_segment(&artwork.image_filename)
    )
}

fn render_category_section(listing: &CategoryListing, accept: &str) -> String {
    let category = listing.category;
    let items = if listing.artworks.is_empty() {
        r#"<p class="muted">No images in this category yet.</p>"#.to_string()
    } else {
        let cards = listing
            .artworks
            .iter()
            .map(|artwork| {
                format!(
                    r#"<a class="card" href="/artwork/{id}"><img src="{src}" alt="{name}" loading="lazy"><div class="body"><p>{name}</p></div></a>"#,
                    id = artwork.id,
                    src = media_path(artwork),
                    name = escape_html(&artwork.image_filename),
                )
            })
            .collect::<String>();
        format!(r#"<div class="grid">{cards}</div>"#)
    };

    format!(
        r#"        <section class="panel" id="{slug}">
            <h2>{label}</h2>
            {items}
            <form method="post" action="/add_image/{slug}" enctype="multipart/form-data">
                <label for="image-{slug}">Add an image to {label}</label>
                <input id="image-{slug}" type="file" name="image" accept="{accept}" required>
                <button type="submit">Upload</button>
            </form>
        </section>
"#,
        slug = category.slug(),
        label = category.label(),
    )
}

fn render_artwork_detail(artwork: &ArtworkRow) -> String {
    let facts = [
        ("Artist", artwork.artist.as_str()),
        ("Year", artwork.year.as_str()),
        ("Category", artwork.category_label()),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(label, value)| format!("<dt>{label}</dt><dd>{}</dd>", escape_html(value)))
    .collect::<String>();

    let description = if artwork.description.is_empty() {
        String::new()
    } else {
        format!("<p>{}</p>", escape_html(&artwork.description))
    };

    format!(
        r#"        <section class="panel">
            <h1>{title}</h1>
            <img src="{src}" alt="{title}" style="max-width: 100%; border-radius: 8px;">
            <dl>{facts}</dl>
            {description}
            <p class="muted">Catalogued {added}. <a href="/checkout/{id}">Buy a print</a></p>
        </section>"#,
        title = escape_html(&artwork.title),
        src = media_path(artwork),
        added = artwork.created_at.format("%Y-%m-%d"),
        id = artwork.id,
    )
}

fn accept_attribute(store: &UploadStore) -> String {
    store
        .allowed_extensions()
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",")
}

async fn save_file(
    store: &UploadStore,
    form: &UploadForm,
    field_name: &str,
    category: Category,
) -> Result<StoredFile, UploadError> {
    let file = form.require_file(field_name)?;
    store.save(Some(category), file).await
}

fn upload_rejected(back: &str, err: &UploadError) -> Redirect {
    match err {
        UploadError::Io { .. } => error!(?err, "failed to store upload"),
        _ => warn!(%err, "upload rejected"),
    }
    Redirect::to(&with_error(back, err.flash_code()))
}

/// Removes a freshly written file whose catalog row could not be stored.
/// Files that replaced an existing upload stay, since their row predates this request.
async fn discard_new_file(store: &UploadStore, stored: &StoredFile) {
    if stored.replaced {
        return;
    }
    if let Err(err) = store.discard(stored).await {
        warn!(?err, path = %stored.path.display(), "failed to remove orphaned upload");
    }
}
