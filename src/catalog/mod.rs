use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};

/// The fixed set of gallery categories, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Painting,
    Drawing,
    Sculpture,
    Photography,
    DigitalArt,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Painting,
        Category::Drawing,
        Category::Sculpture,
        Category::Photography,
        Category::DigitalArt,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Painting => "Painting",
            Category::Drawing => "Drawing",
            Category::Sculpture => "Sculpture",
            Category::Photography => "Photography",
            Category::DigitalArt => "Digital Art",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Category::Painting => "painting",
            Category::Drawing => "drawing",
            Category::Sculpture => "sculpture",
            Category::Photography => "photography",
            Category::DigitalArt => "digital_art",
        }
    }

    /// Accepts either the label ("Digital Art") or the slug ("digital_art"), case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        let slug = category_slug(input);
        Self::ALL
            .into_iter()
            .find(|category| category.slug() == slug)
    }
}

/// Lower-cases a category name and turns spaces into underscores.
pub fn category_slug(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

#[derive(Clone, Debug, FromRow)]
pub struct ArtworkRow {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub year: String,
    pub description: String,
    pub image_filename: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl ArtworkRow {
    pub fn category(&self) -> Option<Category> {
        Category::parse(&self.category)
    }

    pub fn category_label(&self) -> &str {
        self.category()
            .map(Category::label)
            .unwrap_or(self.category.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct NewArtwork {
    pub title: String,
    pub artist: String,
    pub year: String,
    pub description: String,
    pub image_filename: String,
    pub category: Category,
}

impl NewArtwork {
    /// Catalog entry for a bare image with no metadata beyond its filename.
    pub fn from_image(category: Category, image_filename: &str) -> Self {
        Self {
            title: title_from_filename(image_filename),
            artist: String::new(),
            year: String::new(),
            description: String::new(),
            image_filename: image_filename.to_string(),
            category,
        }
    }
}

/// One category with its catalog entries, as rendered on the gallery page.
#[derive(Debug)]
pub struct CategoryListing {
    pub category: Category,
    pub artworks: Vec<ArtworkRow>,
}

const ARTWORK_COLUMNS: &str =
    "id, title, artist, year, description, image_filename, category, created_at";

pub async fn fetch_artworks(pool: &PgPool) -> sqlx::Result<Vec<ArtworkRow>> {
    sqlx::query_as::<_, ArtworkRow>(&format!(
        "SELECT {ARTWORK_COLUMNS} FROM artworks ORDER BY category, image_filename"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_artworks_in(pool: &PgPool, category: Category) -> sqlx::Result<Vec<ArtworkRow>> {
    sqlx::query_as::<_, ArtworkRow>(&format!(
        "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE category = $1 ORDER BY image_filename"
    ))
    .bind(category.slug())
    .fetch_all(pool)
    .await
}

pub async fn fetch_artwork(pool: &PgPool, id: i64) -> sqlx::Result<Option<ArtworkRow>> {
    sqlx::query_as::<_, ArtworkRow>(&format!(
        "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn count_artworks(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM artworks")
        .fetch_one(pool)
        .await
}

/// Inserts a catalog row, or refreshes the metadata of the row already pointing at the same file.
pub async fn upsert_artwork(pool: &PgPool, artwork: &NewArtwork) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO artworks (title, artist, year, description, image_filename, category)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (category, image_filename) DO UPDATE
         SET title = EXCLUDED.title,
             artist = EXCLUDED.artist,
             year = EXCLUDED.year,
             description = EXCLUDED.description
         RETURNING id",
    )
    .bind(&artwork.title)
    .bind(&artwork.artist)
    .bind(&artwork.year)
    .bind(&artwork.description)
    .bind(&artwork.image_filename)
    .bind(artwork.category.slug())
    .fetch_one(pool)
    .await
}

/// Registers a file in the catalog unless a row for it already exists. Returns whether a row was added.
pub async fn register_image(pool: &PgPool, artwork: &NewArtwork) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO artworks (title, artist, year, description, image_filename, category)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (category, image_filename) DO NOTHING",
    )
    .bind(&artwork.title)
    .bind(&artwork.artist)
    .bind(&artwork.year)
    .bind(&artwork.description)
    .bind(&artwork.image_filename)
    .bind(artwork.category.slug())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Groups catalog rows under every known category, keeping the fixed category order.
/// Rows with an unrecognised category are dropped.
pub fn group_by_category(artworks: Vec<ArtworkRow>) -> Vec<CategoryListing> {
    let mut listings: Vec<CategoryListing> = Category::ALL
        .into_iter()
        .map(|category| CategoryListing {
            category,
            artworks: Vec::new(),
        })
        .collect();

    for artwork in artworks {
        let Some(category) = artwork.category() else {
            continue;
        };
        if let Some(listing) = listings.iter_mut().find(|l| l.category == category) {
            listing.artworks.push(artwork);
        }
    }

    for listing in &mut listings {
        listing
            .artworks
            .sort_by(|a, b| a.image_filename.cmp(&b.image_filename));
    }

    listings
}

/// Lists files in `<root>/<slug>/` whose extension is in `extensions`, sorted.
/// A missing directory yields nothing.
pub async fn scan_category_dir(
    root: &Path,
    category: Category,
    extensions: &[String],
) -> Result<Vec<String>> {
    let dir = root.join(category.slug());
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", dir.display()));
        }
    };

    let mut images = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to iterate {}", dir.display()))?
    {
        let file_type = entry.file_type().await?;
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if has_extension(&name, extensions) {
            images.push(name);
        }
    }

    images.sort();
    Ok(images)
}

/// Adds catalog rows for image files present on disk but not yet catalogued.
pub async fn import_untracked_files(
    pool: &PgPool,
    root: &Path,
    extensions: &[String],
) -> Result<u64> {
    let mut imported = 0_u64;

    for category in Category::ALL {
        let files = scan_category_dir(root, category, extensions).await?;
        for file in files {
            let entry = NewArtwork::from_image(category, &file);
            match register_image(pool, &entry).await {
                Ok(true) => imported += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(?err, category = category.slug(), file = %file, "failed to import gallery file");
                }
            }
        }
    }

    if imported > 0 {
        info!(imported, "imported untracked gallery files into the catalog");
    }

    Ok(imported)
}

fn has_extension(name: &str, extensions: &[String]) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
        }
        _ => false,
    }
}

fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    stem.replace(['_', '-'], " ").trim().to_string()
}
