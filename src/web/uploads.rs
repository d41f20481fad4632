use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::{
    body::Bytes,
    extract::{Multipart, multipart::MultipartError},
};
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::catalog::Category;

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting uploaded files.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to parse upload form: {0}")]
    Multipart(#[from] MultipartError),
    #[error("form has no `{0}` file part")]
    MissingFile(String),
    #[error("no file selected")]
    EmptyFilename,
    #[error("file type of `{0}` is not allowed")]
    DisallowedExtension(String),
    #[error("filename `{0}` has no usable characters")]
    UnusableFilename(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    /// Flash code shown to the user for this failure.
    pub fn flash_code(&self) -> &'static str {
        match self {
            UploadError::Multipart(_) => "upload_malformed",
            UploadError::MissingFile(_) => "no_file_part",
            UploadError::EmptyFilename => "no_selected_file",
            UploadError::DisallowedExtension(_) | UploadError::UnusableFilename(_) => {
                "file_type_not_allowed"
            }
            UploadError::Io { .. } => "upload_failed",
        }
    }
}

/// A file part held in memory until the rest of the form has been read.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub field_name: String,
    pub original_name: String,
    pub bytes: Bytes,
}

/// Everything a multipart form carried: text fields and file parts.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<PendingFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadForm {
    pub fn file(&self, field_name: &str) -> Option<&PendingFile> {
        self.files.iter().find(|file| file.field_name == field_name)
    }

    /// Like [`UploadForm::file`], but a missing part is an error.
    pub fn require_file(&self, field_name: &str) -> UploadResult<&PendingFile> {
        self.file(field_name)
            .ok_or_else(|| UploadError::MissingFile(field_name.to_string()))
    }

    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_fields
            .get(field_name)
            .and_then(|values| values.first().map(|s| s.as_str()))
    }

    /// Trimmed text value, `None` when absent or blank.
    pub fn text(&self, field_name: &str) -> Option<&str> {
        self.first_text(field_name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Reads the whole multipart body. Parts with a filename (even an empty one) are files.
pub async fn read_upload_form(mut multipart: Multipart) -> UploadResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or("").to_string();

        match field.file_name().map(str::to_string) {
            Some(original_name) => {
                let bytes = field.bytes().await?;
                form.files.push(PendingFile {
                    field_name,
                    original_name,
                    bytes,
                });
            }
            None => {
                let value = field.text().await?;
                form.text_fields.entry(field_name).or_default().push(value);
            }
        }
    }

    Ok(form)
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    /// Whether an existing file with the same name was overwritten.
    pub replaced: bool,
}

/// Category-keyed upload tree rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    allowed_extensions: Vec<String>,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, allowed_extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            allowed_extensions: allowed_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn directory_for(&self, category: Option<Category>) -> PathBuf {
        match category {
            Some(category) => self.root.join(category.slug()),
            None => self.root.clone(),
        }
    }

    /// Validates the file and returns the name it will be stored under.
    pub fn accept(&self, file: &PendingFile) -> UploadResult<String> {
        let original = file.original_name.trim();
        if original.is_empty() {
            return Err(UploadError::EmptyFilename);
        }
        if !allowed_file(original, &self.allowed_extensions) {
            return Err(UploadError::DisallowedExtension(original.to_string()));
        }

        match secure_filename(original) {
            Some(name) if allowed_file(&name, &self.allowed_extensions) => Ok(name),
            _ => Err(UploadError::UnusableFilename(original.to_string())),
        }
    }

    /// Writes the file under `<root>/<slug>/` (or the root itself when uncategorized).
    /// A file with the same name is overwritten.
    pub async fn save(
        &self,
        category: Option<Category>,
        file: &PendingFile,
    ) -> UploadResult<StoredFile> {
        let filename = self.accept(file)?;
        let dir = self.directory_for(category);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| UploadError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(&filename);
        let replaced = tokio::fs::try_exists(&path).await.unwrap_or(false);
        let io_err = |source| UploadError::Io {
            path: path.clone(),
            source,
        };

        let mut handle = File::create(&path).await.map_err(io_err)?;
        handle.write_all(&file.bytes).await.map_err(io_err)?;
        handle.flush().await.map_err(io_err)?;

        Ok(StoredFile {
            filename,
            size: file.bytes.len() as u64,
            path,
            replaced,
        })
    }

    /// Best-effort removal of a stored file.
    pub async fn discard(&self, stored: &StoredFile) -> std::io::Result<()> {
        tokio::fs::remove_file(&stored.path).await
    }

    /// Maps a request path back to a stored file, refusing anything that would escape the tree.
    pub fn resolve(&self, category: Option<&str>, filename: &str) -> Option<PathBuf> {
        if secure_filename(filename).as_deref() != Some(filename) {
            return None;
        }
        let category = match category {
            Some(raw) => Some(Category::ALL.into_iter().find(|c| c.slug() == raw)?),
            None => None,
        };
        Some(self.directory_for(category).join(filename))
    }
}

/// True when the filename has an extension from the allowed set.
pub fn allowed_file(filename: &str, allowed: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Reduces a client-supplied filename to a safe single path component.
pub fn secure_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized = sanitize_filename::sanitize(base);
    let joined = sanitized.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = joined.trim_start_matches('.');

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
