use std::path::Path;

use axum::{
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};

use crate::web::{
    AppState, auth, escape_html,
    flash::{FlashQuery, with_error, with_status},
    templates::{PageLayout, encode_path_segment, render_page},
    uploads::read_upload_form,
};

pub async fn serve_upload(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    match state.uploads().resolve(None, &filename) {
        Some(path) => stream_image(&path).await,
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn serve_category_upload(
    State(state): State<AppState>,
    AxumPath((category, filename)): AxumPath<(String, String)>,
) -> Response {
    match state.uploads().resolve(Some(&category), &filename) {
        Some(path) => stream_image(&path).await,
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Send a stored file inline with a content type derived from its extension.
pub async fn stream_image(path: &Path) -> Response {
    if !is_stored_file(path).await {
        return StatusCode::NOT_FOUND.into_response();
    }

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(err) => {
            error!(?err, file = %path.display(), "failed to read stored file");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut headers = HeaderMap::new();
    let content_type = content_type_for(path);
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    (headers, bytes).into_response()
}

/// True only for a regular file; directories and missing paths are not servable.
pub async fn is_stored_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

pub fn content_type_for(path: &Path) -> mime::Mime {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "png" => mime::IMAGE_PNG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

pub async fn upload_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;
    let accept = state
        .uploads()
        .allowed_extensions()
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    let body = format!(
        r#"        <section class="panel">
            <h1>Upload a file</h1>
            <form method="post" action="/upload" enctype="multipart/form-data">
                <label for="file">Image</label>
                <input id="file" type="file" name="file" accept="{accept}" required>
                <p class="muted">Allowed types: {allowed}</p>
                <button type="submit">Upload</button>
            </form>
        </section>"#,
        allowed = state.uploads().allowed_extensions().join(", "),
    );

    Html(render_page(
        PageLayout::new("Upload", body)
            .with_user(user.as_ref())
            .with_flash(flash.render()),
    ))
}

pub async fn process_upload(State(state): State<AppState>, multipart: Multipart) -> Redirect {
    let stored = match read_upload_form(multipart).await {
        Ok(form) => match form.require_file("file") {
            Ok(file) => state.uploads().save(None, file).await,
            Err(err) => Err(err),
        },
        Err(err) => Err(err),
    };

    match stored {
        Ok(stored) => {
            info!(file = %stored.filename, size = stored.size, "file uploaded");
            let target = format!("/uploads/{}", encode_path_segment(&stored.filename));
            Redirect::to(&with_status(&target, "file_uploaded"))
        }
        Err(err) => {
            warn!(%err, "upload rejected");
            Redirect::to(&with_error("/upload", err.flash_code()))
        }
    }
}

/// Page showing a single uploaded image. Served for both `/uploads/:filename` and `/display/:filename`.
pub async fn display_upload(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(filename): AxumPath<String>,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let user = auth::current_user(&state, &jar).await;

    let exists = match state.uploads().resolve(None, &filename) {
        Some(path) => is_stored_file(&path).await,
        None => false,
    };

    if !exists {
        let body = r#"        <section class="panel"><h1>Not found</h1><p>No uploaded file by that name.</p></section>"#;
        return Err((
            StatusCode::NOT_FOUND,
            Html(render_page(
                PageLayout::new("Not found", body).with_user(user.as_ref()),
            )),
        ));
    }

    let body = format!(
        r#"        <section class="panel">
            <h1>{name}</h1>
            <img src="/media/{src}" alt="{name}" style="max-width: 100%; border-radius: 8px;">
            <p class="muted"><a href="/upload">Upload another file</a></p>
        </section>"#,
        name = escape_html(&filename),
        src = encode_path_segment(&filename),
    );

    Ok(Html(render_page(
        PageLayout::new("Uploaded file", body)
            .with_user(user.as_ref())
            .with_flash(flash.render()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(Path::new("a.JPG")), mime::IMAGE_JPEG);
        assert_eq!(content_type_for(Path::new("a.jpeg")), mime::IMAGE_JPEG);
        assert_eq!(content_type_for(Path::new("a.png")), mime::IMAGE_PNG);
        assert_eq!(content_type_for(Path::new("a.gif")), mime::IMAGE_GIF);
        assert_eq!(
            content_type_for(Path::new("a.bin")),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let response = stream_image(&dir.path().join("nope.png")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directory_is_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let painting = dir.path().join("painting");
        std::fs::create_dir_all(&painting).expect("category dir");

        assert!(!is_stored_file(&painting).await);
        let response = stream_image(&painting).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stored_file_is_streamed_with_image_type() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("x.png");
        std::fs::write(&path, b"png-bytes").expect("write");

        let response = stream_image(&path).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
    }
}
