use axum::response::Redirect;
use axum_extra::extract::cookie::CookieJar;

use crate::web::{AppState, AuthUser, auth, flash::with_error};

/// Signed-out visitors go to the login page; signed-in non-admins go home with a notice.
pub async fn require_admin_user(state: &AppState, jar: &CookieJar) -> Result<AuthUser, Redirect> {
    let auth_user = auth::require_user_redirect(state, jar).await?;

    if !auth_user.is_admin() {
        return Err(Redirect::to(&with_error("/", "not_authorized")));
    }

    Ok(auth_user)
}
