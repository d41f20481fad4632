use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    extract::{Form, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::web::{
    AppState,
    flash::{FlashQuery, with_error, with_status},
    templates::{PageLayout, render_page},
};

pub const SESSION_COOKIE: &str = "museum_session";
pub const SESSION_TTL_DAYS: i64 = 7;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Postgres SQLSTATE for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";
const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Clone, sqlx::FromRow)]
pub struct DbUserAuth {
    pub id: Uuid,
    pub password_hash: String,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    MissingFields,
    PasswordMismatch,
    UsernameTaken,
    EmailTaken,
}

impl RegistrationError {
    pub fn flash_code(self) -> &'static str {
        match self {
            RegistrationError::MissingFields => "missing_fields",
            RegistrationError::PasswordMismatch => "password_mismatch",
            RegistrationError::UsernameTaken => "username_taken",
            RegistrationError::EmailTaken => "email_taken",
        }
    }
}

/// A validated registration, ready to be hashed and stored.
#[derive(Debug, PartialEq, Eq)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password: &'a str,
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    if let Some(redirect) = redirect_if_authenticated(&state, &jar).await {
        return Err(redirect);
    }

    Ok(Html(render_login_page(&flash.render())))
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), Redirect> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(invalid_credentials());
    }

    let pool = state.pool();
    let user = match fetch_user_by_username(&pool, username).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(invalid_credentials()),
        Err(err) => {
            error!(?err, "failed to fetch user during login");
            return Err(Redirect::to(&with_error("/login", "unknown")));
        }
    };

    if !verify_password(&form.password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    let session_token = Uuid::new_v4();
    let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);

    if let Err(err) =
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_token)
            .bind(user.id)
            .bind(expires_at)
            .execute(state.pool_ref())
            .await
    {
        error!(?err, "failed to create session");
        return Err(Redirect::to(&with_error("/login", "unknown")));
    }

    info!(username, "user logged in");
    let jar = jar.add(session_cookie(session_token));
    Ok((jar, Redirect::to(&with_status("/", "logged_in"))))
}

pub async fn register_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, Redirect> {
    if let Some(redirect) = redirect_if_authenticated(&state, &jar).await {
        return Err(redirect);
    }

    Ok(Html(render_register_page(&flash.render())))
}

pub async fn process_register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Redirect {
    let new_user = match validate_registration(&form) {
        Ok(new_user) => new_user,
        Err(err) => return Redirect::to(&with_error("/register", err.flash_code())),
    };

    let password_hash = match hash_password(new_user.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash password during registration");
            return Redirect::to(&with_error("/register", "unknown"));
        }
    };

    match insert_user(
        state.pool_ref(),
        new_user.username,
        new_user.email,
        &password_hash,
        ROLE_USER,
    )
    .await
    {
        Ok(_) => {
            info!(username = new_user.username, "registered new user");
            Redirect::to(&with_status("/login", "registered"))
        }
        Err(err) => match registration_conflict(&err) {
            Some(conflict) => Redirect::to(&with_error("/register", conflict.flash_code())),
            None => {
                error!(?err, "failed to register user");
                Redirect::to(&with_error("/register", "unknown"))
            }
        },
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let mut jar = jar;

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(token) = Uuid::parse_str(cookie.value()) {
            if let Err(err) = sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(token)
                .execute(state.pool_ref())
                .await
            {
                error!(?err, "failed to remove session during logout");
            }
        }
    }

    jar = jar.remove(expired_session_cookie());

    (jar, Redirect::to(&with_status("/login", "logged_out")))
}

/// Checks the registration form before anything touches the database.
pub fn validate_registration(form: &RegisterForm) -> Result<NewUser<'_>, RegistrationError> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(RegistrationError::MissingFields);
    }

    if form.password != form.confirm_password {
        return Err(RegistrationError::PasswordMismatch);
    }

    let email = Some(form.email.trim()).filter(|email| !email.is_empty());

    Ok(NewUser {
        username,
        email,
        password: &form.password,
    })
}

/// Maps a unique violation on `users` to the field that collided.
pub fn classify_unique_violation(constraint: Option<&str>) -> RegistrationError {
    match constraint {
        Some(EMAIL_CONSTRAINT) => RegistrationError::EmailTaken,
        _ => RegistrationError::UsernameTaken,
    }
}

/// The registration failure a database error stands for, when it is a unique violation.
pub fn registration_conflict(err: &sqlx::Error) -> Option<RegistrationError> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Some(classify_unique_violation(db_err.constraint()))
        }
        _ => None,
    }
}

pub fn session_cookie(token: Uuid) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));
    cookie
}

/// Same name and path as [`session_cookie`], already expired.
pub fn expired_session_cookie() -> Cookie<'static> {
    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    removal
}

/// Resolves the signed-in user from the session cookie, if any.
pub async fn current_user(state: &AppState, jar: &CookieJar) -> Option<AuthUser> {
    let token_cookie = jar.get(SESSION_COOKIE)?;
    let token = Uuid::parse_str(token_cookie.value()).ok()?;
    let pool = state.pool();

    match fetch_user_by_session(&pool, token).await {
        Ok(user) => user,
        Err(err) => {
            error!(?err, "failed to resolve session");
            None
        }
    }
}

pub async fn require_user_redirect(state: &AppState, jar: &CookieJar) -> Result<AuthUser, Redirect> {
    current_user(state, jar)
        .await
        .ok_or_else(|| Redirect::to("/login"))
}

pub async fn redirect_if_authenticated(state: &AppState, jar: &CookieJar) -> Option<Redirect> {
    current_user(state, jar).await.map(|_| Redirect::to("/"))
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn insert_user(
    pool: &PgPool,
    username: &str,
    email: Option<&str>,
    password_hash: &str,
    role: &str,
) -> sqlx::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn fetch_user_by_username(
    pool: &PgPool,
    username: &str,
) -> sqlx::Result<Option<DbUserAuth>> {
    sqlx::query_as::<_, DbUserAuth>("SELECT id, password_hash FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user_by_session(pool: &PgPool, token: Uuid) -> sqlx::Result<Option<AuthUser>> {
    sqlx::query_as::<_, AuthUser>(
        "SELECT users.id, users.username, users.role FROM sessions JOIN users ON users.id = sessions.user_id WHERE sessions.id = $1 AND sessions.expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

fn invalid_credentials() -> Redirect {
    Redirect::to(&with_error("/login", "invalid_credentials"))
}

fn render_login_page(flash_html: &str) -> String {
    let body = r#"        <section class="panel" style="max-width: 460px; margin: 0 auto;">
            <h1>Log in</h1>
            <form method="post" action="/login">
                <label for="username">Username</label>
                <input id="username" name="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <button type="submit">Log in</button>
            </form>
            <p class="muted">No account yet? <a href="/register">Register</a>.</p>
        </section>"#;

    render_page(PageLayout::new("Log in", body).with_flash(flash_html))
}

fn render_register_page(flash_html: &str) -> String {
    let body = r#"        <section class="panel" style="max-width: 460px; margin: 0 auto;">
            <h1>Create an account</h1>
            <form method="post" action="/register">
                <label for="username">Username</label>
                <input id="username" name="username" required>
                <label for="email">Email</label>
                <input id="email" type="email" name="email">
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <label for="confirm_password">Confirm password</label>
                <input id="confirm_password" type="password" name="confirm_password" required>
                <button type="submit">Register</button>
            </form>
            <p class="muted">Already registered? <a href="/login">Log in</a>.</p>
        </section>"#;

    render_page(PageLayout::new("Register", body).with_flash(flash_html))
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, error::Error as StdError, fmt};

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct UniqueViolation {
        constraint: &'static str,
    }

    impl fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "duplicate key value violates unique constraint \"{}\"", self.constraint)
        }
    }

    impl StdError for UniqueViolation {}

    impl DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(UNIQUE_VIOLATION))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }
    }

    fn unique_violation(constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(UniqueViolation { constraint }))
    }

    fn form(username: &str, email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn hashed_password_verifies_only_with_the_original() {
        let hash = hash_password("p1").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("p1", &hash));
        assert!(!verify_password("p2", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("same").expect("hash");
        let second = hash_password("same").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("password123", "password123"));
        assert!(!verify_password("x", ""));
    }

    #[test]
    fn valid_registration_passes() {
        let form = form(" alice ", "a@x.com", "p1", "p1");
        let new_user = validate_registration(&form).expect("valid");
        assert_eq!(
            new_user,
            NewUser {
                username: "alice",
                email: Some("a@x.com"),
                password: "p1",
            }
        );
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let form = form("alice", "a@x.com", "p1", "p2");
        assert_eq!(
            validate_registration(&form),
            Err(RegistrationError::PasswordMismatch)
        );
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert_eq!(
            validate_registration(&form("   ", "", "p1", "p1")),
            Err(RegistrationError::MissingFields)
        );
        assert_eq!(
            validate_registration(&form("bob", "", "", "")),
            Err(RegistrationError::MissingFields)
        );
    }

    #[test]
    fn blank_email_is_stored_as_none() {
        let form = form("bob", "  ", "pw", "pw");
        assert_eq!(validate_registration(&form).expect("valid").email, None);
    }

    #[test]
    fn unique_violations_are_classified_by_constraint() {
        assert_eq!(
            classify_unique_violation(Some("users_email_key")),
            RegistrationError::EmailTaken
        );
        assert_eq!(
            classify_unique_violation(Some("users_username_key")),
            RegistrationError::UsernameTaken
        );
        assert_eq!(
            classify_unique_violation(None),
            RegistrationError::UsernameTaken
        );
        assert_eq!(RegistrationError::UsernameTaken.flash_code(), "username_taken");
    }

    #[test]
    fn admin_role_is_detected() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            role: ROLE_ADMIN.to_string(),
        };
        assert!(user.is_admin());
        let visitor = AuthUser {
            role: ROLE_USER.to_string(),
            ..user
        };
        assert!(!visitor.is_admin());
    }

    #[test]
    fn duplicate_username_insert_maps_to_username_taken() {
        let conflict = registration_conflict(&unique_violation("users_username_key"));
        assert_eq!(conflict, Some(RegistrationError::UsernameTaken));
        assert_eq!(conflict.map(RegistrationError::flash_code), Some("username_taken"));

        assert_eq!(
            registration_conflict(&unique_violation("users_email_key")),
            Some(RegistrationError::EmailTaken)
        );
        assert_eq!(registration_conflict(&sqlx::Error::RowNotFound), None);
    }

    #[test]
    fn session_cookie_is_http_only_lax_and_site_wide() {
        let token = Uuid::new_v4();
        let cookie = session_cookie(token);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), token.to_string());
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(SESSION_TTL_DAYS)));

        let removal = expired_session_cookie();
        assert_eq!(removal.name(), SESSION_COOKIE);
        assert_eq!(removal.path(), Some("/"));
        assert_eq!(removal.max_age(), Some(CookieDuration::seconds(0)));
    }
}
