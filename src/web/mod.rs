pub mod admin;
pub mod auth;
pub mod data;
pub mod flash;
pub mod gallery;
pub mod landing;
pub mod models;
pub mod pages;
pub mod router;
pub mod shop;
pub mod state;
pub mod storage;
pub mod templates;
pub mod uploads;

pub use auth::AuthUser;
pub use state::AppState;
pub use templates::escape_html;
