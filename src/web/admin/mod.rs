mod auth;
mod dashboard;

pub use dashboard::dashboard;
