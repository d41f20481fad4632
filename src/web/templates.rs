use std::borrow::Cow;

use chrono::{Datelike, Utc};

use crate::web::AuthUser;

const SITE_NAME: &str = "City Art Museum";

const BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: Georgia, "Times New Roman", serif; margin: 0; background: #faf7f2; color: #1f2933; min-height: 100vh; display: flex; flex-direction: column; }
        header { background: #1f2933; color: #faf7f2; padding: 1.25rem clamp(1rem, 5vw, 3rem); }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .brand { color: #faf7f2; text-decoration: none; font-size: 1.5rem; font-weight: 700; letter-spacing: 0.02em; }
        nav { display: flex; flex-wrap: wrap; gap: 0.9rem; align-items: center; }
        nav a { color: #e5ded3; text-decoration: none; font-size: 0.95rem; }
        nav a:hover { color: #ffffff; text-decoration: underline; }
        .account { display: flex; gap: 0.75rem; align-items: center; font-size: 0.9rem; color: #cbd2d9; }
        .account a { color: #fbbf24; text-decoration: none; font-weight: 600; }
        main { flex: 1; padding: 2rem clamp(1rem, 5vw, 3rem); max-width: 1100px; margin: 0 auto; width: 100%; box-sizing: border-box; }
        h1 { margin-top: 0; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e4ddd2; padding: 1.5rem; margin-bottom: 1.5rem; box-shadow: 0 12px 30px rgba(31, 41, 51, 0.06); }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-top: 1rem; font-weight: 600; }
        input, select, textarea { width: 100%; padding: 0.7rem; margin-top: 0.4rem; border-radius: 8px; border: 1px solid #d3c7b6; background: #fffdf9; box-sizing: border-box; font: inherit; }
        textarea { min-height: 6rem; }
        button { margin-top: 1.25rem; padding: 0.75rem 1.3rem; border: none; border-radius: 8px; background: #9a3412; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #7c2d12; }
        .flash { padding: 0.9rem 1.2rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .grid { display: grid; gap: 1.25rem; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); }
        .card { background: #ffffff; border: 1px solid #e4ddd2; border-radius: 12px; overflow: hidden; text-decoration: none; color: inherit; display: flex; flex-direction: column; }
        .card img { width: 100%; height: 180px; object-fit: cover; background: #efe9df; }
        .card .body { padding: 0.9rem 1rem; }
        .card h3 { margin: 0 0 0.35rem; font-size: 1.05rem; }
        .card p { margin: 0; color: #52606d; font-size: 0.9rem; }
        .muted { color: #7b8794; }
        table { width: 100%; border-collapse: collapse; background: #ffffff; }
        th, td { padding: 0.6rem 0.8rem; border-bottom: 1px solid #e4ddd2; text-align: left; }
        th { background: #f3eee6; }
        .app-footer { margin: 3rem 0 1.5rem; text-align: center; font-size: 0.85rem; color: #7b8794; }
        @media (max-width: 768px) {
            .header-bar { flex-direction: column; align-items: flex-start; }
        }
"#;

const NAV_LINKS: &[(&str, &str)] = &[
    ("/gallery", "Gallery"),
    ("/museum", "Museum"),
    ("/museum/collection", "Collection"),
    ("/view_artworks", "Artworks"),
    ("/view_exhibitions", "Exhibitions"),
    ("/view_events", "Events"),
    ("/shop", "Shop"),
    ("/membership", "Membership"),
    ("/contact", "Contact"),
];

pub struct PageLayout<'a> {
    pub title: &'a str,
    pub user: Option<&'a AuthUser>,
    pub flash_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
}

impl<'a> PageLayout<'a> {
    pub fn new(title: &'a str, body_html: impl Into<Cow<'a, str>>) -> Self {
        Self {
            title,
            user: None,
            flash_html: Cow::Borrowed(""),
            body_html: body_html.into(),
        }
    }

    pub fn with_user(mut self, user: Option<&'a AuthUser>) -> Self {
        self.user = user;
        self
    }

    pub fn with_flash(mut self, flash_html: impl Into<Cow<'a, str>>) -> Self {
        self.flash_html = flash_html.into();
        self
    }
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        user,
        flash_html,
        body_html,
    } = layout;

    let nav = NAV_LINKS
        .iter()
        .map(|(href, label)| format!(r#"<a href="{href}">{label}</a>"#))
        .collect::<String>();

    let account = match user {
        Some(user) => {
            let admin_link = if user.is_admin() {
                r#"<a href="/admin">Admin</a>"#
            } else {
                ""
            };
            format!(
                r#"<span>Signed in as <strong>{username}</strong></span><a href="/">Home</a>{admin_link}<a href="/logout">Log out</a>"#,
                username = escape_html(&user.username),
            )
        }
        None => r#"<a href="/login">Log in</a><a href="/register">Register</a>"#.to_string(),
    };

    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} · {site}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <a class="brand" href="/gallery">{site}</a>
            <nav>{nav}</nav>
            <div class="account">{account}</div>
        </div>
    </header>
    <main>
        {flash_html}
{body_html}
        {footer}
    </main>
</body>
</html>"#,
        title = escape_html(title),
        site = SITE_NAME,
        styles = BASE_STYLES,
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} {SITE_NAME}. <a href="/privacy-policy">Privacy policy</a></footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Percent-encodes a single path segment for use in an `href`.
pub fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn escape_html_neutralises_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
    }

    #[test]
    fn encode_path_segment_escapes_reserved_bytes() {
        assert_eq!(encode_path_segment("a b.png"), "a%20b.png");
        assert_eq!(encode_path_segment("x/y"), "x%2Fy");
        assert_eq!(encode_path_segment("plain-name_1.jpg"), "plain-name_1.jpg");
    }

    #[test]
    fn anonymous_layout_offers_login() {
        let html = render_page(PageLayout::new("Gallery", "<p>body</p>"));
        assert!(html.contains(r#"href="/login""#));
        assert!(html.contains("<p>body</p>"));
        assert!(!html.contains("/admin"));
    }

    #[test]
    fn admin_layout_links_dashboard_and_escapes_name() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            username: "<admin>".to_string(),
            role: "admin".to_string(),
        };
        let html = render_page(
            PageLayout::new("Home", "")
                .with_user(Some(&user))
                .with_flash(r#"<div class="flash success">hi</div>"#),
        );
        assert!(html.contains(r#"href="/admin""#));
        assert!(html.contains("&lt;admin&gt;"));
        assert!(html.contains("flash success"));
    }
}
