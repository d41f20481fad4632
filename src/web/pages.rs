use axum::{
    extract::{Form, Path as AxumPath, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info};

use crate::web::{
    AppState, AuthUser, auth,
    data::{self, EVENTS},
    escape_html,
    flash::{FlashQuery, compose_flash_message, with_error, with_status},
    models::ExhibitionRow,
    templates::{PageLayout, render_page},
};

/// (slug, name, yearly price, summary)
const MEMBERSHIP_PLANS: &[(&str, &str, &str, &str)] = &[
    (
        "individual",
        "Individual",
        "$60",
        "Unlimited free admission for one and members-only previews.",
    ),
    (
        "family",
        "Family",
        "$110",
        "Admission for two adults and children under 18, plus family workshops.",
    ),
    (
        "patron",
        "Patron",
        "$350",
        "All family benefits, curator tours and a reserved seat at exhibition openings.",
    ),
];

/// Name, email and message, shared by the contact-style forms.
#[derive(Debug, Default, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl MessageForm {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.message.trim().is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

async fn static_page(state: &AppState, jar: &CookieJar, title: &str, body: &str) -> Html<String> {
    let user = auth::current_user(state, jar).await;
    Html(render_page(
        PageLayout::new(title, body).with_user(user.as_ref()),
    ))
}

pub async fn museum(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let body = r#"        <section class="panel">
            <h1>About the museum</h1>
            <p>Founded to bring art closer to everyone, the museum houses paintings, drawings, sculpture, photography and digital works from local and international artists.</p>
            <p>Open Tuesday to Sunday, 10:00 to 18:00. Late opening every Thursday until 21:00.</p>
            <p><a href="/museum/collection">Explore the collection</a> · <a href="/view_exhibitions">Current exhibitions</a></p>
        </section>"#;
    static_page(&state, &jar, "Museum", body).await
}

pub async fn museum_collection(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let body = r#"        <section class="panel">
            <h1>The collection</h1>
            <p>The permanent collection spans five departments: Painting, Drawing, Sculpture, Photography and Digital Art.</p>
            <p>Browse every catalogued work on the <a href="/view_artworks">artworks page</a> or by department in the <a href="/gallery">gallery</a>.</p>
        </section>"#;
    static_page(&state, &jar, "Collection", body).await
}

pub async fn membership(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let plans = MEMBERSHIP_PLANS
        .iter()
        .map(|(slug, name, price, summary)| {
            format!(
                r#"<div class="card"><div class="body"><h3>{name}</h3><p>{price} per year</p><p>{summary}</p><p><a href="/membership/signup/{slug}">Join as {name}</a></p></div></div>"#
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <h1>Membership</h1>
        <p class="muted">Support the museum and enjoy a year of free visits.</p>
        <div class="grid">{plans}</div>"#
    );
    static_page(&state, &jar, "Membership", &body).await
}

pub async fn contact(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;
    let body = format!(
        r#"        <section class="panel">
            <h1>Contact us</h1>
            <p>City Art Museum, 1 Gallery Road. Phone +1 555 0100.</p>
            {form}
        </section>"#,
        form = message_form("/submit_inquiry", "Send inquiry"),
    );

    Html(render_page(
        PageLayout::new("Contact", body)
            .with_user(user.as_ref())
            .with_flash(flash.render()),
    ))
}

pub async fn privacy_policy(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let body = r#"        <section class="panel">
            <h1>Privacy policy</h1>
            <p>We store the username, email address and a salted password hash you provide at registration, and a session identifier while you are signed in.</p>
            <p>Messages and orders submitted through our forms are used only to respond to you. We do not sell personal data.</p>
            <p>Uploaded images are stored on our servers and shown in the public gallery.</p>
        </section>"#;
    static_page(&state, &jar, "Privacy policy", body).await
}

pub async fn our_collection(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;
    let body = format!(
        r#"        <section class="panel">
            <h1>Our collection</h1>
            <p>Have a question about a work in the collection, or an object you would like to offer? Write to our curators.</p>
            {form}
        </section>"#,
        form = message_form("/our_collection", "Send message"),
    );

    Html(render_page(
        PageLayout::new("Our collection", body)
            .with_user(user.as_ref())
            .with_flash(flash.render()),
    ))
}

pub async fn submit_collection_message(Form(form): Form<MessageForm>) -> Redirect {
    if !form.is_complete() {
        return Redirect::to(&with_error("/our_collection", "missing_fields"));
    }
    info!("collection message received");
    Redirect::to(&with_status("/our_collection", "message_received"))
}

pub async fn submit_inquiry(Form(form): Form<MessageForm>) -> Redirect {
    if !form.is_complete() {
        return Redirect::to(&with_error("/contact", "missing_fields"));
    }
    info!("inquiry received");
    Redirect::to(&with_status("/contact", "inquiry_received"))
}

pub async fn membership_signup(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(plan): AxumPath<String>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;
    Html(render_signup_page(user.as_ref(), &plan, ""))
}

pub async fn process_membership_signup(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(plan): AxumPath<String>,
    Form(form): Form<SignupForm>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;

    let flash_html = if form.name.trim().is_empty() || form.email.trim().is_empty() {
        compose_flash_message(None, Some("missing_fields"))
    } else {
        info!(plan = %plan, "membership signup received");
        compose_flash_message(Some("membership_requested"), None)
    };

    Html(render_signup_page(user.as_ref(), &plan, &flash_html))
}

pub async fn view_events(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let rows = EVENTS
        .iter()
        .map(|event| {
            format!(
                "<tr><td>{name}</td><td>{date}</td><td>{location}</td><td>{description}</td></tr>",
                name = event.name,
                date = event.date,
                location = event.location,
                description = event.description,
            )
        })
        .collect::<String>();

    let body = format!(
        r#"        <h1>Events</h1>
        <table>
            <thead><tr><th>Event</th><th>Date</th><th>Location</th><th>Details</th></tr></thead>
            <tbody>{rows}</tbody>
        </table>"#
    );
    static_page(&state, &jar, "Events", &body).await
}

pub async fn view_exhibitions(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;

    let (exhibitions, flash_html) = match data::fetch_exhibitions(state.pool_ref()).await {
        Ok(rows) => (rows, String::new()),
        Err(err) => {
            error!(?err, "failed to load exhibitions");
            (Vec::new(), compose_flash_message(None, Some("unknown")))
        }
    };

    let body = format!(
        r#"        <h1>Exhibitions</h1>
{list}"#,
        list = render_exhibitions(&exhibitions),
    );

    Html(render_page(
        PageLayout::new("Exhibitions", body)
            .with_user(user.as_ref())
            .with_flash(flash_html),
    ))
}

fn render_exhibitions(exhibitions: &[ExhibitionRow]) -> String {
    if exhibitions.is_empty() {
        return r#"        <p class="muted">No exhibitions are scheduled.</p>"#.to_string();
    }

    exhibitions
        .iter()
        .map(|exhibition| {
            let description = exhibition
                .description
                .as_deref()
                .map(|text| format!("<p>{}</p>", escape_html(text)))
                .unwrap_or_default();
            format!(
                r#"        <section class="panel" id="exhibition-{id}">
            <h2>{title}</h2>
            <p class="muted">{location} · {start} to {end}</p>
            {description}
        </section>
"#,
                id = exhibition.id,
                title = escape_html(&exhibition.title),
                location = escape_html(&exhibition.location),
                start = exhibition.start_date.format("%B %-d, %Y"),
                end = exhibition.end_date.format("%B %-d, %Y"),
            )
        })
        .collect()
}

fn render_signup_page(user: Option<&AuthUser>, plan: &str, flash_html: &str) -> String {
    let plan_name = MEMBERSHIP_PLANS
        .iter()
        .find(|(slug, ..)| *slug == plan)
        .map(|(_, name, ..)| name.to_string())
        .unwrap_or_else(|| plan.to_string());
    let plan_name = escape_html(&plan_name);
    let action = format!("/membership/signup/{}", escape_html(plan));

    let body = format!(
        r#"        <section class="panel" style="max-width: 520px;">
            <h1>Join: {plan_name}</h1>
            <form method="post" action="{action}">
                <label for="name">Full name</label>
                <input id="name" name="name" required>
                <label for="email">Email</label>
                <input id="email" type="email" name="email" required>
                <button type="submit">Sign up</button>
            </form>
        </section>"#
    );

    render_page(
        PageLayout::new("Membership signup", body)
            .with_user(user)
            .with_flash(flash_html),
    )
}

fn message_form(action: &str, button: &str) -> String {
    format!(
        r#"<form method="post" action="{action}">
                <label for="name">Name</label>
                <input id="name" name="name" required>
                <label for="email">Email</label>
                <input id="email" type="email" name="email" required>
                <label for="message">Message</label>
                <textarea id="message" name="message" required></textarea>
                <button type="submit">{button}</button>
            </form>"#
    )
}
