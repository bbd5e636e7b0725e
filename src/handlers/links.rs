use crate::{
    client::{ClientIp, PublicOrigin},
    handlers::{pages::HomeTemplate, rows, LinkRow},
    store::by_popularity,
    AppState,
};
use askama::Template;
use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "my.html")]
pub struct MyLinksTemplate {
    ip: String,
    links: Vec<LinkRow>,
}

// ── Form types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ShortenForm {
    #[serde(default)]
    url: String,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// POST /shorten
pub async fn shorten(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    origin: PublicOrigin,
    Form(form): Form<ShortenForm>,
) -> Response {
    let url = form.url.trim();
    if url.is_empty() {
        return Redirect::to("/").into_response();
    }

    match state.store.create(url, &ip).await {
        Ok(short_code) => {
            let short_url = origin.short_url(&short_code);
            Redirect::to(&format!("/?result={}", urlencoding::encode(&short_url))).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to create link for {}: {}", ip, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                HomeTemplate::new(&state, &origin)
                    .with_notice("Could not create a short link right now. Please try again."),
            )
                .into_response()
        }
    }
}

/// GET /shorten
pub async fn shorten_page() -> Redirect {
    Redirect::to("/")
}

/// GET /my
/// The requester's links, most visited first.
pub async fn my_links(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    origin: PublicOrigin,
) -> MyLinksTemplate {
    let mut links = state.store.list_by_owner(&ip).await;
    links.sort_by(by_popularity);

    MyLinksTemplate {
        links: rows(links, &origin),
        ip,
    }
}

/// POST /delete/:code
/// Not-found and not-yours both end up back on /my without comment.
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Path(code): Path<String>,
) -> Redirect {
    if !state.store.delete(&code, &ip).await {
        tracing::debug!("Ignored delete of '{}' from {}", code, ip);
    }
    Redirect::to("/my")
}
