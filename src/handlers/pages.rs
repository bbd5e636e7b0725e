use crate::{
    client::PublicOrigin,
    handlers::{rows, LinkRow},
    models::StoreSummary,
    AppState,
};
use askama::Template;
use axum::extract::{Query, State};
use serde::Deserialize;
use std::sync::Arc;

/// Links listed on the statistics page.
const STATS_TOP: i64 = 5;

/// `/top` limit choices; 0 means every link.
const TOP_LIMIT_CHOICES: [(i64, &str); 5] = [
    (10, "10 links"),
    (25, "25 links"),
    (50, "50 links"),
    (100, "100 links"),
    (0, "All links"),
];

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub origin: String,
    pub data_file: String,
    pub result: Option<String>,
    pub notice: Option<String>,
}

impl HomeTemplate {
    pub fn new(state: &AppState, origin: &PublicOrigin) -> Self {
        Self {
            origin: origin.0.clone(),
            data_file: state.store.path().display().to_string(),
            result: None,
            notice: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

#[derive(Template)]
#[template(path = "stats.html")]
pub struct StatsTemplate {
    summary: StoreSummary,
    top: Vec<LinkRow>,
}

#[derive(Template)]
#[template(path = "top.html")]
pub struct TopTemplate {
    links: Vec<LinkRow>,
    choices: Vec<LimitChoice>,
    summary: StoreSummary,
}

pub struct LimitChoice {
    value: i64,
    label: &'static str,
    selected: bool,
}

// ── Query types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct HomeQuery {
    result: Option<String>,
}

#[derive(Deserialize)]
pub struct TopQuery {
    limit: Option<String>,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
/// Shorten form, plus the freshly created link when redirected from /shorten.
pub async fn index(
    State(state): State<Arc<AppState>>,
    origin: PublicOrigin,
    Query(query): Query<HomeQuery>,
) -> HomeTemplate {
    // Only echo back something that is actually a link.
    let result = query
        .result
        .filter(|r| r.starts_with("http://") || r.starts_with("https://"));

    HomeTemplate {
        result,
        ..HomeTemplate::new(&state, &origin)
    }
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>, origin: PublicOrigin) -> StatsTemplate {
    StatsTemplate {
        summary: state.store.summary().await,
        top: rows(state.store.top(STATS_TOP).await, &origin),
    }
}

/// GET /top?limit=N
/// An unparsable limit falls back to the configured default.
pub async fn top(
    State(state): State<Arc<AppState>>,
    origin: PublicOrigin,
    Query(query): Query<TopQuery>,
) -> TopTemplate {
    let limit = query
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<i64>().ok())
        .unwrap_or(state.config.top_default_limit);

    let choices = TOP_LIMIT_CHOICES
        .iter()
        .map(|&(value, label)| LimitChoice {
            value,
            label,
            selected: value == limit || (value == 0 && limit < 0),
        })
        .collect();

    TopTemplate {
        links: rows(state.store.top(limit).await, &origin),
        choices,
        summary: state.store.summary().await,
    }
}
