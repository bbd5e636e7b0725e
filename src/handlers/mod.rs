pub mod links;
pub mod pages;
pub mod redirect;

#[cfg(test)]
mod tests;

use crate::{client::PublicOrigin, models::Link};

/// One link as the HTML pages display it.
#[derive(Debug, Clone)]
pub struct LinkRow {
    pub rank: usize,
    pub rank_class: &'static str,
    pub short_code: String,
    pub short_url: String,
    pub original_url: String,
    pub visits: u64,
    pub activity: &'static str,
    pub created: String,
}

impl LinkRow {
    /// `rank` is 1-based.
    pub fn new(rank: usize, link: Link, origin: &PublicOrigin) -> Self {
        Self {
            rank,
            rank_class: rank_class(rank),
            short_url: origin.short_url(&link.short_code),
            created: link.created_at.format("%d.%m.%Y %H:%M").to_string(),
            activity: activity_icon(link.visits),
            visits: link.visits,
            short_code: link.short_code,
            original_url: link.original_url,
        }
    }
}

/// Turn already-ordered links into display rows.
pub fn rows(links: Vec<Link>, origin: &PublicOrigin) -> Vec<LinkRow> {
    links
        .into_iter()
        .enumerate()
        .map(|(i, link)| LinkRow::new(i + 1, link, origin))
        .collect()
}

/// Podium styling for the first three places.
fn rank_class(rank: usize) -> &'static str {
    match rank {
        1 => "rank-1",
        2 => "rank-2",
        3 => "rank-3",
        _ => "",
    }
}

fn activity_icon(visits: u64) -> &'static str {
    match visits {
        100.. => "🔥",
        50..=99 => "🚀",
        10..=49 => "⚡",
        _ => "📈",
    }
}
