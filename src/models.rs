use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shortened link as held in memory and written to the snapshot file.
///
/// Field names on disk stay `ip` / `visits` so snapshots written by older
/// deployments keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub original_url: String,
    pub short_code: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "ip")]
    pub owner_ip: String,
    pub visits: u64,
}

/// Aggregate numbers shown on the statistics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreSummary {
    pub total_links: usize,
    pub total_visits: u64,
    /// Distinct owner IPs that currently own at least one link.
    pub owners: usize,
}
