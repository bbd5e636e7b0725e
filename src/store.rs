use crate::{
    code::{self, CODE_LEN},
    models::{Link, StoreSummary},
};
use chrono::Utc;
use std::{
    cmp::Ordering,
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};
use tokio::sync::{mpsc, Mutex, RwLock};

/// How many fresh codes `create` draws before giving up on a collision streak.
const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot is not a valid link list: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no unused short code found after {0} attempts")]
    CodeSpaceExhausted(usize),
}

/// Receiving half of the persist-request channel, drained by the flusher.
pub type PersistRequests = mpsc::Receiver<()>;

type CodeSource = Box<dyn Fn() -> String + Send + Sync>;

// ── Tables ─────────────────────────────────────────────────────────────────

/// Record table plus the owner index derived from it. Always mutated through
/// `insert` / `remove` so the two never disagree.
#[derive(Default)]
struct Tables {
    links: HashMap<String, Link>,
    owners: HashMap<String, Vec<String>>,
}

impl Tables {
    fn from_links(mut links: Vec<Link>) -> Self {
        // Owner lists are kept in creation order.
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let mut tables = Self::default();
        for link in links {
            tables.insert(link);
        }
        tables
    }

    fn insert(&mut self, link: Link) {
        if let Some(previous) = self.links.remove(&link.short_code) {
            self.unlink_owner(&previous.owner_ip, &previous.short_code);
        }
        self.owners
            .entry(link.owner_ip.clone())
            .or_default()
            .push(link.short_code.clone());
        self.links.insert(link.short_code.clone(), link);
    }

    fn remove(&mut self, short_code: &str) -> Option<Link> {
        let link = self.links.remove(short_code)?;
        self.unlink_owner(&link.owner_ip, short_code);
        Some(link)
    }

    fn unlink_owner(&mut self, owner_ip: &str, short_code: &str) {
        if let Some(codes) = self.owners.get_mut(owner_ip) {
            codes.retain(|c| c != short_code);
            if codes.is_empty() {
                self.owners.remove(owner_ip);
            }
        }
    }
}

// ── Link store ─────────────────────────────────────────────────────────────

/// All short links, guarded by one readers-writer lock and mirrored to a JSON
/// snapshot on disk.
///
/// Creates and deletes save the snapshot before returning. Visit increments
/// only post a request to the background flusher (see `flusher::spawn`), so a
/// redirect never waits on disk I/O.
pub struct LinkStore {
    tables: RwLock<Tables>,
    path: PathBuf,
    /// Serializes snapshot writes so an older snapshot can't land after a newer one.
    save_lock: Mutex<()>,
    persist_tx: mpsc::Sender<()>,
    next_code: CodeSource,
}

impl LinkStore {
    /// Load the snapshot at `path` and build the store from it.
    ///
    /// A missing file yields an empty store. An unreadable or malformed file
    /// is logged and also yields an empty store; startup never fails here.
    pub async fn load(path: impl Into<PathBuf>) -> (Self, PersistRequests) {
        let path = path.into();
        let links = match read_snapshot(&path).await {
            Ok(Some(links)) => {
                tracing::info!("Loaded {} link(s) from {}", links.len(), path.display());
                links
            }
            Ok(None) => {
                tracing::info!("No snapshot at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Ignoring unusable snapshot, starting empty: {e}");
                Vec::new()
            }
        };
        Self::from_links(path, links)
    }

    fn from_links(path: PathBuf, links: Vec<Link>) -> (Self, PersistRequests) {
        // Capacity 1: while one save is queued, further requests fold into it.
        let (persist_tx, persist_rx) = mpsc::channel(1);
        let store = Self {
            tables: RwLock::new(Tables::from_links(links)),
            path,
            save_lock: Mutex::new(()),
            persist_tx,
            next_code: Box::new(|| code::random_code(CODE_LEN)),
        };
        (store, persist_rx)
    }

    #[cfg(test)]
    pub(crate) fn with_code_source(
        mut self,
        source: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.next_code = Box::new(source);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shorten `original_url` on behalf of `owner_ip` and return the new code.
    ///
    /// Codes already in use are redrawn; after `MAX_CODE_ATTEMPTS` straight
    /// collisions the create fails with `CodeSpaceExhausted`.
    pub async fn create(&self, original_url: &str, owner_ip: &str) -> Result<String, StoreError> {
        let short_code = {
            let mut tables = self.tables.write().await;
            let short_code = self.fresh_code(&tables)?;
            tables.insert(Link {
                original_url: normalize_url(original_url),
                short_code: short_code.clone(),
                created_at: Utc::now(),
                owner_ip: owner_ip.to_owned(),
                visits: 0,
            });
            short_code
        };

        tracing::info!("Created link '{}' for {}", short_code, owner_ip);
        self.persist_logged().await;
        Ok(short_code)
    }

    /// Look up `short_code`, count the visit and return the target URL.
    pub async fn resolve(&self, short_code: &str) -> Option<String> {
        if !self.tables.read().await.links.contains_key(short_code) {
            return None;
        }

        let original_url = {
            let mut tables = self.tables.write().await;
            // May have been deleted between the two guards.
            let link = tables.links.get_mut(short_code)?;
            link.visits += 1;
            link.original_url.clone()
        };

        self.request_persist();
        Some(original_url)
    }

    /// Delete `short_code` if `requester_ip` owns it. Returns whether anything
    /// was removed; a missing code and a foreign owner look the same.
    pub async fn delete(&self, short_code: &str, requester_ip: &str) -> bool {
        let removed = {
            let mut tables = self.tables.write().await;
            let owned = tables
                .links
                .get(short_code)
                .is_some_and(|link| link.owner_ip == requester_ip);
            owned && tables.remove(short_code).is_some()
        };

        if removed {
            tracing::info!("Deleted link '{}' (owner {})", short_code, requester_ip);
            self.persist_logged().await;
        }
        removed
    }

    /// Every live link owned by `owner_ip`, in creation order.
    pub async fn list_by_owner(&self, owner_ip: &str) -> Vec<Link> {
        let tables = self.tables.read().await;
        tables
            .owners
            .get(owner_ip)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|c| tables.links.get(c))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Up to `n` links ranked by [`by_popularity`]. `n <= 0` returns all of them.
    pub async fn top(&self, n: i64) -> Vec<Link> {
        let mut links: Vec<Link> = self.tables.read().await.links.values().cloned().collect();
        links.sort_by(by_popularity);
        if n > 0 {
            links.truncate(usize::try_from(n).unwrap_or(usize::MAX));
        }
        links
    }

    pub async fn summary(&self) -> StoreSummary {
        let tables = self.tables.read().await;
        StoreSummary {
            total_links: tables.links.len(),
            total_visits: tables.links.values().map(|l| l.visits).sum(),
            owners: tables.owners.len(),
        }
    }

    /// Write every link to the snapshot file, replacing its previous contents.
    /// The owner index is not written; `load` derives it again.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let _saving = self.save_lock.lock().await;

        let json = {
            let tables = self.tables.read().await;
            let mut links: Vec<&Link> = tables.links.values().collect();
            links.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.short_code.cmp(&b.short_code))
            });
            serde_json::to_string_pretty(&links)?
        };

        write_snapshot(&self.path, json.as_bytes()).await
    }

    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            tracing::error!("Failed to save links: {e}");
        }
    }

    fn request_persist(&self) {
        // Full means a save is already queued; closed means no flusher is running.
        let _ = self.persist_tx.try_send(());
    }

    fn fresh_code(&self, tables: &Tables) -> Result<String, StoreError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = (self.next_code)();
            if !tables.links.contains_key(&candidate)
                && !code::RESERVED.contains(&candidate.as_str())
            {
                return Ok(candidate);
            }
            tracing::warn!("Short code '{}' already taken, drawing another", candidate);
        }
        Err(StoreError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Ranking order: most visits first, then most recently created.
pub fn by_popularity(a: &Link, b: &Link) -> Ordering {
    b.visits
        .cmp(&a.visits)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Trim the input and default to `https://` when no http(s) scheme is present.
pub fn normalize_url(raw: &str) -> String {
    let url = raw.trim();
    let has_scheme = ["http://", "https://"].iter().any(|scheme| {
        url.len() >= scheme.len()
            && url.as_bytes()[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
    });

    if has_scheme {
        url.to_owned()
    } else {
        format!("https://{url}")
    }
}

async fn read_snapshot(path: &Path) -> Result<Option<Vec<Link>>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_owned(),
                source,
            })
        }
    };

    // An empty store may have been written as `null`.
    let links: Option<Vec<Link>> = serde_json::from_slice(&bytes)?;
    Ok(Some(links.unwrap_or_default()))
}

async fn write_snapshot(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_owned(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }

    // Write beside the snapshot and rename over it, so a crash mid-save
    // leaves the previous snapshot intact.
    let staging = staging_path(path);
    let written = match tokio::fs::write(&staging, contents).await {
        Ok(()) => tokio::fs::rename(&staging, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(io_err(e));
    }
    Ok(())
}

/// `links.json` → `links.json.tmp`, in the same directory so the rename
/// stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
