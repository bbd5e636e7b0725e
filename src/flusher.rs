use crate::store::{LinkStore, PersistRequests};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

/// Handle to the background saver started by [`spawn`].
pub struct Flusher {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Flusher {
    /// Ask the task to stop and wait for it. A save already in progress runs
    /// to completion first, so nothing else writes the snapshot afterwards.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Flusher task ended abnormally: {e}");
        }
    }
}

/// Spawn the background task that writes the link snapshot.
///
/// It saves whenever a visit posts a request on `requests`, and in any case
/// every `every` so unsaved state never lives longer than one interval. The
/// redirect handler never waits on any of this. Dropping the returned
/// [`Flusher`] also stops the task, between saves.
pub fn spawn(store: Arc<LinkStore>, mut requests: PersistRequests, every: Duration) -> Flusher {
    let (stop, mut stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let reason = tokio::select! {
                _ = &mut stopped => break,
                request = requests.recv() => match request {
                    Some(()) => "visit",
                    None => break,
                },
                _ = ticker.tick() => "autosave",
            };

            match store.persist().await {
                Ok(()) => tracing::debug!("Saved links to {} ({})", store.path().display(), reason),
                Err(e) => tracing::error!("Background save failed ({}): {e}", reason),
            }
        }

        tracing::debug!("Flusher stopped");
    });

    Flusher { stop, task }
}
