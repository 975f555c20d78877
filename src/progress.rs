//! Progress UI for download runs, driven by scheduler events.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use resource_harvester::DownloadEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawns a progress bar that follows `events` until the batch completes.
///
/// Returns `None` when `enabled` is false.
pub(crate) fn spawn_progress_ui(
    enabled: bool,
    mut events: broadcast::Receiver<DownloadEvent>,
    total: usize,
) -> Option<JoinHandle<()>> {
    if !enabled {
        return None;
    }

    Some(tokio::spawn(async move {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        loop {
            match events.recv().await {
                Ok(DownloadEvent::Started { url, .. }) => bar.set_message(url),
                Ok(DownloadEvent::Retrying { url, attempt, .. }) => {
                    bar.set_message(format!("{url} (attempt {attempt})"));
                }
                Ok(DownloadEvent::Progress { completed, .. }) => bar.set_position(completed as u64),
                Ok(DownloadEvent::Failed { url, kind, .. }) => {
                    bar.println(format!("failed ({kind}): {url}"));
                }
                Ok(DownloadEvent::Succeeded { .. }) => {}
                Ok(DownloadEvent::BatchComplete { .. }) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress UI lagged"),
            }
        }

        bar.finish_and_clear();
    }))
}
