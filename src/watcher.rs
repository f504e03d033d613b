//! Reload the corpus when files in the data directory change.
//!
//! Filesystem events are collected until the directory has been quiet for
//! [`QUIET_PERIOD`], then a single reload runs and publishes a new snapshot.
//! A failed reload leaves the previous snapshot in place.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::corpus::{Corpus, CorpusLoader};

pub const QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Keeps the OS watcher and the reload task alive. Dropping it stops both.
pub struct CorpusWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl CorpusWatcher {
    /// Watch the loader's data directory. Must be called inside a tokio runtime.
    pub fn start(loader: CorpusLoader, corpus: Arc<Corpus>) -> notify::Result<Self> {
        let data_dir = loader.config().data_dir();
        let extensions = loader.config().file_extensions.clone();
        let (tx, mut rx) = unbounded_channel::<()>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if is_relevant(&event, &extensions) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => warn!("Watch error: {e}"),
            }
        })?;
        watcher.watch(&data_dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for changes", data_dir.display());

        let task = tokio::spawn(async move {
            while wait_for_quiet(&mut rx, QUIET_PERIOD).await {
                match loader.reload_into(&corpus).await {
                    Ok((version, report)) => info!(
                        "Corpus changed, reloaded {} documents as v{version}",
                        report.documents
                    ),
                    Err(e) => warn!("Reload failed, keeping the current snapshot: {e}"),
                }
            }
            debug!("Corpus watcher stopped");
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for CorpusWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Wait for one event, then until no event arrives for `quiet`.
/// Returns `false` once the sender side is gone.
pub(crate) async fn wait_for_quiet(rx: &mut UnboundedReceiver<()>, quiet: Duration) -> bool {
    if rx.recv().await.is_none() {
        return false;
    }
    loop {
        match tokio::time::timeout(quiet, rx.recv()).await {
            Ok(Some(())) => continue,
            Ok(None) | Err(_) => return true,
        }
    }
}

fn is_relevant(event: &Event, extensions: &[String]) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|p| has_extension(p, extensions))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind};
    use std::path::PathBuf;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_relevance_filters_extension_and_access() {
        let exts = vec!["txt".to_string()];
        assert!(is_relevant(
            &event(EventKind::Create(CreateKind::File), "/d/rules.TXT"),
            &exts
        ));
        assert!(!is_relevant(
            &event(EventKind::Create(CreateKind::File), "/d/notes.md"),
            &exts
        ));
        assert!(!is_relevant(
            &event(EventKind::Access(AccessKind::Any), "/d/rules.txt"),
            &exts
        ));
    }

    #[tokio::test]
    async fn test_burst_collapses_into_one_wakeup() {
        let (tx, mut rx) = unbounded_channel();
        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        assert!(wait_for_quiet(&mut rx, Duration::from_millis(20)).await);
        assert!(rx.try_recv().is_err());

        drop(tx);
        assert!(!wait_for_quiet(&mut rx, Duration::from_millis(20)).await);
    }
}
