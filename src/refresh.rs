//! The refresh driver: fetch, parse, index, build, publish.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::fetch::MailSource;
use crate::index::snapshot::{MailboxIndex, SnapshotHolder};
use crate::parser::metadata::parse_batch;

/// Counts describing one completed refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    /// Messages returned by the mailbox source.
    pub fetched: usize,
    /// Messages that made it into the snapshot.
    pub indexed: usize,
    /// Messages left out (no subject, duplicate uid).
    pub skipped: usize,
    /// Inodes in the published tree, root included.
    pub inodes: usize,
    pub generation: u64,
}

/// Rebuilds the mailbox snapshot from a [`MailSource`] and publishes it.
pub struct Refresher {
    source: Box<dyn MailSource>,
    holder: Arc<SnapshotHolder>,
}

impl Refresher {
    pub fn new(source: Box<dyn MailSource>, holder: Arc<SnapshotHolder>) -> Self {
        Self { source, holder }
    }

    /// Build a fresh snapshot from the current mailbox contents and publish it.
    ///
    /// On a fetch failure the published snapshot stays as it was. Readers
    /// never observe a partially built snapshot.
    pub fn refresh(&self) -> Result<RefreshStats> {
        let start = Instant::now();
        info!("Refreshing mailbox");

        let raw = self.source.fetch()?;
        let fetched = raw.len();

        let (metas, parse_skipped) = parse_batch(&raw);
        debug!(parsed = metas.len(), skipped = parse_skipped, "Parsed metadata");

        let index = MailboxIndex::build(metas, self.holder.next_generation());
        let stats = RefreshStats {
            fetched,
            indexed: index.message_count(),
            skipped: fetched - index.message_count(),
            inodes: index.tree.len(),
            generation: index.generation,
        };
        self.holder.publish(index);

        info!(
            fetched = stats.fetched,
            indexed = stats.indexed,
            skipped = stats.skipped,
            inodes = stats.inodes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Refresh complete"
        );
        Ok(stats)
    }

    /// Refresh every `interval` until `shutdown` fires or its sender is
    /// dropped. Failed refreshes are logged and retried on the next tick.
    pub fn run_periodic(&self, interval: Duration, shutdown: Receiver<()>) {
        info!(interval_secs = interval.as_secs(), "Starting refresh loop");
        loop {
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = self.refresh() {
                        error!(error = %e, "Refresh failed, keeping previous snapshot");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("Refresh loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;

    use crate::error::MailFsError;
    use crate::fetch::StaticSource;
    use crate::parser::mime::parse_raw_message;

    fn raw(uid: u32, from: &str, subject: Option<&str>) -> crate::model::mail::RawMessage {
        let mut text = format!("From: {from}\r\nDate: Wed, 10 May 2023 09:00:00 +0000\r\n");
        if let Some(subject) = subject {
            text.push_str(&format!("Subject: {subject}\r\n"));
        }
        text.push_str("\r\nbody\r\n");
        parse_raw_message(uid, text.as_bytes())
    }

    /// Succeeds until `fail` is set, counting calls.
    struct Flaky {
        inner: StaticSource,
        fail: Arc<AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    impl MailSource for Flaky {
        fn fetch(&self) -> Result<Vec<crate::model::mail::RawMessage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailFsError::fetch("connection refused"));
            }
            self.inner.fetch()
        }
    }

    #[test]
    fn test_refresh_publishes() {
        let holder = Arc::new(SnapshotHolder::new());
        let source = StaticSource::new(vec![
            raw(1, "alice@example.com", Some("Hello")),
            raw(2, "bob@example.com", None),
            raw(3, "bob@example.com", Some("Report")),
        ]);
        let refresher = Refresher::new(Box::new(source), Arc::clone(&holder));

        let stats = refresher.refresh().unwrap();
        assert_eq!(stats.fetched, 3);
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.generation, 1);

        let snap = holder.load();
        assert_eq!(snap.tree.len(), stats.inodes);
        assert!(snap
            .tree
            .resolve_path("timeline/2023/5/10/alice@example.com-hello")
            .is_some());
    }

    #[test]
    fn test_failed_fetch_keeps_snapshot() {
        let holder = Arc::new(SnapshotHolder::new());
        let fail = Arc::new(AtomicBool::new(false));
        let source = Flaky {
            inner: StaticSource::new(vec![raw(1, "a@x", Some("one"))]),
            fail: Arc::clone(&fail),
            calls: Arc::default(),
        };
        let refresher = Refresher::new(Box::new(source), Arc::clone(&holder));
        refresher.refresh().unwrap();
        let before = holder.load();

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            refresher.refresh(),
            Err(MailFsError::FetchFailed { .. })
        ));
        assert!(Arc::ptr_eq(&before, &holder.load()));
    }

    #[test]
    fn test_empty_mailbox() {
        let holder = Arc::new(SnapshotHolder::new());
        let refresher = Refresher::new(Box::new(StaticSource::default()), Arc::clone(&holder));
        let stats = refresher.refresh().unwrap();
        assert_eq!(stats.indexed, 0);
        assert_eq!(stats.inodes, 3);
    }

    #[test]
    fn test_periodic_stops_on_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Flaky {
            inner: StaticSource::default(),
            fail: Arc::new(AtomicBool::new(true)),
            calls: Arc::clone(&calls),
        };
        let refresher = Refresher::new(Box::new(source), Arc::new(SnapshotHolder::new()));
        let (tx, rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            refresher.run_periodic(Duration::from_millis(10), rx);
        });
        std::thread::sleep(Duration::from_millis(100));
        tx.send(()).unwrap();
        handle.join().unwrap();

        // Failures are retried, not fatal.
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_periodic_stops_when_sender_dropped() {
        let refresher = Refresher::new(
            Box::new(StaticSource::default()),
            Arc::new(SnapshotHolder::new()),
        );
        let (tx, rx) = mpsc::channel::<()>();
        drop(tx);
        refresher.run_periodic(Duration::from_secs(3600), rx);
    }
}
