use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::{Duration, Instant};

pub const DEBOUNCE_DURATION: Duration = Duration::from_millis(100);

/// Pending rebuild deadlines, one per changed path.
///
/// A change to an idle path arms its deadline; a change to a pending path
/// pushes the deadline back by the full interval.
pub struct Debouncer {
    interval: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: HashMap::new(),
        }
    }

    pub fn touch(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.interval);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Removes and returns every path whose deadline has passed.
    pub fn take_expired(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut expired: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &expired {
            self.pending.remove(path);
        }
        expired.sort();
        expired
    }
}

/// Keeps the notify subscription alive; dropping it closes the event
/// channel and ends the debounce loop.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

pub fn watch_source<F>(
    source_dir: &Path,
    exclude: Vec<PathBuf>,
    rebuild: F,
) -> notify::Result<SourceWatcher>
where
    F: FnMut(&[PathBuf]) + Send + 'static,
{
    let source_dir = std::path::absolute(source_dir).map_err(notify::Error::io)?;
    let (notify_tx, notify_rx) = channel();

    let mut watcher = RecommendedWatcher::new(notify_tx, Config::default())?;
    watcher.watch(&source_dir, RecursiveMode::Recursive)?;
    log::info!("Watching {} for changes", source_dir.display());

    std::thread::spawn(move || {
        run_debounce_loop(notify_rx, DEBOUNCE_DURATION, &exclude, rebuild);
    });

    Ok(SourceWatcher { _watcher: watcher })
}

/// Feeds notify events through a [`Debouncer`] and calls `rebuild` once
/// for every batch of paths whose deadlines expire together. Returns when
/// the event channel closes.
pub fn run_debounce_loop<F>(
    events: Receiver<notify::Result<Event>>,
    interval: Duration,
    exclude: &[PathBuf],
    mut rebuild: F,
) where
    F: FnMut(&[PathBuf]),
{
    let mut debouncer = Debouncer::new(interval);

    loop {
        let received = match debouncer.next_deadline() {
            Some(deadline) => {
                events.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(event)) => {
                if !matches!(event.kind, EventKind::Access(_)) {
                    let now = Instant::now();
                    for path in event.paths {
                        if exclude.iter().any(|excluded| path.starts_with(excluded)) {
                            continue;
                        }
                        log::debug!("Change detected: {}", path.display());
                        debouncer.touch(path, now);
                    }
                }
            }
            Ok(Err(error)) => log::error!("Watch error: {error}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        let ready = debouncer.take_expired(Instant::now());
        if !ready.is_empty() {
            rebuild(&ready);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, ModifyKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    const INTERVAL: Duration = Duration::from_millis(200);

    fn modified(path: &str) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from(path)))
    }

    fn run_with(
        exclude: Vec<PathBuf>,
        send: impl FnOnce(&std::sync::mpsc::Sender<notify::Result<Event>>),
    ) -> Vec<Vec<PathBuf>> {
        let (tx, rx) = channel();
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        let handle = thread::spawn(move || {
            run_debounce_loop(rx, INTERVAL, &exclude, move |paths| {
                recorded.lock().unwrap().push(paths.to_vec());
            });
        });

        send(&tx);
        thread::sleep(INTERVAL * 3);
        drop(tx);
        handle.join().unwrap();

        Arc::try_unwrap(calls).unwrap().into_inner().unwrap()
    }

    #[test]
    fn test_debouncer_resets_deadline() {
        let start = Instant::now();
        let path = PathBuf::from("src/index.md");
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.touch(path.clone(), start);
        debouncer.touch(path.clone(), start + Duration::from_millis(50));
        debouncer.touch(path.clone(), start + Duration::from_millis(90));

        assert!(debouncer.take_expired(start + Duration::from_millis(150)).is_empty());
        assert!(debouncer.next_deadline().is_some());
        assert_eq!(
            debouncer.take_expired(start + Duration::from_millis(190)),
            vec![path.clone()]
        );
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_debouncer_tracks_paths_independently() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.touch(PathBuf::from("a.md"), start);
        debouncer.touch(PathBuf::from("b.md"), start + Duration::from_millis(60));

        assert_eq!(
            debouncer.next_deadline(),
            Some(start + Duration::from_millis(100))
        );
        assert_eq!(
            debouncer.take_expired(start + Duration::from_millis(100)),
            vec![PathBuf::from("a.md")]
        );
        assert_eq!(
            debouncer.take_expired(start + Duration::from_millis(200)),
            vec![PathBuf::from("b.md")]
        );
    }

    #[test]
    fn test_burst_on_one_path_rebuilds_once() {
        let calls = run_with(Vec::new(), |tx| {
            for _ in 0..3 {
                tx.send(modified("/site/src/index.md")).unwrap();
                thread::sleep(Duration::from_millis(10));
            }
        });
        assert_eq!(calls, vec![vec![PathBuf::from("/site/src/index.md")]]);
    }

    #[test]
    fn test_paths_expiring_together_share_a_rebuild() {
        let calls = run_with(Vec::new(), |tx| {
            let event = Event::new(EventKind::Create(notify::event::CreateKind::File))
                .add_path(PathBuf::from("/site/src/a.md"))
                .add_path(PathBuf::from("/site/src/b.md"));
            tx.send(Ok(event)).unwrap();
        });
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
    }

    #[test]
    fn test_access_and_excluded_events_ignored() {
        let calls = run_with(vec![PathBuf::from("/site/dist")], |tx| {
            tx.send(Ok(Event::new(EventKind::Access(AccessKind::Read))
                .add_path(PathBuf::from("/site/src/index.md"))))
                .unwrap();
            tx.send(modified("/site/dist/index.html")).unwrap();
        });
        assert!(calls.is_empty());
    }

    #[test]
    fn test_watch_errors_do_not_stop_loop() {
        let rebuilds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&rebuilds);
        let (tx, rx) = channel();

        let handle = thread::spawn(move || {
            run_debounce_loop(rx, INTERVAL, &[], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        tx.send(Err(notify::Error::generic("watch backend failed")))
            .unwrap();
        tx.send(modified("/site/src/about.md")).unwrap();
        thread::sleep(INTERVAL * 3);
        drop(tx);
        handle.join().unwrap();

        assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
    }
}
