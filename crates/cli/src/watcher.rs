use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::serve::Intent;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Watches one trace file and queues a reload once edits have settled.
///
/// The parent directory is watched so that editors replacing the file are noticed.
pub struct TraceWatcher {
    _watcher: RecommendedWatcher,
}

impl TraceWatcher {
    pub fn spawn(path: &Path, debounce: Duration, intents: mpsc::Sender<Intent>) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .with_context(|| format!("{} does not name a file", path.display()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = mpsc::channel(256);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .context("watcher init failed")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        log::info!(
            "Watching {} (debounce {}ms)",
            path.display(),
            debounce.as_millis()
        );

        spawn_debounce_loop(file_name, debounce, event_rx, intents);
        Ok(Self { _watcher: watcher })
    }
}

fn spawn_debounce_loop(
    file_name: OsString,
    debounce: Duration,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    intents: mpsc::Sender<Intent>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(debounce);
        loop {
            let deadline = state.next_deadline();
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        Ok(event) if touches(&event, &file_name) => state.record_event(),
                        Ok(_) => {}
                        Err(err) => log::warn!("watch error: {err}"),
                    }
                }
                () = async {
                    if let Some(deadline) = deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if deadline.is_some() => {
                    let pending = state.take();
                    log::debug!("Trace changed ({pending} events), queueing reload");
                    if intents.send(Intent::FileChanged).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

struct DebounceState {
    debounce: Duration,
    pending: usize,
    last_event: Option<Instant>,
}

impl DebounceState {
    fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: 0,
            last_event: None,
        }
    }

    fn record_event(&mut self) {
        self.pending += 1;
        self.last_event = Some(Instant::now());
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.last_event.map(|last| last + self.debounce)
    }

    fn take(&mut self) -> usize {
        self.last_event = None;
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[tokio::test]
    async fn debounce_deadline_follows_the_last_event() {
        let mut state = DebounceState::new(Duration::from_millis(300));
        assert!(state.next_deadline().is_none());

        state.record_event();
        let first = state.next_deadline().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        state.record_event();
        assert!(state.next_deadline().unwrap() > first);

        assert_eq!(state.take(), 2);
        assert!(state.next_deadline().is_none());
    }

    #[test]
    fn only_events_for_the_trace_count() {
        let name = OsString::from("trace.json");
        let hit = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path("/w/trace.json".into());
        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path("/w/other.json".into());
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path("/w/trace.json".into());

        assert!(touches(&hit, &name));
        assert!(!touches(&other, &name));
        assert!(!touches(&access, &name));
    }
}
