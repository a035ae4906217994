// src/watcher.rs

//! Recursive watch manager and event debouncer.
//!
//! The watch manager runs on its own thread because `notify` delivers
//! events from a synchronous callback; it owns the OS watcher, walks the
//! document root registering every non-ignored directory, and extends the
//! registration when new directories appear. Raw events cross into the
//! async world over a tokio channel, where the debouncer collapses each
//! burst into a single reload broadcast.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::event::{FsOp, RawEvent};
use crate::hub::ReloadHub;
use crate::ignore::IgnoreSet;

/// Quiet interval after the last qualifying event before a reload fires.
/// A burst of events shorter than this produces exactly one notification.
pub const QUIET_INTERVAL: Duration = Duration::from_millis(100);

/// Payload broadcast to every subscriber when documents change.
pub const RELOAD_PAYLOAD: &str = "reload";

/// Spawns the watch manager thread for the configured document root.
///
/// Raw events are forwarded into `raw_tx` for the debouncer. Returns
/// immediately after spawning; the thread runs for the process lifetime.
/// Watch-setup failures are fatal to the thread only — the serving process
/// continues without live reload.
pub async fn run_watcher(config: Arc<AppConfig>, raw_tx: Sender<RawEvent>) -> Result<()> {
    std::thread::spawn(move || {
        let root = config.markdown_dir.clone();
        let ignore = config.ignore.clone();

        // notify invokes the handler on its own thread; bridge into this
        // one over a std channel so the watcher can be mutated (new
        // directory registrations) while events are being consumed.
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| {
                let _ = notify_tx.send(result);
            },
            notify::Config::default(),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                error!("failed to create file watcher: {e}; live reload disabled");
                return;
            }
        };

        if let Err(e) = register_tree(&mut watcher, &root, &ignore) {
            error!(
                "failed to enumerate watch root {}: {e}; live reload disabled",
                root.display()
            );
            return;
        }
        info!("watching for document changes in {}", root.display());

        loop {
            match notify_rx.recv() {
                Ok(Ok(event)) => handle_fs_event(&mut watcher, event, &ignore, &raw_tx),
                Ok(Err(e)) => warn!("file watcher error: {e}"),
                Err(_) => {
                    info!("file watcher channel closed, watch thread exiting");
                    break;
                }
            }
        }
        // Dropping the watcher here releases every OS watch handle.
    });

    Ok(())
}

/// Depth-first walk registering `dir` and every non-ignored subdirectory
/// with the OS watcher. Ignored directories are not descended into, so
/// their contents are neither listed nor watched.
///
/// Failing to register or enumerate an individual subdirectory is logged
/// and skipped; only an error enumerating `dir` itself propagates.
fn register_tree(
    watcher: &mut RecommendedWatcher,
    dir: &Path,
    ignore: &IgnoreSet,
) -> std::io::Result<()> {
    // Most OS watch primitives are non-recursive; each directory is
    // registered individually.
    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        warn!("could not watch directory {}: {e}", dir.display());
    }
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if ignore.should_ignore(&entry.file_name().to_string_lossy()) {
            continue;
        }
        if let Err(e) = register_tree(watcher, &entry.path(), ignore) {
            warn!("skipping directory {}: {e}", entry.path().display());
        }
    }
    Ok(())
}

/// Handles one raw notify event: extends the watch to newly created
/// directories, and forwards everything else to the debouncer.
fn handle_fs_event(
    watcher: &mut RecommendedWatcher,
    event: notify::Event,
    ignore: &IgnoreSet,
    raw_tx: &Sender<RawEvent>,
) {
    let op = FsOp::classify(&event.kind);
    for path in event.paths {
        if op == FsOp::Create && path.is_dir() {
            // The parent's watch does not extend to a new subtree; walk it
            // immediately so nested directories created after startup are
            // still observed.
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !ignore.should_ignore(&name) {
                if let Err(e) = register_tree(watcher, &path, ignore) {
                    warn!(
                        "could not extend watch to new directory {}: {e}",
                        path.display()
                    );
                }
            }
            continue;
        }
        if raw_tx.blocking_send(RawEvent { path, op }).is_err() {
            debug!("raw event channel closed, dropping event");
            return;
        }
    }
}

/// Consumes raw events and emits at most one reload broadcast per quiet
/// period.
///
/// A single deadline is shared across all producers: every qualifying
/// event pushes it to now + [`QUIET_INTERVAL`], so a continuous burst
/// broadcasts nothing until it pauses. Non-qualifying events never touch
/// the deadline. Exits when the raw channel closes, flushing any pending
/// notification first.
pub async fn run_debouncer(mut raw_rx: Receiver<RawEvent>, hub: Arc<ReloadHub>) {
    let mut deadline: Option<Instant> = None;
    loop {
        let received = match deadline {
            Some(at) => {
                tokio::select! {
                    event = raw_rx.recv() => event,
                    _ = sleep_until(at) => {
                        debug!("document change detected, broadcasting {RELOAD_PAYLOAD}");
                        hub.broadcast(RELOAD_PAYLOAD);
                        deadline = None;
                        continue;
                    }
                }
            }
            None => raw_rx.recv().await,
        };

        match received {
            Some(event) if event.qualifies() => {
                // The countdown restarts from this event, not from the
                // first event in the burst.
                deadline = Some(Instant::now() + QUIET_INTERVAL);
            }
            Some(_) => {}
            None => {
                // Watcher gone. Flush a pending notification so the final
                // burst is not lost, then stop.
                if deadline.is_some() {
                    hub.broadcast(RELOAD_PAYLOAD);
                }
                info!("raw event channel closed, debouncer exiting");
                break;
            }
        }
    }
}
