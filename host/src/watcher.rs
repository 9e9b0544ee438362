//! Hot-reload file watcher for the policy module
//!
//! Watches the policies directory and triggers an atomic module swap when the
//! configured `.wasm` file is modified.

use crate::AppState;
use notify_debouncer_mini::{new_debouncer, notify::*, DebounceEventResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Whether a changed path is the policy module being served
fn is_policy_module(path: &Path, policy_file: &str) -> bool {
    path.extension().map_or(false, |e| e == "wasm")
        && path.file_name().map_or(false, |name| name == policy_file)
}

/// Watch the policies directory and hot-reload on changes
pub async fn watch_policies(state: Arc<AppState>) {
    let (tx, mut rx) = mpsc::channel::<()>(10);
    let policies_path = state.config().policies_dir.clone();
    let policy_file = state.config().policy_file.clone();

    // Spawn blocking watcher thread
    std::thread::spawn(move || {
        let debouncer_tx = tx.clone();
        let mut debouncer = match new_debouncer(
            Duration::from_millis(500),
            move |res: DebounceEventResult| {
                if let Ok(events) = res {
                    if events.iter().any(|event| is_policy_module(&event.path, &policy_file)) {
                        let _ = debouncer_tx.blocking_send(());
                    }
                }
            },
        ) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "failed to create file watcher");
                return;
            }
        };

        if let Err(e) = debouncer
            .watcher()
            .watch(&policies_path, RecursiveMode::NonRecursive)
        {
            tracing::error!(error = %e, dir = %policies_path.display(), "failed to watch policies directory");
            return;
        }

        tracing::info!(dir = %policies_path.display(), "watching for policy changes");

        // Keep thread alive
        loop {
            std::thread::park();
        }
    });

    // Process reload events
    while rx.recv().await.is_some() {
        tracing::info!("detected policy change, hot-reloading");

        match state.reload_from_disk().await {
            Ok((size, version)) => {
                tracing::info!(size_bytes = size, policy_version = %version, "policy hot-reload successful");
            }
            Err(e) => {
                tracing::error!(error = %e, "policy hot-reload failed, keeping previous module");
            }
        }
    }
}
