//! Watch registrar: file changes -> binding workers -> tasks -> reload.
//!
//! ```text
//! notify ─► WatchSession::dispatch ─► worker per binding ─► run_step ─► ReloadHub
//!                                      (debounce, no overlap)
//! ```
//!
//! Each binding owns one worker. A worker waits for a quiet period, runs its
//! tasks to completion, then reloads (or shows the error overlay). Changes
//! that arrive while it runs are folded into a single follow-up run.

mod binding;

pub use binding::{WatchBinding, default_bindings};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::compose::{RunSummary, run_step};
use crate::config::WatchConfig;
use crate::logger::{status_error, status_success};
use crate::registry::PathRegistry;
use crate::reload::ReloadHub;
use crate::task::TaskContext;
use crate::utils::path::normalize_path;
use crate::utils::plural_count;
use crate::{debug, log};

/// Outcome of one binding run, for observers.
#[cfg(test)]
#[derive(Debug)]
pub struct BindingRun {
    pub binding: &'static str,
    pub result: Result<RunSummary, String>,
}

/// Editor artifacts never trigger a run.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

// ============================================================================
// Registrar
// ============================================================================

/// The set of bindings for a session, before any worker exists.
pub struct WatchRegistrar {
    bindings: Vec<WatchBinding>,
    debounce: Duration,
    #[cfg(test)]
    runs: Option<mpsc::UnboundedSender<BindingRun>>,
}

impl WatchRegistrar {
    pub fn new(bindings: Vec<WatchBinding>, debounce: Duration) -> Self {
        Self {
            bindings,
            debounce,
            #[cfg(test)]
            runs: None,
        }
    }

    /// Default dev bindings over `registry`.
    pub fn from_registry(registry: &PathRegistry, config: &WatchConfig) -> Self {
        Self::new(
            default_bindings(registry),
            Duration::from_millis(config.debounce_ms),
        )
    }

    /// Send every finished run to `tx`.
    #[cfg(test)]
    pub fn report_runs(mut self, tx: mpsc::UnboundedSender<BindingRun>) -> Self {
        self.runs = Some(tx);
        self
    }

    /// Spawn one worker per binding on the current tokio runtime.
    pub fn start(self, ctx: TaskContext, hub: ReloadHub) -> WatchSession {
        let mut senders = Vec::with_capacity(self.bindings.len());
        let mut workers = Vec::with_capacity(self.bindings.len());
        let mut bindings = Vec::with_capacity(self.bindings.len());

        for binding in self.bindings {
            let binding = Arc::new(binding);
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = Worker {
                binding: Arc::clone(&binding),
                ctx: ctx.clone(),
                hub: hub.clone(),
                debounce: self.debounce,
                #[cfg(test)]
                runs: self.runs.clone(),
            };
            workers.push(tokio::spawn(worker.run(rx)));
            senders.push(tx);
            bindings.push(binding);
        }

        WatchSession {
            dispatcher: Arc::new(Dispatcher { bindings, senders }),
            workers,
            watcher: None,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Routes changed paths to binding workers.
struct Dispatcher {
    bindings: Vec<Arc<WatchBinding>>,
    senders: Vec<mpsc::UnboundedSender<PathBuf>>,
}

impl Dispatcher {
    fn dispatch(&self, path: &Path) -> usize {
        if is_temp_file(path) {
            return 0;
        }
        let normalized = normalize_path(path);

        let mut hits = 0;
        for (binding, tx) in self.bindings.iter().zip(&self.senders) {
            if (binding.matches(path) || binding.matches(&normalized))
                && tx.send(path.to_path_buf()).is_ok()
            {
                debug!("watch"; "{} -> {}", path.display(), binding.name);
                hits += 1;
            }
        }
        hits
    }
}

/// Running workers plus the optional file watcher feeding them.
pub struct WatchSession {
    dispatcher: Arc<Dispatcher>,
    workers: Vec<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl WatchSession {
    /// Queue a change for every binding whose globs match `path`.
    ///
    /// Returns the number of bindings notified.
    #[cfg(test)]
    pub fn dispatch(&self, path: &Path) -> usize {
        self.dispatcher.dispatch(path)
    }

    /// Watch `root` recursively and dispatch every change under it.
    pub fn watch(&mut self, root: &Path) -> Result<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let relevant = match event.kind {
                        EventKind::Create(_) | EventKind::Remove(_) => true,
                        EventKind::Modify(kind) => {
                            !matches!(kind, notify::event::ModifyKind::Metadata(_))
                        }
                        _ => false,
                    };
                    if relevant {
                        for path in &event.paths {
                            dispatcher.dispatch(path);
                        }
                    }
                }
                Err(e) => log!("watch"; "notify error: {}", e),
            }
        })
        .context("Failed to create file watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        log!("watch"; "watching {}", root.display());
        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn binding_count(&self) -> usize {
        self.dispatcher.bindings.len()
    }

    /// Stop watching, let running tasks finish, and wait for every worker.
    pub async fn stop(self) {
        drop(self.watcher);
        drop(self.dispatcher);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    binding: Arc<WatchBinding>,
    ctx: TaskContext,
    hub: ReloadHub,
    debounce: Duration,
    #[cfg(test)]
    runs: Option<mpsc::UnboundedSender<BindingRun>>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<PathBuf>) {
        while let Some(first) = rx.recv().await {
            let mut changed = vec![first];

            // Wait until no change arrived for `debounce`.
            loop {
                tokio::select! {
                    biased;
                    next = rx.recv() => match next {
                        Some(path) => changed.push(path),
                        None => return,
                    },
                    _ = tokio::time::sleep(self.debounce) => break,
                }
            }

            changed.sort();
            changed.dedup();
            debug!("watch"; "{}: {}", self.binding.name, plural_count(changed.len(), "change"));
            self.run_once().await;
        }
    }

    async fn run_once(&self) {
        let binding = &self.binding;
        let started = Instant::now();
        let result = run_step(&binding.step(), &self.ctx)
            .await
            .map(|reports| RunSummary {
                reports,
                duration: started.elapsed(),
            });

        match &result {
            Ok(summary) => match summary.diagnostics().next() {
                Some(diag) => {
                    let root = &self.ctx.config.root;
                    self.hub.error(&diag.location(root), &diag.overlay_text());
                    status_error(
                        &format!("{} failed", binding.name),
                        &format!("{}: {}", diag.location(root), diag.message),
                    );
                }
                None => {
                    if binding.reload {
                        self.hub.reload(binding.name);
                        debug!("reload"; "{} -> {}", binding.name, plural_count(self.hub.client_count(), "client"));
                    } else {
                        self.hub.clear_error();
                    }
                    status_success(&format!(
                        "{} rebuilt: {} in {:.0?}",
                        binding.name,
                        plural_count(summary.artifacts().count(), "file"),
                        summary.duration
                    ));
                }
            },
            Err(err) => {
                let detail = format!("{err:#}");
                self.hub.error(binding.name, &detail);
                status_error(&format!("{} failed", binding.name), &detail);
            }
        }

        self.report_run(result);
    }

    #[cfg(test)]
    fn report_run(&self, result: Result<RunSummary>) {
        if let Some(tx) = &self.runs {
            let _ = tx.send(BindingRun {
                binding: self.binding.name,
                result: result.map_err(|err| format!("{err:#}")),
            });
        }
    }

    #[cfg(not(test))]
    fn report_run(&self, _result: Result<RunSummary>) {}
}
