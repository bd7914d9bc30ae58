//! Process-wide shutdown state for the dev session.
//!
//! The Ctrl+C handler is installed once at startup. Before a dev server is
//! registered it just exits; afterwards it unblocks the HTTP server and wakes
//! whoever waits on the shutdown channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam::channel::Sender;
use tiny_http::Server;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Shutdown signal sender for the dev session
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        let mut graceful = false;
        if let Some(tx) = SHUTDOWN_TX.get() {
            graceful = tx.send(()).is_ok();
        }
        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
            graceful = true;
        }

        if !graceful {
            std::process::exit(130);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server so Ctrl+C can unblock its request loop.
pub fn register_server(server: Arc<Server>) {
    let _ = SERVER.set(server);
}

/// Register the channel the dev session waits on.
pub fn register_shutdown(tx: Sender<()>) {
    let _ = SHUTDOWN_TX.set(tx);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
