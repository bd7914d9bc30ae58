//! WebSocket listener feeding clients into a [`ReloadHub`].

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};

use super::ReloadHub;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Running acceptor thread.
pub struct ReloadListener {
    port: u16,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReloadListener {
    /// Bind `interface:base_port` (or the next free port) and start accepting.
    pub fn start(hub: ReloadHub, interface: IpAddr, base_port: u16) -> Result<Self> {
        let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        listener.set_nonblocking(true)?;
        if base_port != 0 && port != base_port {
            log!("reload"; "port {} in use, using {} instead", base_port, port);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("reload-listener".into())
            .spawn(move || accept_loop(&listener, &hub, &flag))?;

        Ok(Self {
            port,
            stop,
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReloadListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: &TcpListener, hub: &ReloadHub, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("reload"; "client connected: {}", addr);
                // Handshake runs blocking.
                let _ = stream.set_nonblocking(false);
                hub.add_client(stream);
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                hub.poll_clients();
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
    hub.close_all();
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind reload socket after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
