//! Live reload broadcast.
//!
//! ```text
//! watch worker ──reload()/error()──► ReloadHub ──► WebSocket clients
//!                                        └───────► in-process subscribers
//! ```
//!
//! The hub is created by whoever owns the dev session and handed to the
//! server and the watch workers; it is never global.

mod message;
mod socket;

pub use message::ReloadMessage;
pub use socket::ReloadListener;

use std::net::TcpStream;
use std::sync::Arc;

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use crate::{debug, log};

#[derive(Default)]
struct Shared {
    clients: Mutex<Vec<WebSocket<TcpStream>>>,
    subscribers: Mutex<Vec<Sender<ReloadMessage>>>,
    /// Last error, replayed to clients that connect while it is showing
    pending_error: Mutex<Option<(String, String)>>,
}

/// Fan-out point for reload messages. Cheap to clone.
#[derive(Clone, Default)]
pub struct ReloadHub {
    shared: Arc<Shared>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every message the hub sends, in order.
    #[cfg(test)]
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<ReloadMessage> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    pub fn client_count(&self) -> usize {
        self.shared.clients.lock().len()
    }

    /// Ask every page to reload. Does nothing when nobody listens.
    pub fn reload(&self, reason: &str) {
        *self.shared.pending_error.lock() = None;
        self.send(&ReloadMessage::reload(reason));
    }

    /// Show a compile error overlay instead of reloading.
    pub fn error(&self, path: &str, error: &str) {
        *self.shared.pending_error.lock() = Some((path.to_string(), error.to_string()));
        self.send(&ReloadMessage::error(path, error));
    }

    /// Remove a showing overlay without reloading.
    pub fn clear_error(&self) {
        if self.shared.pending_error.lock().take().is_some() {
            self.send(&ReloadMessage::ClearError);
        }
    }

    /// Complete the WebSocket handshake and register the client.
    pub(crate) fn add_client(&self, stream: TcpStream) {
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                log!("reload"; "handshake failed: {}", e);
                return;
            }
        };

        let mut greeting = vec![ReloadMessage::connected()];
        if let Some((path, error)) = self.shared.pending_error.lock().clone() {
            greeting.push(ReloadMessage::error(path, error));
        }
        for msg in greeting {
            if let Err(e) = ws.send(Message::Text(msg.to_json().into())) {
                debug!("reload"; "client dropped during greeting: {}", e);
                return;
            }
        }

        // Reads are polled by the listener thread.
        let _ = ws.get_ref().set_nonblocking(true);
        let mut clients = self.shared.clients.lock();
        clients.push(ws);
        debug!("reload"; "client connected (total: {})", clients.len());
    }

    /// Drain incoming frames and drop closed clients.
    pub(crate) fn poll_clients(&self) {
        self.shared.clients.lock().retain_mut(|ws| loop {
            match ws.read() {
                Ok(Message::Close(_)) => break false,
                Ok(_) => continue,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    break true;
                }
                Err(_) => break false,
            }
        });
    }

    /// Close every client connection.
    pub(crate) fn close_all(&self) {
        for mut ws in self.shared.clients.lock().drain(..) {
            let _ = ws.close(None);
        }
    }

    fn send(&self, msg: &ReloadMessage) {
        self.shared
            .subscribers
            .lock()
            .retain(|tx| tx.send(msg.clone()).is_ok());

        let mut clients = self.shared.clients.lock();
        if clients.is_empty() {
            debug!("reload"; "no clients connected");
            return;
        }

        let frame = Message::Text(msg.to_json().into());
        clients.retain_mut(|ws| match ws.send(frame.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("reload"; "client disconnected: {}", e);
                false
            }
        });
        debug!("reload"; "broadcast to {} clients", clients.len());
    }
}
