//! Development server: static files from the document root plus live reload.
//!
//! ```text
//! DevServer::start ─► tiny_http request loop (thread, 4 workers)
//!                 └─► ReloadListener (WebSocket, port retry)
//! ```
//!
//! HTML responses get the reload client injected before `</body>`. There is
//! no routing beyond files and directory indexes.

mod inject;
mod lifecycle;
mod path;
mod response;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tiny_http::{Request, Server};

use crate::config::PipelineConfig;
use crate::reload::{ReloadHub, ReloadListener};
use crate::{debug, log};

pub use inject::RELOAD_JS_PATH;

/// Where and how to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeSettings {
    pub root: PathBuf,
    pub interface: IpAddr,
    pub port: u16,
    pub reload_port: u16,
}

impl ServeSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            root: config.serve_root(),
            interface: config.serve.interface,
            port: config.serve.port,
            reload_port: config.serve.reload_port,
        }
    }
}

struct Running {
    server: Arc<Server>,
    addr: SocketAddr,
    listener: ReloadListener,
    handle: JoinHandle<()>,
}

enum State {
    Stopped,
    Running(Running),
}

/// Dev server controller.
pub struct DevServer {
    settings: ServeSettings,
    hub: ReloadHub,
    state: State,
}

impl DevServer {
    pub fn new(settings: ServeSettings, hub: ReloadHub) -> Self {
        Self {
            settings,
            hub,
            state: State::Stopped,
        }
    }

    /// Bind HTTP and reload sockets and start serving in the background.
    ///
    /// Starting a running server returns its address.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if self.is_running() {
            return self.addr().context("running server has no address");
        }

        let root = &self.settings.root;
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create document root {}", root.display()))?;

        let (server, addr) = lifecycle::bind_with_retry(self.settings.interface, self.settings.port)?;
        let server = Arc::new(server);
        let listener = ReloadListener::start(
            self.hub.clone(),
            self.settings.interface,
            self.settings.reload_port,
        )?;

        let handle = {
            let server = Arc::clone(&server);
            let root = root.clone();
            let reload_port = listener.port();
            thread::Builder::new()
                .name("http".into())
                .spawn(move || run_request_loop(&server, &root, reload_port))?
        };

        log!("serve"; "http://{}", addr);
        debug!("reload"; "ws://{}:{}", addr.ip(), listener.port());

        self.state = State::Running(Running {
            server,
            addr,
            listener,
            handle,
        });
        Ok(addr)
    }

    /// Stop serving. Stopping a stopped server does nothing.
    pub fn stop(&mut self) {
        if let State::Running(running) = std::mem::replace(&mut self.state, State::Stopped) {
            running.server.unblock();
            let _ = running.handle.join();
            running.listener.stop();
            debug!("serve"; "stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Running(running) => Some(running.addr),
            State::Stopped => None,
        }
    }

    #[cfg(test)]
    pub fn reload_port(&self) -> Option<u16> {
        match &self.state {
            State::Running(running) => Some(running.listener.port()),
            State::Stopped => None,
        }
    }

    /// Handle for the Ctrl+C handler to unblock the request loop.
    pub fn server_handle(&self) -> Option<Arc<Server>> {
        match &self.state {
            State::Running(running) => Some(Arc::clone(&running.server)),
            State::Stopped => None,
        }
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_request_loop(server: &Server, root: &Path, reload_port: u16) {
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(4).build() {
        Ok(pool) => pool,
        Err(e) => {
            log!("serve"; "failed to create thread pool: {}", e);
            return;
        }
    };

    let root: Arc<Path> = Arc::from(root);
    for request in server.incoming_requests() {
        let root = Arc::clone(&root);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &root, reload_port) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

fn handle_request(request: Request, root: &Path, reload_port: u16) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if !response::is_read_request(&request) {
        return response::respond_method_not_allowed(request);
    }

    let url = request.url().to_string();
    debug!("serve"; "{} {}", request.method(), url);

    if url.split('?').next() == Some(RELOAD_JS_PATH) {
        return response::respond_reload_js(request);
    }

    match path::resolve_path(&url, root) {
        Some(file) => response::respond_file(request, &file, Some(reload_port)),
        None => response::respond_not_found(request, root, Some(reload_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpStream};
    use tempfile::TempDir;

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    fn server(dir: &TempDir) -> DevServer {
        server_with_hub(dir, ReloadHub::new())
    }

    fn server_with_hub(dir: &TempDir, hub: ReloadHub) -> DevServer {
        let settings = ServeSettings {
            root: dir.path().to_path_buf(),
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            reload_port: 0,
        };
        DevServer::new(settings, hub)
    }

    #[test]
    fn test_serves_html_with_client() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<body>hi</body>").unwrap();
        let mut server = server(&dir);

        let addr = server.start().unwrap();
        assert_eq!(server.start().unwrap(), addr);
        let port = server.reload_port().unwrap();

        let page = get(addr, "/");
        assert!(page.starts_with("HTTP/1.1 200"));
        assert!(page.contains(&format!("data-port=\"{port}\"></script></body>")));

        let client = get(addr, RELOAD_JS_PATH);
        assert!(client.contains("WebSocket"));

        assert!(get(addr, "/nope.css").starts_with("HTTP/1.1 404"));
        assert!(get(addr, "/../etc/passwd").starts_with("HTTP/1.1 404"));

        server.stop();
        assert!(!server.is_running());
        server.stop();
    }

    #[test]
    fn test_reload_while_stopped_is_noop() {
        let dir = TempDir::new().unwrap();
        let hub = ReloadHub::new();
        let rx = hub.subscribe();
        let server = server_with_hub(&dir, hub.clone());
        hub.reload("manual");
        assert_eq!(rx.try_iter().count(), 1);
        assert!(server.addr().is_none());
    }
}
