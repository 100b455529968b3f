//! Local static file server for pages under test.
//!
//! The server lives only as long as a capture run:
//! - Binds `127.0.0.1:<port>` and serves files from one directory
//! - Handles requests on a background thread
//! - Stops when closed or dropped

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, info, warn};

/// Errors raised while starting the static server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind 127.0.0.1:{port}: {message}")]
    Bind { port: u16, message: String },

    #[error("document root {} is not a directory", .0.display())]
    MissingRoot(PathBuf),
}

/// Handle to a running static server
pub struct StaticServer {
    server: Option<Arc<Server>>,
    worker: Option<JoinHandle<()>>,
    port: u16,
}

impl StaticServer {
    /// Start serving `dir` on `port` (0 picks a free port)
    pub fn start(dir: impl Into<PathBuf>, port: u16) -> Result<Self, ServerError> {
        let root = dir.into();
        if !root.is_dir() {
            return Err(ServerError::MissingRoot(root));
        }

        let server = Server::http(("127.0.0.1", port)).map_err(|e| ServerError::Bind {
            port,
            message: e.to_string(),
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        let server = Arc::new(server);

        let worker = {
            let server = Arc::clone(&server);
            let root = root.clone();
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    if let Err(e) = respond(&root, request) {
                        warn!("static server failed to respond: {}", e);
                    }
                }
            })
        };

        info!(port, root = %root.display(), "static server started");
        Ok(Self {
            server: Some(server),
            worker: Some(worker),
            port,
        })
    }

    /// Port the server is listening on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL of the server
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    /// Stop accepting requests, wait for the worker thread, release the socket
    pub fn close(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };
        server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        drop(server);
        info!(port = self.port, "static server stopped");
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.close();
    }
}

fn respond(root: &Path, request: Request) -> io::Result<()> {
    let url = request.url().to_string();
    let Some(path) = resolve_request(root, &url) else {
        debug!(%url, "404");
        return request.respond(Response::from_string("Not Found").with_status_code(404));
    };

    match File::open(&path) {
        Ok(file) => {
            let mut response = Response::from_file(file);
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type(&path).as_bytes()) {
                response = response.with_header(header);
            }
            debug!(%url, "200");
            request.respond(response)
        }
        Err(_) => {
            debug!(%url, "404");
            request.respond(Response::from_string("Not Found").with_status_code(404))
        }
    }
}

/// Map a request URL to a file under `root`, refusing to escape it
fn resolve_request(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let relative = Path::new(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let mut full = root.join(relative);
    if full.is_dir() {
        full = full.join("index.html");
    }
    full.is_file().then_some(full)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=UTF-8",
        Some("css") => "text/css; charset=UTF-8",
        Some("js") | Some("mjs") => "application/javascript; charset=UTF-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    fn get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        write!(
            stream,
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        )
        .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        body
    }

    #[test]
    fn test_serves_files_and_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();

        let mut server = StaticServer::start(dir.path(), 0).unwrap();
        assert!(server.url().starts_with("http://127.0.0.1:"));

        let home = get(server.port(), "/");
        assert!(home.starts_with("HTTP/1.1 200"));
        assert!(home.contains("<h1>home</h1>"));

        let css = get(server.port(), "/style.css?v=2");
        assert!(css.contains("text/css"));

        let missing = get(server.port(), "/nope.html");
        assert!(missing.starts_with("HTTP/1.1 404"));

        server.close();
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = StaticServer::start(dir.path(), 0).unwrap();
        assert!(server.is_running());
        assert!(TcpStream::connect(("127.0.0.1", server.port())).is_ok());

        server.close();
        server.close();
        assert!(!server.is_running());
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = StaticServer::start(dir.path().join("absent"), 0);
        assert!(matches!(result, Err(ServerError::MissingRoot(_))));
    }

    #[test]
    fn test_resolve_refuses_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_request(dir.path(), "/../etc/passwd"), None);
    }
}
