// Local diagnostics web pages, served from the control loop one request at a time.
pub mod render;

use crate::modem::engine::Response;
use crate::tracker::location::TrackerState;
use anyhow::{Context, Result};
use httparse::{EMPTY_HEADER, Request, Status};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_BUFFER_BYTES: usize = 2_048;
const IO_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Restart,
}

// What the pages may look at. Borrowed for the duration of one request.
pub struct View<'a> {
    pub state: &'a TrackerState,
    pub last_response: Option<&'a Response>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Status,
    Logs,
    Restart,
    NotFound,
}

fn route(path: &str) -> Route {
    let path = path.split('?').next().unwrap_or_default();
    match path {
        "/" => Route::Status,
        "/logs" => Route::Logs,
        "/restart" => Route::Restart,
        _ => Route::NotFound,
    }
}

pub struct DiagnosticsServer {
    listener: TcpListener,
}

impl DiagnosticsServer {
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .with_context(|| format!("binding diagnostics server failed: {addr}"))?;
        listener
            .set_nonblocking(true)
            .context("switching diagnostics listener to non-blocking failed")?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    // Serve at most one pending connection. Never waits for a client.
    pub fn poll(&mut self, view: &View<'_>) -> Action {
        match self.listener.accept() {
            Ok((mut stream, peer)) => {
                debug!(%peer, "Diagnostics request");
                let configured = stream
                    .set_nonblocking(false)
                    .and_then(|_| stream.set_read_timeout(Some(IO_TIMEOUT)))
                    .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)));
                if let Err(err) = configured {
                    warn!(%peer, "Configuring diagnostics connection failed: {err}");
                    return Action::Continue;
                }
                handle(&mut stream, view)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Action::Continue,
            Err(err) => {
                warn!("Accepting diagnostics connection failed: {err}");
                Action::Continue
            }
        }
    }
}

// Answer one request on `stream`. `/restart` always yields `Action::Restart`,
// even when the confirmation page could not be delivered.
pub fn handle<S: Read + Write>(stream: &mut S, view: &View<'_>) -> Action {
    let path = match read_request_path(stream) {
        Ok(Some(path)) => path,
        Ok(None) => {
            if let Err(err) = respond(stream, "400 Bad Request", "text/plain", "Bad request") {
                warn!("Sending bad request response failed: {err}");
            }
            return Action::Continue;
        }
        Err(err) => {
            warn!("Reading diagnostics request failed: {err}");
            return Action::Continue;
        }
    };

    let route = route(&path);
    let sent = match route {
        Route::Status => {
            info!("Sending GPS data");
            respond(stream, "200 OK", "text/html", &render::page(&render::status_body(view.state)))
        }
        Route::Logs => respond(
            stream,
            "200 OK",
            "text/html",
            &render::page(&render::logs_body(view.last_response)),
        ),
        Route::Restart => {
            info!("Restarting system");
            respond(stream, "200 OK", "text/html", &render::page("Restarting ..."))
        }
        Route::NotFound => respond(stream, "404 Not Found", "text/plain", "Not found"),
    };

    if let Err(err) = sent {
        warn!(path = %path, "Sending diagnostics response failed: {err}");
    }

    match route {
        Route::Restart => Action::Restart,
        _ => Action::Continue,
    }
}

// Read until the request head parses. `Ok(None)` for malformed or oversized heads.
fn read_request_path<S: Read>(stream: &mut S) -> io::Result<Option<String>> {
    let mut buf = [0_u8; REQUEST_BUFFER_BYTES];
    let mut filled = 0;

    loop {
        let read = stream.read(&mut buf[filled..])?;
        if read == 0 {
            return Ok(None);
        }
        filled += read;

        let mut headers = [EMPTY_HEADER; 32];
        let mut request = Request::new(&mut headers);
        match request.parse(&buf[..filled]) {
            Ok(Status::Complete(_)) => return Ok(request.path.map(str::to_string)),
            Ok(Status::Partial) if filled < buf.len() => continue,
            Ok(Status::Partial) | Err(_) => return Ok(None),
        }
    }
}

fn respond<W: Write>(stream: &mut W, status: &str, content_type: &str, body: &str) -> io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    stream.write_all(body.as_bytes())?;
    stream.flush()
}
