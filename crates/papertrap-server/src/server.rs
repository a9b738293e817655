// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded IPP/HTTP listener.
//
// IPP is transported over HTTP POST (RFC 8010 §3), but this listener
// operates directly on raw TCP: clients send an HTTP POST with an
// `application/ipp` body, we parse just enough HTTP framing to find the
// method, path, and body, dispatch the IPP payload, and answer with a
// minimal HTTP/1.1 response.  Clients that skip HTTP and send raw IPP
// over the socket are served as well.
//
// A GET on `/` or `/ipp/print` answers a plain-text liveness string, so
// humans and monitoring can poke the port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use papertrap_core::error::{PapertrapError, Result};
use papertrap_core::types::ServerStatus;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::advertise::{AdvertisementHandle, MdnsAdvertiser, ServiceAdvertiser, ipp_txt_records};
use crate::dispatch::dispatch;
use crate::service::ServiceState;

/// Maximum bytes read from one connection.  Bounds memory against
/// misbehaving clients.
const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024; // 64 MiB

/// Body returned for liveness GETs.
const LIVENESS_BODY: &str = "papertrap virtual printer: alive\n";

/// Paths that accept IPP traffic.
const IPP_PATHS: [&str; 2] = ["/ipp/print", "/"];

/// The accept loop plus DNS-SD registration, owned by `PrinterService`.
pub struct IppServer {
    port: u16,
    advertise: bool,
    status: ServerStatus,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    advertiser: Option<MdnsAdvertiser>,
    advertisement: Option<AdvertisementHandle>,
}

impl IppServer {
    pub fn new(port: u16, advertise: bool) -> Self {
        Self {
            port,
            advertise,
            status: ServerStatus::Stopped,
            shutdown: Arc::new(Notify::new()),
            task: None,
            active_connections: Arc::new(AtomicU32::new(0)),
            advertiser: None,
            advertisement: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener, spawn the accept loop, and register DNS-SD.
    pub async fn start(&mut self, state: Arc<ServiceState>, printer_name: &str) -> Result<()> {
        if self.status == ServerStatus::Running {
            debug!(port = self.port, "IPP server already running");
            return Ok(());
        }
        self.status = ServerStatus::Starting;

        let bind_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| PapertrapError::Server(format!("bind {bind_addr}: {e}")))?;
        let bound_port = listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.port);

        info!(port = bound_port, "IPP capture server listening");

        if self.advertise {
            self.register_dns_sd(printer_name, bound_port);
        }

        let shutdown = Arc::clone(&self.shutdown);
        let connections = Arc::clone(&self.active_connections);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, connections, state).await;
        });

        self.task = Some(handle);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Signal the accept loop to exit and withdraw the advertisement.
    /// In-flight connections are allowed to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(port = self.port, "stopping IPP capture server");
        self.unregister_dns_sd();
        self.shutdown.notify_one();

        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| PapertrapError::Server(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        info!(port = self.port, "IPP capture server stopped");
        Ok(())
    }

    /// Register `_ipp._tcp.` over DNS-SD.  Failure downgrades to a
    /// warning — direct-IP printing keeps working without discovery.
    fn register_dns_sd(&mut self, printer_name: &str, port: u16) {
        let mut advertiser = MdnsAdvertiser::new();
        let txt = ipp_txt_records(port);
        match advertiser.register(printer_name, "_ipp._tcp.local.", port, &txt) {
            Ok(handle) => {
                self.advertisement = Some(handle);
                self.advertiser = Some(advertiser);
            }
            Err(e) => {
                warn!(error = %e, "DNS-SD registration failed");
            }
        }
    }

    fn unregister_dns_sd(&mut self) {
        if let (Some(mut advertiser), Some(handle)) =
            (self.advertiser.take(), self.advertisement.take())
        {
            if let Err(e) = advertiser.unregister(handle) {
                warn!(error = %e, "DNS-SD unregistration failed");
            }
        }
    }

    async fn accept_loop(
        listener: TcpListener,
        shutdown: Arc<Notify>,
        connections: Arc<AtomicU32>,
        state: Arc<ServiceState>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "incoming connection");
                            let state = Arc::clone(&state);
                            let connections = Arc::clone(&connections);
                            tokio::spawn(async move {
                                connections.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) =
                                    handle_connection(stream, peer_addr, state).await
                                {
                                    warn!(peer = %peer_addr, error = %e, "connection handler error");
                                }
                                connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connection handling
// ---------------------------------------------------------------------------

/// A minimally parsed HTTP request.
struct HttpEnvelope {
    method: String,
    path: String,
    body_offset: usize,
}

/// Parse the request line and find the header/body boundary.  Returns
/// `None` when the bytes do not look like HTTP, in which case the whole
/// buffer is treated as raw IPP.
fn parse_http_envelope(data: &[u8]) -> Option<HttpEnvelope> {
    let header_end = find_subsequence(data, b"\r\n\r\n")?;
    let head = std::str::from_utf8(&data[..header_end]).ok()?;
    let mut request_line = head.lines().next()?.split_whitespace();

    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    if !matches!(method.as_str(), "GET" | "POST" | "HEAD" | "PUT" | "OPTIONS") {
        return None;
    }

    Some(HttpEnvelope {
        method,
        path,
        body_offset: header_end + 4,
    })
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ServiceState>,
) -> Result<()> {
    let mut buf = Vec::with_capacity(8192);
    let mut limited = (&mut stream).take(MAX_REQUEST_BYTES as u64);
    let bytes_read = limited
        .read_to_end(&mut buf)
        .await
        .map_err(|e| PapertrapError::Server(format!("read from {peer_addr}: {e}")))?;

    if bytes_read == 0 {
        debug!(peer = %peer_addr, "empty request");
        return Ok(());
    }

    let envelope = parse_http_envelope(&buf);
    let (ipp_body, method, path) = match &envelope {
        Some(env) => (
            &buf[env.body_offset..],
            env.method.as_str(),
            env.path.as_str(),
        ),
        // Raw IPP over TCP, mostly from test tools.
        None => (&buf[..], "POST", "/"),
    };

    if method == "GET" {
        let (status, body) = if IPP_PATHS.contains(&path) {
            ("200 OK", LIVENESS_BODY)
        } else {
            ("404 Not Found", "not found\n")
        };
        return send_text_response(&mut stream, status, body).await;
    }

    if method != "POST" || !IPP_PATHS.contains(&path) {
        return send_text_response(&mut stream, "404 Not Found", "not found\n").await;
    }

    let request = match papertrap_ipp::decode(ipp_body) {
        Ok(request) => request,
        Err(e) => {
            // No IPP response can be produced for unparseable framing.
            warn!(peer = %peer_addr, error = %e, "malformed IPP request");
            state.registry.handle_error(&e, "decode").await;
            return send_text_response(
                &mut stream,
                "500 Internal Server Error",
                "malformed IPP request\n",
            )
            .await;
        }
    };

    debug!(
        peer = %peer_addr,
        operation = %format!("0x{:04X}", request.code),
        request_id = request.request_id,
        groups = request.groups.len(),
        payload_bytes = request.payload.len(),
        "parsed IPP request"
    );

    let response = dispatch(&state, &request, ipp_body).await;
    let response_bytes = papertrap_ipp::encode(&response);
    send_ipp_response(&mut stream, &response_bytes).await?;

    info!(
        peer = %peer_addr,
        operation = %format!("0x{:04X}", request.code),
        status = %format!("0x{:04X}", response.code),
        response_bytes = response_bytes.len(),
        "IPP response sent"
    );
    Ok(())
}

async fn send_ipp_response(stream: &mut tokio::net::TcpStream, body: &[u8]) -> Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/ipp\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );
    stream
        .write_all(head.as_bytes())
        .await
        .map_err(|e| PapertrapError::Server(format!("write headers: {e}")))?;
    stream
        .write_all(body)
        .await
        .map_err(|e| PapertrapError::Server(format!("write body: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| PapertrapError::Server(format!("flush: {e}")))?;
    Ok(())
}

async fn send_text_response(
    stream: &mut tokio::net::TcpStream,
    status: &str,
    body: &str,
) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| PapertrapError::Server(format!("write response: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| PapertrapError::Server(format!("flush: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_envelope_parses_method_and_path() {
        let raw = b"POST /ipp/print HTTP/1.1\r\n\
                    Host: 192.168.1.5:8631\r\n\
                    Content-Type: application/ipp\r\n\
                    \r\n\
                    <body>";
        let env = parse_http_envelope(raw).expect("envelope");
        assert_eq!(env.method, "POST");
        assert_eq!(env.path, "/ipp/print");
        assert_eq!(&raw[env.body_offset..], b"<body>");
    }

    #[test]
    fn raw_ipp_is_not_mistaken_for_http() {
        // IPP header bytes followed by a fake double-CRLF further in.
        let mut raw = vec![0x01, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01];
        raw.extend_from_slice(b"\r\n\r\n");
        assert!(parse_http_envelope(&raw).is_none());
    }

    #[test]
    fn get_paths_route_to_liveness() {
        assert!(IPP_PATHS.contains(&"/"));
        assert!(IPP_PATHS.contains(&"/ipp/print"));
        assert!(!IPP_PATHS.contains(&"/metrics"));
    }

    #[test]
    fn server_starts_stopped() {
        let server = IppServer::new(8631, false);
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert_eq!(server.port(), 8631);
        assert_eq!(server.active_connections(), 0);
    }
}
