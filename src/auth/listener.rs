//! Loopback listener for the OAuth redirect
//!
//! Accepts connections on `127.0.0.1:<port>`, each on its own task, hands any
//! `code` query parameter to a callback and answers every request with a
//! static page.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, Result};

/// Page served when no custom redirect page is configured
pub const DEFAULT_REDIRECT_PAGE: &str = "<html><head><meta charset='UTF-8'><title>Avalab</title></head>\
<body><p>Authorization complete. You can close this window and return to the terminal.</p></body></html>";

/// Longest request head we read before answering
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Time a client gets to send its request head
const READ_TIMEOUT: Duration = Duration::from_secs(5);

type CodeCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Single-endpoint redirect listener
pub struct RedirectListener {
    port: u16,
    page: Arc<str>,
    running: Option<Running>,
}

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for RedirectListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectListener")
            .field("port", &self.port)
            .field("addr", &self.local_addr())
            .finish()
    }
}

impl RedirectListener {
    /// Create a listener for `port`. Port 0 binds an ephemeral port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            page: Arc::from(DEFAULT_REDIRECT_PAGE),
            running: None,
        }
    }

    /// Serve `html` instead of the built-in page
    pub fn with_page(mut self, html: impl Into<String>) -> Self {
        self.page = Arc::from(html.into());
        self
    }

    /// Address the listener is bound to, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bind and start accepting redirects.
    ///
    /// `on_code` runs on the listener task; forward the code over a channel to
    /// handle it on the caller's task. Starting a running listener is a no-op.
    pub async fn start<F>(&mut self, on_code: F) -> Result<SocketAddr>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        if let Some(running) = &self.running {
            return Ok(running.addr);
        }

        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AddrInUse => AuthError::PortInUse { port: self.port },
                _ => AuthError::Listener(format!("cannot bind port {}: {}", self.port, e)),
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| AuthError::Listener(e.to_string()))?;

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.page),
            Arc::new(on_code),
            shutdown.clone(),
        ));

        log::info!("Listening for the OAuth redirect on http://{}", addr);
        self.running = Some(Running {
            addr,
            shutdown,
            handle,
        });
        Ok(addr)
    }

    /// Stop accepting and release the port. Idempotent; once this returns the
    /// callback is never invoked again.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
            if let Err(e) = running.handle.await {
                if !e.is_cancelled() {
                    log::warn!("Redirect listener task ended abnormally: {}", e);
                }
            }
            log::debug!("Redirect listener on {} stopped", running.addr);
        }
    }
}

impl Drop for RedirectListener {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
            running.handle.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    page: Arc<str>,
    on_code: CodeCallback,
    shutdown: CancellationToken,
) {
    // Browsers preconnect idle sockets, so one slow client must not hold up
    // the redirect itself.
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    log::debug!("Redirect connection from {}", peer);
                    let page = Arc::clone(&page);
                    let on_code = Arc::clone(&on_code);
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        if let Err(e) = serve(stream, &page, &on_code, &shutdown).await {
                            log::warn!("Redirect request failed: {}", e);
                        }
                    });
                }
                Err(e) => log::warn!("Failed to accept redirect connection: {}", e),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    // In-flight requests are abandoned; their callbacks never run
    connections.shutdown().await;
}

async fn serve(
    stream: TcpStream,
    page: &str,
    on_code: &CodeCallback,
    shutdown: &CancellationToken,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    let head = tokio::time::timeout(READ_TIMEOUT, read_head(&mut reader))
        .await
        .map_err(|_| std::io::Error::new(ErrorKind::TimedOut, "request head timed out"))??;

    if let Some(code) = head.lines().next().and_then(code_from_request_line) {
        if !shutdown.is_cancelled() {
            log::debug!("Received authorization code");
            on_code(code);
        }
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.len(),
        page
    );
    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Read lines until the blank line ending the request head.
/// Never buffers more than `MAX_HEAD_BYTES + 1` bytes.
async fn read_head<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = String::new();
    loop {
        let budget = (MAX_HEAD_BYTES + 1 - head.len()) as u64;
        let read = (&mut *reader).take(budget).read_line(&mut head).await?;
        if read == 0 || head.ends_with("\r\n\r\n") || head.ends_with("\n\n") {
            return Ok(head);
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }
}

/// Extract the `code` query parameter from `GET /path?query HTTP/1.1`
fn code_from_request_line(line: &str) -> Option<String> {
    let target = line.split_whitespace().nth(1)?;
    let url = url::Url::parse("http://localhost")
        .ok()?
        .join(target)
        .ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
}

/// Browser URL that starts the authorization flow
pub fn authorize_url(app_host: &str, client_id: &str, redirect_uri: &str) -> Result<String> {
    let mut url = url::Url::parse(app_host)
        .and_then(|base| base.join("authorize"))
        .map_err(|e| AuthError::Listener(format!("invalid app host '{}': {}", app_host, e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri);
    Ok(url.to_string())
}
