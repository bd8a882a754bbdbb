//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and hands each one to its own task. A connection
//! gets exactly one read of a fixed-size buffer, at most one response, and is
//! then closed: there is no keep-alive and no pipelining.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::http::{Request, RequestError};
use crate::router::Router;

/// Errors produced by the server. All of them end [`Server::run`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
}

/// Bytes read from each connection unless configured otherwise.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// The chc HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use chc::{Method, Request, Response, Route, Router, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.add_route(
///         Route::new("/")
///             .method(Method::Get)
///             .handler(|_req: Request| async { Response::new().body("Hello!") }),
///     );
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(router).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    read_buffer_size: usize,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        })
    }

    /// Binds to `config.host:config.port` with the configured read size.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        Ok(Self::bind(config.addr())
            .await?
            .read_buffer_size(config.read_buffer_size))
    }

    /// Sets how many bytes each connection's single read may return.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching requests through `router`.
    ///
    /// The router is frozen from here on. Each accepted connection is handled
    /// on its own Tokio task; a failure on one connection never affects another.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] if the listener fails to accept, since
    /// the loop cannot make progress after that.
    pub async fn run(self, router: Router) -> Result<(), ServerError> {
        let router = Arc::new(router);
        info!(address = %self.local_addr, "ready - listening");

        loop {
            let (stream, peer_addr) = self.listener.accept().await.map_err(ServerError::Accept)?;

            debug!(peer = %peer_addr, "connection accepted");
            let router = Arc::clone(&router);
            let read_buffer_size = self.read_buffer_size;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, router, read_buffer_size).await
                {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Binds according to `config`, applies its logging toggle to `router`, and serves.
pub async fn listen(config: &ServerConfig, mut router: Router) -> Result<(), ServerError> {
    router.request_logging(config.request_logging);
    Server::from_config(config).await?.run(router).await
}

/// Handles a single TCP connection: one read, one response, close.
///
/// The stream is dropped, and so closed, on every return path.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    router: Arc<Router>,
    read_buffer_size: usize,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::zeroed(read_buffer_size);
    let bytes_read = stream.read(&mut buf).await?;

    if bytes_read == 0 {
        debug!(peer = %peer_addr, "connection closed by peer");
        return Ok(());
    }

    let request = match Request::parse(&buf[..bytes_read], Some(peer_addr)) {
        Ok(request) => request,
        Err(RequestError::Malformed) => {
            // No 400 is sent; the client just sees the connection close.
            warn!(peer = %peer_addr, "malformed request, dropping connection");
            return Ok(());
        }
    };

    debug!(
        peer = %peer_addr,
        method = request.method().map(|m| m.as_str()).unwrap_or(""),
        url = request.url(),
        "dispatching request"
    );

    let status = router.serve(request, &mut stream).await?;
    debug!(peer = %peer_addr, status = status.as_u16(), "response written");
    Ok(())
}
