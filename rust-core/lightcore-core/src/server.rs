//! # HTTP Server
//!
//! HTTP/1.1 server on Hyper and Tokio in front of a [`Kernel`].
//!
//! Each accepted connection runs on its own task. On Ctrl-C the accept loop
//! stops and in-flight connections get up to the configured shutdown
//! timeout to finish.

use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::request::Request;
use crate::response::{HyperTransport, Response};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// HTTP front end for a booted kernel
#[derive(Debug, Clone)]
pub struct Server {
    kernel: Arc<Kernel>,
}

impl Server {
    /// Wrap a kernel
    #[must_use]
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel: Arc::new(kernel),
        }
    }

    /// Serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the listener cannot be opened, or
    /// `Error::Io` if accepting fails.
    pub async fn serve(&self) -> Result<()> {
        self.serve_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, then drain open connections
    ///
    /// # Errors
    ///
    /// See [`Server::serve`].
    pub async fn serve_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let config = self.kernel.server_config();
        let addr = config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        info!("Server listening on http://{}{}", addr, config.base_path);

        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = config.max_body_size;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let kernel = Arc::clone(&self.kernel);
                    let active = Arc::clone(&active);

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                            let kernel = Arc::clone(&kernel);
                            async move {
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();
                                let version = req.version();

                                let response = handle_request(req, &kernel, Some(remote_addr), max_body_size).await;
                                info!(
                                    "{} - \"{} {} {:?}\" {}",
                                    remote_addr,
                                    method,
                                    path,
                                    version,
                                    response.status().as_u16()
                                );
                                Ok::<_, Infallible>(response)
                            }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(config.shutdown_timeout, drain).await.is_err() {
            warn!(
                open = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl-C handler: {}", err);
        std::future::pending::<()>().await;
    }
}

/// Turn one hyper request into a hyper response through the kernel
///
/// Oversized bodies are answered with 413 and unreadable ones with 400,
/// without reaching the router.
pub async fn handle_request<B>(
    req: hyper::Request<B>,
    kernel: &Kernel,
    remote_addr: Option<SocketAddr>,
    max_body_size: usize,
) -> hyper::Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut response = match Request::from_hyper(req, remote_addr, max_body_size).await {
        Ok(request) => kernel.respond(request).await,
        Err(err @ Error::RequestBodyTooLarge { .. }) => {
            warn!("Rejected request: {}", err);
            Response::error("Payload Too Large", StatusCode::PAYLOAD_TOO_LARGE)
        }
        Err(err) => {
            error!("Failed to read request: {}", err);
            Response::error("Bad Request", StatusCode::BAD_REQUEST)
        }
    };

    let mut transport = HyperTransport::new();
    if let Err(err) = response.send(&mut transport) {
        error!("Failed to emit response: {}", err);
    }
    transport.into_response().unwrap_or_else(|| {
        let mut fallback = hyper::Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
