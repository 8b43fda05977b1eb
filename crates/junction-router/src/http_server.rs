//! HTTP/1.1 server for a router.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use junction_common::transport::{HttpTransport, HyperRequest, HyperResponse};
use junction_common::{JunctionError, Result};
use tokio::net::TcpListener;

use crate::http_router::RouterRpc;
use crate::router::Router;

pub struct HttpServer {
    rpc: Arc<RouterRpc>,
}

impl HttpServer {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            rpc: Arc::new(RouterRpc::new(router)),
        }
    }

    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| JunctionError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| JunctionError::Transport(format!("Failed to get local address: {}", e)))?;
        tracing::info!(
            addr = %local,
            nodes = ?self.rpc.router().nodes(),
            "Router HTTP server listening"
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let rpc = self.rpc.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let rpc = rpc.clone();
                    async move { Self::handle_request(rpc, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }

    async fn handle_request(
        rpc: Arc<RouterRpc>,
        req: HyperRequest,
    ) -> std::result::Result<HyperResponse, Infallible> {
        let jsonrpc_req = match HttpTransport::read_jsonrpc(req).await {
            Ok(req) => req,
            Err(response) => return Ok(response),
        };
        Ok(HttpTransport::to_http_response(rpc.handle_request(jsonrpc_req).await))
    }
}
