//! HTTP/1.1 server for an arbiter node.
//!
//! Accepts JSON-RPC requests as POST bodies, one tokio task per connection,
//! and hands them to [`NodeRouter`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use junction_node::{ArbiterNode, HttpServer, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> junction_common::Result<()> {
//!     let node = Arc::new(ArbiterNode::new(NodeConfig::default()));
//!     HttpServer::new(node).run("127.0.0.1:9001".parse()?).await
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use junction_common::transport::{HttpTransport, HyperRequest, HyperResponse};
use junction_common::{JunctionError, Result};
use tokio::net::TcpListener;

use crate::http_router::NodeRouter;
use crate::node::ArbiterNode;

pub struct HttpServer {
    router: Arc<NodeRouter>,
}

impl HttpServer {
    pub fn new(node: Arc<ArbiterNode>) -> Self {
        Self {
            router: Arc::new(NodeRouter::new(node)),
        }
    }

    /// Binds `addr` and serves until the process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| JunctionError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| JunctionError::Transport(format!("Failed to get local address: {}", e)))?;
        tracing::info!(
            addr = %local,
            node_id = %self.router.node().node_id(),
            "Node HTTP server listening"
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
            let router = self.router.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let router = router.clone();
                    async move { Self::handle_request(router, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }

    async fn handle_request(
        router: Arc<NodeRouter>,
        req: HyperRequest,
    ) -> std::result::Result<HyperResponse, Infallible> {
        let jsonrpc_req = match HttpTransport::read_jsonrpc(req).await {
            Ok(req) => req,
            Err(response) => return Ok(response),
        };
        let jsonrpc_res = router.handle_request(jsonrpc_req).await;
        Ok(HttpTransport::to_http_response(jsonrpc_res))
    }
}
