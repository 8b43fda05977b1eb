pub mod error;
pub mod jsonrpc;
pub mod methods;

pub use error::{JunctionError, Result};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
