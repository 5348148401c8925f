mod dispatch;
mod request;
mod signature;

pub use dispatch::{BufferedRpc, RpcDispatcher, RpcError, RpcHandler, RpcId, RpcInbound};
pub use request::{PendingRequests, RequestId};
pub use signature::{RpcKind, RpcSignature};
