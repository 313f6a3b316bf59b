//! JSON-RPC plumbing between the preview backend and the editor front-end.

mod client;
mod jsonrpc;

use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::oneshot;

pub use self::client::{EditorMessage, RpcClient};
pub use self::jsonrpc::{
    Error, ErrorCode, Failure, Id, Params, RpcMessage, RpcNotification, RpcRequest, RpcResponse,
    Success, Version,
};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to send raw message: {0}")]
    SendRawMessage(#[from] SendError<RpcMessage>),
    #[error("failed to forward editor message: {0}")]
    SendEditorMessage(#[from] SendError<EditorMessage>),
    #[error("failed to register pending request: {0}")]
    SendRequest(#[from] SendError<(Id, oneshot::Sender<RpcResponse>)>),
    #[error("failed to send response: {0:?}")]
    SendResponse(RpcResponse),
    #[error("sender is dropped: {0}")]
    OneshotRecv(#[from] oneshot::error::RecvError),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("request failure: {0}")]
    Request(Error),
}
