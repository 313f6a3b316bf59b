use crate::{Error, Failure, Id, Params, RpcError, RpcMessage, RpcNotification, RpcRequest};
use crate::{RpcResponse, Success};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Message initiated by the editor.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EditorMessage {
    Request(RpcRequest),
    Notification(RpcNotification),
}

type PendingResponse = (Id, oneshot::Sender<RpcResponse>);

/// RPC client talking to the editor front-end.
#[derive(Debug)]
pub struct RpcClient {
    /// Id of the next request initiated from the backend.
    id: AtomicU64,
    /// Sender of the messages written to the editor.
    writer_sender: UnboundedSender<RpcMessage>,
    /// Registers the waiter of a response to a backend-initiated request.
    response_sender_tx: UnboundedSender<PendingResponse>,
}

impl RpcClient {
    /// Creates a new instance of [`RpcClient`].
    ///
    /// Editor-initiated messages read from `reader` are forwarded to `sink`. The
    /// `sink` is dropped once `reader` reaches EOF, which is how the owner of the
    /// receiving half learns that the editor has gone away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        reader: impl BufRead + Send + 'static,
        writer: impl Write + Send + 'static,
        sink: UnboundedSender<EditorMessage>,
    ) -> Self {
        let (response_sender_tx, response_sender_rx) = unbounded_channel();

        let spawn_result = std::thread::Builder::new()
            .name("stdio-reader".to_string())
            .spawn(move || {
                if let Err(error) = loop_read(reader, response_sender_rx, &sink) {
                    tracing::error!(?error, "Thread stdio-reader exited");
                }
            });

        if let Err(error) = spawn_result {
            tracing::error!(?error, "Failed to spawn stdio-reader thread");
        }

        let (writer_sender, io_writer_receiver) = unbounded_channel();
        tokio::spawn(async move {
            if let Err(error) = loop_write(writer, io_writer_receiver).await {
                tracing::error!(?error, "Task stdio-writer exited");
            }
        });

        Self {
            id: Default::default(),
            writer_sender,
            response_sender_tx,
        }
    }

    fn next_request_id(&self) -> u64 {
        self.id.fetch_add(1, Ordering::SeqCst)
    }

    /// Sends a request to the editor and waits for its result.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: impl AsRef<str>,
        params: impl Serialize,
    ) -> Result<R, RpcError> {
        let id = Id::Num(self.next_request_id());
        let rpc_request = RpcRequest {
            jsonrpc: None,
            id: id.clone(),
            method: method.as_ref().to_owned(),
            params: Params::from_serializable(params)?,
        };

        let (request_result_tx, request_result_rx) = oneshot::channel();
        // The waiter must be registered before the request goes out.
        self.response_sender_tx.send((id, request_result_tx))?;
        self.writer_sender.send(RpcMessage::Request(rpc_request))?;

        match request_result_rx.await? {
            RpcResponse::Success(ok) => Ok(serde_json::from_value(ok.result)?),
            RpcResponse::Failure(err) => Err(RpcError::Request(err.error)),
        }
    }

    /// Sends a notification to the editor.
    pub fn notify(&self, method: impl AsRef<str>, params: impl Serialize) -> Result<(), RpcError> {
        let notification = RpcNotification {
            jsonrpc: None,
            method: method.as_ref().to_owned(),
            params: Params::from_serializable(params)?,
        };

        self.writer_sender
            .send(RpcMessage::Notification(notification))?;

        Ok(())
    }

    /// Sends the response of a request initiated from the editor.
    pub fn send_response(
        &self,
        id: Id,
        output_result: Result<impl Serialize, Error>,
    ) -> Result<(), RpcError> {
        let rpc_response = match output_result {
            Ok(ok) => RpcResponse::Success(Success {
                jsonrpc: None,
                id,
                result: serde_json::to_value(ok)?,
            }),
            Err(error) => RpcResponse::Failure(Failure {
                jsonrpc: None,
                id,
                error,
            }),
        };

        self.writer_sender
            .send(RpcMessage::Response(rpc_response))?;

        Ok(())
    }
}

/// Keeps reading the messages from the editor until EOF.
fn loop_read(
    mut reader: impl BufRead,
    mut response_sender_rx: UnboundedReceiver<PendingResponse>,
    sink: &UnboundedSender<EditorMessage>,
) -> Result<(), RpcError> {
    let mut pending_response_senders = HashMap::new();
    let mut line = String::new();

    loop {
        line.clear();

        if reader.read_line(&mut line)? == 0 {
            tracing::debug!("EOF reached, editor is gone");
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<RpcMessage>(trimmed) {
            Ok(RpcMessage::Request(rpc_request)) => {
                sink.send(EditorMessage::Request(rpc_request))?;
            }
            Ok(RpcMessage::Notification(notification)) => {
                sink.send(EditorMessage::Notification(notification))?;
            }
            Ok(RpcMessage::Response(response)) => {
                while let Ok((id, response_sender)) = response_sender_rx.try_recv() {
                    pending_response_senders.insert(id, response_sender);
                }

                match pending_response_senders.remove(response.id()) {
                    Some(response_sender) => {
                        if let Err(response) = response_sender.send(response) {
                            tracing::debug!(?response, "Requester is gone, response dropped");
                        }
                    }
                    None => {
                        tracing::error!(id = %response.id(), "Response to an unknown request");
                    }
                }
            }
            Err(err) => {
                tracing::error!(error = ?err, line = trimmed, "Invalid raw editor message");
            }
        }
    }
}

/// Keeps writing the messages to the editor.
async fn loop_write(
    mut writer: impl Write,
    mut io_writer_receiver: UnboundedReceiver<RpcMessage>,
) -> Result<(), RpcError> {
    while let Some(msg) = io_writer_receiver.recv().await {
        let s = serde_json::to_string(&msg)?;

        if s.len() < 128 {
            tracing::trace!(?msg, "=> Editor");
        } else {
            let msg_size = s.len();
            match &msg {
                RpcMessage::Request(request) => {
                    tracing::trace!(method = ?request.method, msg_size, "=> Editor Request")
                }
                RpcMessage::Response(response) => {
                    tracing::trace!(id = %response.id(), msg_size, "=> Editor Response")
                }
                RpcMessage::Notification(notification) => {
                    tracing::trace!(method = ?notification.method, msg_size, "=> Editor Notification")
                }
            }
        }

        write!(writer, "Content-length: {}\n\n{}\n", s.len(), s)?;
        writer.flush()?;
    }

    Ok(())
}
