//! `SocketHandle` adapter over an Axum WebSocket. Generalized from the
//! reference repo's `Arc<Mutex<SplitSink<..>>>` connection storage: rather
//! than locking the sink on every send, the write half is owned by a single
//! writer task and every `send`/`disconnect` call is a non-blocking push
//! onto its mpsc queue — `SocketHandle::send` is a synchronous trait method
//! (§9: "never probe shape"), so it cannot itself await the socket write.

use std::sync::Mutex;

use axum::extract::ws::Message;
use sfuctl_core::model::SocketHandle;
use tokio::sync::{mpsc, oneshot};

pub enum Outbound {
    Event(String, serde_json::Value),
    Close,
}

pub struct WsSocketHandle {
    out_tx: mpsc::UnboundedSender<Outbound>,
    disconnect_tx: Mutex<Option<oneshot::Sender<bool>>>,
}

impl WsSocketHandle {
    pub fn new(out_tx: mpsc::UnboundedSender<Outbound>, disconnect_tx: oneshot::Sender<bool>) -> Self {
        Self { out_tx, disconnect_tx: Mutex::new(Some(disconnect_tx)) }
    }
}

impl std::fmt::Debug for WsSocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSocketHandle").finish_non_exhaustive()
    }
}

impl SocketHandle for WsSocketHandle {
    fn send(&self, event: &str, payload: serde_json::Value) {
        let _ = self.out_tx.send(Outbound::Event(event.to_string(), payload));
    }

    fn disconnect(&self, _close_immediate: bool) {
        if let Some(tx) = self.disconnect_tx.lock().expect("poisoned").take() {
            let _ = tx.send(true);
        }
    }
}

/// Runs the write side of a connection: forwards every `Outbound::Event` as
/// a JSON text frame `{event, payload}`, and on `Outbound::Close` sends a
/// WebSocket close frame and stops. Returns once the channel is drained
/// (every `WsSocketHandle` clone dropped) or the underlying sink errors.
pub async fn run_writer(
    mut sink: futures::stream::SplitSink<axum::extract::ws::WebSocket, Message>,
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
) {
    use futures::SinkExt;

    while let Some(msg) = out_rx.recv().await {
        match msg {
            Outbound::Event(event, payload) => {
                let envelope = serde_json::json!({ "event": event, "payload": payload });
                if sink.send(Message::Text(envelope.to_string().into())).await.is_err() {
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
