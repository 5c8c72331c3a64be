use std::{future::Future, time::Duration};

use futures::{SinkExt, StreamExt};
use sharepane_core::{BackendEvent, CoreError, OutboundCommand, decode_event, encode_command};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

const EVENT_BUFFER: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A frame queued for the writer together with the slot its write result goes to.
type Outgoing = (Message, oneshot::Sender<Result<(), InvokeError>>);

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("backend channel closed")]
    ChannelClosed,
    #[error("unsupported backend url scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("backend write failed: {0}")]
    Write(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// The async `invoke(command_name, args)` seam to the backend.
///
/// Completion means the command reached the transport; the backend reports
/// the effect through the event stream.
pub trait Invoker {
    fn invoke(
        &self,
        command: OutboundCommand,
    ) -> impl Future<Output = Result<(), InvokeError>> + Send;
}

/// Hands commands to an in-process backend over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelInvoker {
    tx: mpsc::Sender<OutboundCommand>,
}

impl ChannelInvoker {
    pub fn new(tx: mpsc::Sender<OutboundCommand>) -> Self {
        Self { tx }
    }

    pub fn pair(buffer: usize) -> (Self, mpsc::Receiver<OutboundCommand>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

impl Invoker for ChannelInvoker {
    async fn invoke(&self, command: OutboundCommand) -> Result<(), InvokeError> {
        debug!(cmd = command.name(), "invoke");
        self.tx
            .send(command)
            .await
            .map_err(|_| InvokeError::ChannelClosed)
    }
}

/// Sends commands as JSON text frames on a backend WebSocket and waits for
/// the frame to be written.
#[derive(Debug, Clone)]
pub struct WsInvoker {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Invoker for WsInvoker {
    async fn invoke(&self, command: OutboundCommand) -> Result<(), InvokeError> {
        let text = encode_command(&command)?;
        debug!(cmd = command.name(), "invoke");
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((Message::Text(text.into()), ack_tx))
            .map_err(|_| InvokeError::ChannelClosed)?;
        ack_rx.await.map_err(|_| InvokeError::ChannelClosed)?
    }
}

/// A live backend session: the command side and the event subscription.
pub struct BackendConnection {
    pub invoker: WsInvoker,
    pub events: ReceiverStream<BackendEvent>,
    send_task: JoinHandle<()>,
    receive_task: JoinHandle<()>,
}

impl BackendConnection {
    pub fn close(self) {
        self.send_task.abort();
        self.receive_task.abort();
    }
}

pub async fn connect(url: &Url) -> Result<BackendConnection, InvokeError> {
    const MAX_CONNECT_ATTEMPTS: u32 = 3;
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const BACKOFF_BASE_MS: u64 = 200;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(InvokeError::UnsupportedScheme(url.scheme().to_owned()));
    }

    let mut attempt: u32 = 1;
    let ws_stream = loop {
        info!(attempt, max_attempts = MAX_CONNECT_ATTEMPTS, backend_url = %url, "connecting");

        let msg = match timeout(CONNECT_TIMEOUT, connect_async(url.as_str())).await {
            Ok(Ok((stream, _))) => break stream,
            Ok(Err(err)) => format!("connect failed: {err}"),
            Err(_) => format!("connect timed out after {CONNECT_TIMEOUT:?}"),
        };
        error!(attempt, backend_url = %url, "{msg}");
        if attempt >= MAX_CONNECT_ATTEMPTS {
            return Err(InvokeError::Connect(msg));
        }

        let backoff_ms = BACKOFF_BASE_MS.saturating_mul(1_u64 << (attempt - 1));
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        attempt += 1;
    };

    info!(backend_url = %url, "connected");
    Ok(spawn_session(ws_stream))
}

fn spawn_session(ws_stream: WsStream) -> BackendConnection {
    let (write_half, read_half) = ws_stream.split();
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Outgoing>();
    let (event_tx, event_rx) = mpsc::channel::<BackendEvent>(EVENT_BUFFER);
    let (closed_tx, closed_rx) = oneshot::channel::<()>();

    let send_task = tokio::spawn(send_loop(write_half, outgoing_rx, closed_rx));
    let receive_task = tokio::spawn(receive_loop(read_half, event_tx, closed_tx));

    BackendConnection {
        invoker: WsInvoker { tx: outgoing_tx },
        events: ReceiverStream::new(event_rx),
        send_task,
        receive_task,
    }
}

/// Writes queued frames until the session ends. Once the reader has seen the
/// connection go away, queued and later commands fail with `ChannelClosed`.
async fn send_loop(
    mut ws_write: futures::stream::SplitSink<WsStream, Message>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
    mut closed_rx: oneshot::Receiver<()>,
) {
    loop {
        let (message, ack) = tokio::select! {
            biased;
            _ = &mut closed_rx => break,
            next = outgoing_rx.recv() => match next {
                Some(next) => next,
                None => return,
            },
        };

        if let Err(err) = ws_write.send(message).await {
            warn!("backend write failed: {err}");
            let _ = ack.send(Err(InvokeError::Write(err.to_string())));
            break;
        }
        let _ = ack.send(Ok(()));
    }

    outgoing_rx.close();
    while let Some((_, ack)) = outgoing_rx.recv().await {
        let _ = ack.send(Err(InvokeError::ChannelClosed));
    }
}

async fn receive_loop(
    mut ws_read: futures::stream::SplitStream<WsStream>,
    event_tx: mpsc::Sender<BackendEvent>,
    closed_tx: oneshot::Sender<()>,
) {
    while let Some(next) = ws_read.next().await {
        let message = match next {
            Ok(message) => message,
            Err(err) => {
                warn!("backend read failed: {err}");
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("backend closed the connection");
                break;
            }
            _ => continue,
        };

        match decode_event(text.as_str()) {
            Ok(event) => {
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!("dropping undecodable backend event: {err}"),
        }
    }
    let _ = closed_tx.send(());
}
