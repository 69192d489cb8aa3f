//! Per-room transcription worker. Grounded on the reference repo's
//! `TranscriptionWorker::run` split (an ingestion loop feeding an ASR loop
//! over an mpsc channel) but retargeted at this crate's pipeline: plain RTP
//! tap → external decoder process → streaming ASR WebSocket, rather than
//! the reference's in-process Whisper/ONNX backends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use sfuctl_core::identity::ChannelId;
use sfuctl_core::media_plane::{MediaPlane, ProducerId, RtpTap};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use crate::asr_frame::{parse_frame, ParsedFrame};
use crate::chunk::{TranscriptBuffer, TranscriptChunk};
use crate::config::TranscriptionSettings;

pub struct Transcriber {
    channel: ChannelId,
    producer_id: ProducerId,
    buffer: Arc<Mutex<TranscriptBuffer>>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    started_at: chrono::DateTime<Utc>,
}

impl Transcriber {
    /// Starts the pipeline: plain RTP transport, consume the source
    /// producer into it, spawn the decoder, open the ASR socket, and begin
    /// streaming. `start` is idempotent per producer — callers ensure this
    /// function runs at most once by checking `TranscriptionEngine`'s map
    /// before spawning.
    pub async fn start(
        channel: ChannelId,
        producer_id: ProducerId,
        media_plane: Arc<dyn MediaPlane>,
        settings: TranscriptionSettings,
    ) -> anyhow::Result<Arc<Self>> {
        let tap = media_plane.create_plain_transport_tap(&channel, producer_id.clone()).await?;

        let buffer = Arc::new(Mutex::new(TranscriptBuffer::new()));
        let (stop_tx, stop_rx) = oneshot::channel();

        let worker = Arc::new(Self {
            channel: channel.clone(),
            producer_id: producer_id.clone(),
            buffer: buffer.clone(),
            stop_tx: Mutex::new(Some(stop_tx)),
            started_at: Utc::now(),
        });

        tokio::spawn(run_pipeline(
            channel,
            tap,
            media_plane,
            settings,
            buffer,
            worker.started_at,
            stop_rx,
        ));

        Ok(worker)
    }

    pub fn snapshot(&self) -> Vec<TranscriptChunk> {
        self.buffer.lock().snapshot()
    }

    pub fn producer_id(&self) -> &ProducerId {
        &self.producer_id
    }

    /// Stops the pipeline: sends `{eof:1}` to the ASR socket best-effort,
    /// flushes any pending partial text as a final chunk, and releases the
    /// decoder/transport resources. Safe to call more than once.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(());
        }
        let now_ms = Utc::now().signed_duration_since(self.started_at).num_milliseconds();
        self.buffer.lock().flush_partial(now_ms, None);
    }
}

async fn run_pipeline(
    channel: ChannelId,
    tap: RtpTap,
    media_plane: Arc<dyn MediaPlane>,
    settings: TranscriptionSettings,
    buffer: Arc<Mutex<TranscriptBuffer>>,
    started_at: chrono::DateTime<Utc>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let decoder = spawn_decoder(&settings, tap.local_port);
    let mut decoder = match decoder {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(channel = %channel, error = %e, "failed to spawn RTP decoder, transcription disabled for this producer");
            return;
        }
    };

    let ws = connect_asr(&settings).await;
    let mut ws = match ws {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(channel = %channel, error = %e, "ASR socket unavailable, stopping transcriber");
            let _ = decoder.kill().await;
            return;
        }
    };

    let preamble = serde_json::json!({"config": {"sample_rate": settings.sample_rate}}).to_string();
    if ws.send(Message::Text(preamble.into())).await.is_err() {
        let _ = decoder.kill().await;
        return;
    }

    let (pcm_tx, mut pcm_rx) = mpsc::channel::<Vec<u8>>(64);
    let stdout_pump = spawn_stdout_pump(&mut decoder, pcm_tx);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => {
                let _ = ws.send(Message::Text(r#"{"eof":1}"#.into())).await;
                let _ = ws.close(None).await;
                let _ = decoder.start_kill();
                break;
            }
            frame = pcm_rx.recv() => {
                match frame {
                    Some(pcm) => {
                        if ws.send(Message::Binary(pcm.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match parse_frame(&text, started_at) {
                            ParsedFrame::Partial(p) => buffer.lock().set_partial(p),
                            ParsedFrame::Final(chunk) => { buffer.lock().append(chunk); }
                            ParsedFrame::Ignored => {}
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(channel = %channel, error = %e, "ASR socket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if let Some(handle) = stdout_pump {
        handle.abort();
    }
    // The trait surface has no dedicated tap-teardown call; releasing the
    // tap's consumer through close_producer is the closest fit to "release
    // the transport/consumer" in spec.md rule (8).
    media_plane.close_producer(&channel, tap.consumer_id.clone()).await;
}

fn spawn_decoder(settings: &TranscriptionSettings, local_port: u16) -> std::io::Result<Child> {
    Command::new(&settings.decoder_path)
        .arg("-protocol_whitelist")
        .arg("file,udp,rtp")
        .arg("-i")
        .arg(format!("rtp://127.0.0.1:{local_port}"))
        .arg("-f")
        .arg("s16le")
        .arg("-ar")
        .arg(settings.sample_rate.to_string())
        .arg("-ac")
        .arg("1")
        .arg("pipe:1")
        .stdout(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

fn spawn_stdout_pump(child: &mut Child, tx: mpsc::Sender<Vec<u8>>) -> Option<tokio::task::JoinHandle<()>> {
    use tokio::io::AsyncReadExt;

    let stdout = child.stdout.take()?;
    Some(tokio::spawn(async move {
        let mut stdout = stdout;
        let mut buf = vec![0u8; 3200];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }))
}

type AsrSocket = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect_asr(settings: &TranscriptionSettings) -> anyhow::Result<AsrSocket> {
    let url = settings
        .asr_url
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no ASR URL configured"))?;
    let (ws, _) = tokio::time::timeout(Duration::from_secs(10), tokio_tungstenite::connect_async(url)).await??;
    Ok(ws)
}
