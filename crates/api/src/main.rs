use std::sync::Arc;

use sfuctl_api::{build_router, state::AppState};
use sfuctl_config::Settings;
use sfuctl_core::SfuState;
use sfuctl_core::media_plane::MediasoupMediaPlane;
use sfuctl_minutes::{LocalSummarizer, MinutesGenerator, RemoteSummarizer, Summarizer};
use sfuctl_transcription::{TranscriptionEngine, TranscriptionSettings};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sfuctl_api=debug,sfuctl_core=debug,sfuctl_transcription=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting SFU control plane on {}:{}", settings.app.host, settings.app.port);

    let (media_plane, media_plane_events) = build_media_plane(&settings).await?;
    let core = Arc::new(SfuState::new(media_plane));
    spawn_media_plane_reconciler(core.clone(), media_plane_events);

    let transcription_settings = TranscriptionSettings {
        asr_url: settings.transcription.asr_url.clone(),
        sample_rate: settings.transcription.sample_rate,
        decoder_path: settings.transcription.decoder_path.clone(),
    };
    let transcription = Arc::new(if transcription_settings.enabled() {
        TranscriptionEngine::new(core.media_plane.clone(), transcription_settings)
    } else {
        info!("no ASR URL configured, transcription pipeline disabled");
        TranscriptionEngine::disabled()
    });

    let minutes = Arc::new(build_minutes_generator(&settings));

    let app_state = AppState::new(core, transcription, minutes, settings.clone());
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawns the mediasoup worker pool and wraps it in the `MediaPlane` trait
/// boundary, along with the `mpsc::UnboundedReceiver<MediaPlaneEvent>` the
/// caller must hand to [`spawn_media_plane_reconciler`] — see
/// `sfuctl_core::media_plane` for the trait contract.
async fn build_media_plane(
    settings: &Settings,
) -> anyhow::Result<(
    Arc<dyn sfuctl_core::media_plane::MediaPlane>,
    tokio::sync::mpsc::UnboundedReceiver<sfuctl_core::media_plane::MediaPlaneEvent>,
)> {
    use mediasoup::worker_manager::WorkerManager;

    let manager = WorkerManager::new();
    let mut workers = Vec::with_capacity(settings.mediasoup.worker_count.max(1));
    for _ in 0..settings.mediasoup.worker_count.max(1) {
        let worker = manager
            .create_worker(mediasoup::worker::WorkerSettings::default())
            .await
            .map_err(|e| anyhow::anyhow!("failed to spawn mediasoup worker: {e}"))?;
        workers.push(worker);
    }

    let listen_ip: std::net::IpAddr = settings.mediasoup.listen_ip.parse()?;
    let announced_ip: Option<std::net::IpAddr> =
        settings.mediasoup.announced_ip.as_deref().map(str::parse).transpose()?;

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let pool = Arc::new(sfuctl_core::media_plane::WorkerPool::new(workers));
    let plane: MediasoupMediaPlane =
        sfuctl_core::media_plane::MediasoupMediaPlane::new(pool, listen_ip, announced_ip, events_tx);

    Ok((Arc::new(plane), events_rx))
}

/// Selects on the media engine's out-of-band close notifications for as
/// long as `core` is alive and folds each one back into room state through
/// `sfuctl_core::moderation::reconcile_media_plane_event`.
fn spawn_media_plane_reconciler(
    core: Arc<SfuState>,
    mut events_rx: tokio::sync::mpsc::UnboundedReceiver<sfuctl_core::media_plane::MediaPlaneEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            sfuctl_core::moderation::reconcile_media_plane_event(&core.registry, &core.bus, core.media_plane.as_ref(), event)
                .await;
        }
    });
}

fn build_minutes_generator(settings: &Settings) -> MinutesGenerator {
    let local: Arc<dyn Summarizer> = Arc::new(LocalSummarizer);
    let remote: Arc<dyn Summarizer> = if settings.minutes.uses_remote_summarizer() {
        Arc::new(RemoteSummarizer::new(
            settings.minutes.summarizer_url.clone().unwrap(),
            settings.minutes.summarizer_token.clone().unwrap(),
        ))
    } else {
        info!("no summarizer token configured, minutes will use the local fallback summarizer only");
        local.clone()
    };
    MinutesGenerator::new(remote, local)
}
