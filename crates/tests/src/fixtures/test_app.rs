//! A running test instance of the control plane, backed by
//! `InMemoryMediaPlane` so no real mediasoup worker is spawned in CI.
//! Grounded on the reference repo's `fixtures/test_app.rs`, dropping its
//! MongoDB dependency (this control plane has no database of its own).

use std::net::SocketAddr;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use sfuctl_api::{build_router, state::AppState};
use sfuctl_config::{AppSettings, MediasoupSettings, MinutesSettings, Settings, TranscriptionConfigSettings};
use sfuctl_core::SfuState;
use sfuctl_core::media_plane::InMemoryMediaPlane;
use sfuctl_minutes::{LocalSummarizer, MinutesGenerator};
use sfuctl_transcription::TranscriptionEngine;
use tokio::net::TcpListener;

/// Doubles as both the `x-sfu-secret` operator header and the HMAC key
/// `identity::derive_key` validates participant JWTs against — `app.secret`
/// is the single shared secret this instance is configured with.
pub const TEST_SECRET: &str = "test-shared-secret-for-x-sfu-secret-header";

pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub client: reqwest::Client,
    /// Direct handle to the running instance's shared state, so a test can
    /// seed a room (or a participant) without driving a full WebSocket
    /// handshake when the scenario under test doesn't need one.
    pub core: Arc<SfuState>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    email: &'a str,
    exp: usize,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let settings = test_settings();
        let (media_plane, mut events_rx) = InMemoryMediaPlane::new();
        let core = Arc::new(SfuState::new(Arc::new(media_plane)));
        {
            let core = core.clone();
            tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    sfuctl_core::moderation::reconcile_media_plane_event(&core.registry, &core.bus, core.media_plane.as_ref(), event)
                        .await;
                }
            });
        }
        let transcription = Arc::new(TranscriptionEngine::disabled());
        let minutes = Arc::new(MinutesGenerator::new(Arc::new(LocalSummarizer), Arc::new(LocalSummarizer)));

        let app_state = AppState::new(core.clone(), transcription, minutes, settings);
        let app = build_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to random port");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        Self { addr, base_url, client, core }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn operator_get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header("x-sfu-secret", TEST_SECRET)
    }

    pub fn operator_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header("x-sfu-secret", TEST_SECRET)
    }

    /// Signs a test bearer token carrying `email` as the identity claim,
    /// the same claim `sfuctl_core::identity::derive_key` reads.
    pub fn token_for(email: &str) -> String {
        let claims = JwtClaims { email, exp: (chrono_now_plus_hour()) };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap()
    }
}

fn chrono_now_plus_hour() -> usize {
    (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize
}

fn test_settings() -> Settings {
    Settings {
        app: AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            secret: TEST_SECRET.to_string(),
            instance_id: Some("test-instance".to_string()),
        },
        mediasoup: MediasoupSettings { listen_ip: "127.0.0.1".to_string(), announced_ip: None, worker_count: 1 },
        transcription: TranscriptionConfigSettings { asr_url: None, sample_rate: 16_000, decoder_path: "ffmpeg".to_string() },
        minutes: MinutesSettings { summarizer_url: None, summarizer_token: None },
    }
}
