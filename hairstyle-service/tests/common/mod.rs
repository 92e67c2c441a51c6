#![allow(dead_code)]

use hairstyle_service::config::HairstyleConfig;
use hairstyle_service::services::providers::mock::MockVisionProvider;
use hairstyle_service::startup::Application;
use reqwest::multipart;
use service_core::retry::RecordingSleeper;
use std::sync::Arc;
use tempfile::TempDir;

pub const BOB_JSON: &str = r#"{"currentHairstyle":"Bob","description":"Chin-length bob","suggestions":[{"name":"Pixie","reason":"Opens up the face"},{"name":"Lob","reason":"Easy to grow into"}]}"#;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub provider: Arc<MockVisionProvider>,
    pub sleeper: RecordingSleeper,
    pub scratch: TempDir,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn(provider: MockVisionProvider) -> Self {
        Self::spawn_with(provider, |_| {}).await
    }

    /// Spawn with a config tweak applied after the test defaults.
    pub async fn spawn_with(
        provider: MockVisionProvider,
        configure: impl FnOnce(&mut HairstyleConfig),
    ) -> Self {
        let scratch = tempfile::tempdir().expect("Failed to create scratch dir");

        let mut config = HairstyleConfig::default();
        config.common.host = "127.0.0.1".to_string();
        config.common.port = 0; // Random port for testing
        config.upload.scratch_dir = scratch.path().to_path_buf();
        configure(&mut config);

        let provider = Arc::new(provider);
        let sleeper = RecordingSleeper::new();

        let app = Application::build_with_provider(
            config,
            provider.clone(),
            Arc::new(sleeper.clone()),
        )
        .await
        .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/api/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            provider,
            sleeper,
            scratch,
            client,
        }
    }

    pub async fn upload(&self, form: multipart::Form) -> reqwest::Response {
        self.client
            .post(format!("{}/api/detect-hairstyle", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn upload_image(&self, bytes: Vec<u8>) -> reqwest::Response {
        self.upload(image_form(bytes)).await
    }

    /// True when no per-request scratch file was left behind.
    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path())
            .expect("Failed to read scratch dir")
            .next()
            .is_none()
    }
}

pub fn image_form(bytes: Vec<u8>) -> multipart::Form {
    multipart::Form::new().part(
        "image",
        multipart::Part::bytes(bytes)
            .file_name("portrait.jpg")
            .mime_str("image/jpeg")
            .expect("Invalid mime type"),
    )
}
