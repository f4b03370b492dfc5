//! Shared fixtures for the integration tests
//!
//! - Stub local and remote backends that record how they were called
//! - A minimal multipart body builder
//! - Small image fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use withoutbg_server::{
    AppState, BackendError, LocalRemover, RemoteBackend, ServiceConfig, UsageStats,
};

/// Credential the stub remote rejects
pub const REJECTED_KEY: &str = "revoked-key";

/// Local stub: clears the alpha of the top-left pixel, keeps the rest opaque
#[derive(Default)]
pub struct StubLocal {
    pub calls: AtomicUsize,
}

impl StubLocal {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocalRemover for StubLocal {
    fn remove(&self, image: DynamicImage) -> Result<DynamicImage, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rgba = image.into_rgba8();
        rgba.get_pixel_mut(0, 0)[3] = 0;
        Ok(DynamicImage::ImageRgba8(rgba))
    }

    fn name(&self) -> &str {
        "stub-local"
    }
}

/// Remote stub recording every credential it receives
#[derive(Default)]
pub struct RecordingRemote {
    pub removal_credentials: Mutex<Vec<String>>,
    pub usage_credentials: Mutex<Vec<String>>,
}

impl RecordingRemote {
    pub fn removal_credentials(&self) -> Vec<String> {
        self.removal_credentials.lock().unwrap().clone()
    }

    pub fn usage_credentials(&self) -> Vec<String> {
        self.usage_credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteBackend for RecordingRemote {
    async fn remove(
        &self,
        image: DynamicImage,
        credential: &str,
    ) -> Result<DynamicImage, BackendError> {
        self.removal_credentials
            .lock()
            .unwrap()
            .push(credential.to_string());
        if credential == REJECTED_KEY {
            return Err(BackendError::removal("Invalid API key"));
        }

        let mut rgba = image.into_rgba8();
        for pixel in rgba.pixels_mut() {
            pixel[3] = 128;
        }
        Ok(DynamicImage::ImageRgba8(rgba))
    }

    async fn usage(&self, credential: &str) -> Result<UsageStats, BackendError> {
        self.usage_credentials
            .lock()
            .unwrap()
            .push(credential.to_string());
        if credential == REJECTED_KEY {
            return Err(BackendError::removal("Invalid API key"));
        }

        let mut stats = UsageStats::new();
        stats.insert("credits_remaining".to_string(), json!(250));
        stats.insert("plan".to_string(), json!("starter"));
        Ok(stats)
    }
}

/// Application state over fresh stubs
pub fn stub_state() -> (Arc<AppState>, Arc<StubLocal>, Arc<RecordingRemote>) {
    stub_state_with(ServiceConfig::default())
}

pub fn stub_state_with(
    config: ServiceConfig,
) -> (Arc<AppState>, Arc<StubLocal>, Arc<RecordingRemote>) {
    let local = Arc::new(StubLocal::default());
    let remote = Arc::new(RecordingRemote::default());
    let state = AppState::new(
        config,
        Arc::clone(&local) as Arc<dyn LocalRemover>,
        Arc::clone(&remote) as Arc<dyn RemoteBackend>,
    );
    (Arc::new(state), local, remote)
}

/// Solid opaque red PNG
pub fn red_png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([255, 0, 0, 255]),
    ));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

/// Builder for `multipart/form-data` request bodies
pub struct MultipartForm {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "----withoutbg-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, content_type: Option<&str>, data: &[u8]) -> Self {
        let mut head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"upload\"\r\n",
            self.boundary
        );
        if let Some(content_type) = content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        head.push_str("\r\n");

        self.body.extend_from_slice(head.as_bytes());
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Content-Type header value and finished body
    pub fn build(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
