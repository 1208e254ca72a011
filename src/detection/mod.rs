//! Detection module - frame classification and violation recording

mod roboflow;
mod simulated;
mod recorder;

pub use roboflow::*;
pub use simulated::*;
pub use recorder::*;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Thresholds forwarded with every classification request, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyParams {
    pub confidence: u8,
    pub overlap: u8,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            confidence: 40,
            overlap: 30,
        }
    }
}

/// One object class found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f64,
}

impl Detection {
    pub fn new(class: &str, confidence: f64) -> Self {
        Self {
            class: class.to_string(),
            confidence,
        }
    }
}

/// Object classification service
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a JPEG-encoded frame. Fails with `MonitorError::ClassifierUnavailable`.
    async fn classify(&self, jpeg: Bytes, params: ClassifyParams) -> Result<Vec<Detection>>;

    fn name(&self) -> &'static str;
}

/// Stand-in used when no classifier is configured: every frame is clean
#[derive(Debug, Default)]
pub struct DisabledClassifier {
    warned: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _jpeg: Bytes, _params: ClassifyParams) -> Result<Vec<Detection>> {
        if !self.warned.swap(true, std::sync::atomic::Ordering::Relaxed) {
            warn!("no classifier configured; frames are streamed but never classified");
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
