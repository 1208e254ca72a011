// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Roboflow hosted-inference classifier

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use tracing::trace;

use super::{Classifier, ClassifyParams, Detection};
use crate::error::{MonitorError, Result};

/// Client for `POST {endpoint}/{project}/{version}` object detection
pub struct RoboflowClassifier {
    client: reqwest::Client,
    endpoint: String,
    project: String,
    version: u32,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RoboflowResponse {
    #[serde(default)]
    predictions: Vec<RoboflowPrediction>,
}

#[derive(Debug, Deserialize)]
struct RoboflowPrediction {
    class: String,
    #[serde(default)]
    confidence: f64,
}

impl RoboflowClassifier {
    pub fn new(
        endpoint: &str,
        project: &str,
        version: u32,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::ClassifierUnavailable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            version,
            api_key: api_key.to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/{}/{}", self.endpoint, self.project, self.version)
    }
}

/// The request URL carries the API key, so it is stripped before the error is logged
fn unavailable(err: reqwest::Error) -> MonitorError {
    MonitorError::ClassifierUnavailable(err.without_url().to_string())
}

fn parse_predictions(body: &str) -> Result<Vec<Detection>> {
    let response: RoboflowResponse = serde_json::from_str(body)
        .map_err(|e| MonitorError::ClassifierUnavailable(format!("malformed response: {e}")))?;

    Ok(response
        .predictions
        .into_iter()
        .map(|p| Detection {
            class: p.class,
            confidence: p.confidence,
        })
        .collect())
}

#[async_trait]
impl Classifier for RoboflowClassifier {
    async fn classify(&self, jpeg: Bytes, params: ClassifyParams) -> Result<Vec<Detection>> {
        let body = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        let confidence = params.confidence.to_string();
        let overlap = params.overlap.to_string();

        let resp = self
            .client
            .post(self.url())
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("confidence", confidence.as_str()),
                ("overlap", overlap.as_str()),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(unavailable)?;
        if !status.is_success() {
            return Err(MonitorError::ClassifierUnavailable(format!(
                "inference failed: {} - {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let detections = parse_predictions(&text)?;
        trace!(count = detections.len(), "roboflow predictions");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "roboflow"
    }
}
