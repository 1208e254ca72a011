// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Simulated classifier for demo mode

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::prelude::*;

use super::{Classifier, ClassifyParams, Detection};
use crate::error::{MonitorError, Result};

/// Reports a random class from `classes` on a small fraction of frames
pub struct SimulatedClassifier {
    classes: Vec<String>,
    detection_probability: f64,
    outage_probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedClassifier {
    pub fn new(classes: Vec<String>, detection_probability: f64) -> Self {
        Self {
            classes,
            detection_probability,
            outage_probability: 0.0,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_outages(mut self, probability: f64) -> Self {
        self.outage_probability = probability;
        self
    }
}

impl Default for SimulatedClassifier {
    fn default() -> Self {
        Self::new(
            vec![
                "person".to_string(),
                "helmet".to_string(),
                "no_helmet".to_string(),
                "safety_vest".to_string(),
                "no_vest".to_string(),
            ],
            0.01,
        )
    }
}

#[async_trait]
impl Classifier for SimulatedClassifier {
    async fn classify(&self, _jpeg: Bytes, params: ClassifyParams) -> Result<Vec<Detection>> {
        let mut rng = self.rng.lock();
        if rng.gen::<f64>() < self.outage_probability {
            return Err(MonitorError::ClassifierUnavailable(
                "simulated service outage".into(),
            ));
        }
        if self.classes.is_empty() || rng.gen::<f64>() >= self.detection_probability {
            return Ok(Vec::new());
        }

        let floor = f64::from(params.confidence) / 100.0;
        let class = &self.classes[rng.gen_range(0..self.classes.len())];
        let confidence = rng.gen_range(floor..=1.0);
        Ok(vec![Detection::new(class, confidence)])
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_detects() {
        let classifier = SimulatedClassifier::new(vec!["no_helmet".to_string()], 1.0);
        let detections = classifier
            .classify(Bytes::new(), ClassifyParams::default())
            .await
            .unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class, "no_helmet");
        assert!(detections[0].confidence >= 0.4);
    }

    #[tokio::test]
    async fn test_outage() {
        let classifier = SimulatedClassifier::default().with_outages(1.0);
        assert!(classifier
            .classify(Bytes::new(), ClassifyParams::default())
            .await
            .is_err());
    }
}
