// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Synthetic camera source for demo mode

use std::time::Duration;

use async_trait::async_trait;
use rand::prelude::*;

use super::{CameraConfig, Frame, FrameSource, SourceHandle};
use crate::error::{MonitorError, Result};

/// Generates moving test-pattern frames with occasional connection trouble
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_rate: f64,
    connect_failure_probability: f64,
    drop_probability: f64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            frame_rate: 15.0,
            connect_failure_probability: 0.1,
            drop_probability: 0.001,
        }
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn open(&self, config: &CameraConfig) -> Result<Box<dyn SourceHandle>> {
        let mut rng = StdRng::from_entropy();
        if rng.gen::<f64>() < self.connect_failure_probability {
            return Err(MonitorError::connect(&config.id, "simulated connection refused"));
        }

        Ok(Box::new(SyntheticHandle {
            camera: config.id.clone(),
            width: self.width,
            height: self.height,
            frame_interval: Duration::from_secs_f64(1.0 / self.frame_rate.max(1.0)),
            drop_probability: self.drop_probability,
            // cameras get different base colours
            hue: config.id.bytes().fold(0u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b)),
            sequence: 0,
            rng,
            open: true,
        }))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

struct SyntheticHandle {
    camera: String,
    width: u32,
    height: u32,
    frame_interval: Duration,
    drop_probability: f64,
    hue: u8,
    sequence: u64,
    rng: StdRng,
    open: bool,
}

impl SyntheticHandle {
    fn render(&mut self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = vec![0u8; w * h * 3];

        // Block sweeping left to right, four pixels per frame
        let block = (h / 4).max(1);
        let bx = (self.sequence as usize * 4) % w.max(1);
        let by = h / 2 - block / 2;

        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 3;
                let noise: u8 = self.rng.gen_range(0..12);
                let inside = x >= bx && x < bx + block && y >= by && y < by + block;
                if inside {
                    pixels[i..i + 3].copy_from_slice(&[250, 200, 0]);
                } else {
                    pixels[i] = self.hue.wrapping_add((x * 255 / w) as u8 / 4).saturating_add(noise);
                    pixels[i + 1] = ((y * 255 / h) as u8 / 2).saturating_add(noise);
                    pixels[i + 2] = 96u8.saturating_add(noise);
                }
            }
        }
        pixels
    }
}

#[async_trait]
impl SourceHandle for SyntheticHandle {
    async fn read_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(MonitorError::read(&self.camera, "source released"));
        }

        tokio::time::sleep(self.frame_interval).await;

        if self.rng.gen::<f64>() < self.drop_probability {
            return Err(MonitorError::read(&self.camera, "simulated signal loss"));
        }

        self.sequence += 1;
        let pixels = self.render();
        Frame::from_rgb8(self.width, self.height, pixels, self.sequence)
    }

    async fn release(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraStatus, FrameEncoding};

    fn demo_source(connect_failure_probability: f64) -> SyntheticSource {
        SyntheticSource {
            width: 64,
            height: 48,
            frame_rate: 200.0,
            connect_failure_probability,
            drop_probability: 0.0,
        }
    }

    fn camera() -> CameraConfig {
        CameraConfig {
            id: "demo-1".to_string(),
            address: "demo".to_string(),
            port: 1,
            monitored_classes: Default::default(),
            status: CameraStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_frames_are_sequenced() {
        let source = demo_source(0.0);
        let mut handle = source.open(&camera()).await.unwrap();

        let first = handle.read_frame().await.unwrap();
        let second = handle.read_frame().await.unwrap();
        assert_eq!(first.encoding(), FrameEncoding::Rgb8);
        assert_eq!((first.width(), first.height()), (64, 48));
        assert!(second.sequence() > first.sequence());

        handle.release().await;
        assert!(handle.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let source = demo_source(1.0);
        assert!(source.open(&camera()).await.is_err());
    }
}
