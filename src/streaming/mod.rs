//! Live frame distribution - latest-frame slots and MJPEG encoding

mod mjpeg;

pub use mjpeg::*;

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::camera::Frame;

/// Latest frame per camera, shared between its worker (single writer) and any number of
/// streaming consumers.
///
/// A camera's slot exists only while it is monitored: the supervisor registers it before the
/// worker starts and the worker clears it on stop. Frames published to an unregistered id
/// are dropped, so a late publish can never resurrect a stopped camera's slot. Removing a
/// slot closes every subscription to it.
#[derive(Debug, Default)]
pub struct FrameBroadcaster {
    slots: RwLock<HashMap<String, watch::Sender<Option<Frame>>>>,
}

impl FrameBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty slot for `camera_id`. Keeps the current slot if one exists.
    pub fn register(&self, camera_id: &str) {
        let mut slots = self.slots.write();
        slots
            .entry(camera_id.to_string())
            .or_insert_with(|| watch::channel(None).0);
    }

    /// Replace the latest frame. Returns false if the camera has no slot.
    pub fn publish(&self, camera_id: &str, frame: Frame) -> bool {
        let slots = self.slots.read();
        match slots.get(camera_id) {
            Some(slot) => {
                slot.send_replace(Some(frame));
                true
            }
            None => {
                debug!(camera_id, "dropping frame for unregistered camera");
                false
            }
        }
    }

    pub fn latest(&self, camera_id: &str) -> Option<Frame> {
        let slots = self.slots.read();
        slots.get(camera_id).and_then(|slot| slot.borrow().clone())
    }

    /// Empty the slot but keep it registered. Used while a camera reconnects, so neither
    /// status queries nor new consumers see a frame from the lost connection.
    pub fn reset(&self, camera_id: &str) {
        let slots = self.slots.read();
        if let Some(slot) = slots.get(camera_id) {
            slot.send_replace(None);
        }
    }

    /// Remove the slot, ending all streams for the camera
    pub fn clear(&self, camera_id: &str) {
        let removed = self.slots.write().remove(camera_id);
        if removed.is_some() {
            debug!(camera_id, "frame slot cleared");
        }
    }

    /// Follow a camera's frames. `None` if the camera is not monitored.
    pub fn subscribe(&self, camera_id: &str) -> Option<watch::Receiver<Option<Frame>>> {
        let slots = self.slots.read();
        slots.get(camera_id).map(|slot| slot.subscribe())
    }

    pub fn is_registered(&self, camera_id: &str) -> bool {
        self.slots.read().contains_key(camera_id)
    }

    pub fn consumer_count(&self, camera_id: &str) -> usize {
        self.slots
            .read()
            .get(camera_id)
            .map(|slot| slot.receiver_count())
            .unwrap_or(0)
    }
}
