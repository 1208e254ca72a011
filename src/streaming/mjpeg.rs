// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! multipart/x-mixed-replace (MJPEG) encoding of a camera's frame slot

use bytes::{BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::warn;

use crate::camera::Frame;

/// Part boundary used on the wire
pub const MJPEG_BOUNDARY: &str = "frame";

/// `Content-Type` header value for an MJPEG response
pub fn mjpeg_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}")
}

/// Wrap one JPEG image as a multipart part
pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{MJPEG_BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// One part per published frame, starting with the current one if present.
///
/// Frames published faster than the consumer reads are coalesced to the newest. The stream
/// ends when the slot is cleared (camera stopped or removed).
pub fn mjpeg_stream(
    frames: watch::Receiver<Option<Frame>>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    WatchStream::new(frames)
        .filter_map(|frame| async move { frame })
        .filter_map(|frame| async move {
            match frame.encode_jpeg().await {
                Ok(jpeg) => Some(Ok(mjpeg_part(&jpeg))),
                Err(e) => {
                    warn!(sequence = frame.sequence(), "skipping frame in stream: {}", e);
                    None
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::FrameBroadcaster;
    use crate::testing::rgb_frame;

    #[test]
    fn test_part_layout() {
        let part = mjpeg_part(b"JPEGDATA");
        let text = String::from_utf8_lossy(&part);
        assert!(text.starts_with("--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 8\r\n\r\n"));
        assert!(text.ends_with("JPEGDATA\r\n"));
    }

    #[tokio::test]
    async fn test_stream_emits_frames_and_ends_on_clear() {
        let broadcaster = FrameBroadcaster::new();
        broadcaster.register("cam1");
        broadcaster.publish("cam1", rgb_frame(1));

        let mut stream = Box::pin(mjpeg_stream(broadcaster.subscribe("cam1").unwrap()));
        let first = stream.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"--frame\r\n"));

        broadcaster.publish("cam1", rgb_frame(2));
        assert!(stream.next().await.is_some());

        broadcaster.clear("cam1");
        assert!(stream.next().await.is_none());
    }
}
