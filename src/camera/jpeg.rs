//! Splits a concatenated JPEG byte stream (ffmpeg `image2pipe`) into images

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on buffered bytes before old data is discarded
pub const MAX_BUFFERED_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct JpegSplitter {
    buffer: Vec<u8>,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the newest complete image it closed, if any.
    /// Older complete images in the same chunk are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > MAX_BUFFERED_BYTES {
            let overflow = self.buffer.len() - MAX_BUFFERED_BYTES;
            self.buffer.drain(..overflow);
        }

        let mut newest = None;
        loop {
            let Some(start) = find(&self.buffer, &SOI) else {
                // a start marker may be split across chunks
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                let drop = self.buffer.len() - keep;
                self.buffer.drain(..drop);
                break;
            };
            let Some(end) = find(&self.buffer[start + 2..], &EOI).map(|rel| start + 2 + rel + 2)
            else {
                self.buffer.drain(..start);
                break;
            };

            newest = Some(self.buffer[start..end].to_vec());
            self.buffer.drain(..end);
        }
        newest
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(payload: &[u8]) -> Vec<u8> {
        let mut out = SOI.to_vec();
        out.extend_from_slice(payload);
        out.extend_from_slice(&EOI);
        out
    }

    #[test]
    fn test_image_split_across_chunks() {
        let mut splitter = JpegSplitter::new();
        let image = jpeg(b"frame-body");

        assert!(splitter.push(&image[..4]).is_none());
        assert_eq!(splitter.push(&image[4..]), Some(image));
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn test_newest_image_wins() {
        let mut splitter = JpegSplitter::new();
        let mut chunk = b"noise".to_vec();
        chunk.extend(jpeg(b"one"));
        chunk.extend(jpeg(b"two"));
        chunk.extend_from_slice(&SOI);

        assert_eq!(splitter.push(&chunk), Some(jpeg(b"two")));
        // the dangling start marker is kept for the next image
        assert_eq!(splitter.buffered(), 2);
    }

    #[test]
    fn test_garbage_is_discarded() {
        let mut splitter = JpegSplitter::new();
        assert!(splitter.push(b"no markers here").is_none());
        assert_eq!(splitter.buffered(), 0);
    }
}
