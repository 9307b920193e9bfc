//! JSON-lines frame source over any buffered reader.

use std::io::{self, BufRead};

use tracing::{debug, trace};

use super::{CaptureError, DetectorFrame, FrameSource};

/// Reads one `DetectorFrame` per line.  Blank lines are skipped.
pub struct JsonLinesSource<R> {
    reader: R,
    line: String,
    lines_read: u64,
}

impl JsonLinesSource<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            lines_read: 0,
        }
    }

    /// Read one raw line, without decoding.  `Ok(None)` at end of stream.
    pub(crate) fn read_raw_line(&mut self) -> Result<Option<&str>, CaptureError> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        if n == 0 {
            return Ok(None);
        }
        self.lines_read += 1;
        Ok(Some(self.line.trim()))
    }
}

impl<R: BufRead> FrameSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<DetectorFrame>, CaptureError> {
        loop {
            let Some(line) = self.read_raw_line()? else {
                return Ok(None);
            };
            if line.is_empty() {
                continue;
            }
            let frame: DetectorFrame = match serde_json::from_str(line) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(line = self.lines_read, "undecodable frame: {}", e);
                    return Err(e.into());
                }
            };
            trace!(line = self.lines_read, hands = frame.hands.len(), "frame decoded");
            return Ok(Some(frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(text: &str) -> JsonLinesSource<Cursor<Vec<u8>>> {
        JsonLinesSource::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_reads_frames_in_order() {
        let mut src = source(
            "{\"t\": 0.0, \"width\": 640, \"height\": 480}\n\n\
             {\"t\": 0.1, \"width\": 640, \"height\": 480, \"key\": 27, \
              \"hands\": [{\"label\": \"Right\", \"keypoints\": [[1.0, 2.0]]}]}\n",
        );
        let first = src.next_frame().unwrap().unwrap();
        assert!(first.hands.is_empty());
        let second = src.next_frame().unwrap().unwrap();
        assert_eq!(second.key, Some(27));
        assert_eq!(second.hands[0].label, "Right");
        assert_eq!(second.hands[0].keypoints, vec![[1.0, 2.0]]);
        assert!(src.next_frame().unwrap().is_none());
        assert_eq!(src.lines_read, 3);
    }

    #[test]
    fn test_bad_line_is_skippable() {
        let mut src = source("not json\n{\"width\": 10, \"height\": 10}\n");
        let err = src.next_frame().unwrap_err();
        assert!(matches!(err, CaptureError::Decode(_)));
        assert!(!err.is_fatal());
        let frame = src.next_frame().unwrap().unwrap();
        assert_eq!(frame.frame_size(), (10, 10));
    }

    #[test]
    fn test_empty_stream() {
        let mut src = source("");
        assert!(src.next_frame().unwrap().is_none());
    }
}
