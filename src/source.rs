//! Pose source: JSON Lines stream of pose-estimation results.
//!
//! Each line is one tick: a PoseNet-shaped pose, or `{"error": "..."}` for a
//! failed model call. A reader thread parses lines into a bounded channel;
//! the receiving side drives the tick loop.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::TugError;
use crate::keypoints::RawPose;

pub type PoseEvent = Result<RawPose, TugError>;

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceLine {
    Failure { error: String },
    Pose(RawPose),
}

/// Parse one line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<PoseEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let event = match serde_json::from_str::<SourceLine>(line) {
        Ok(SourceLine::Pose(pose)) => Ok(pose),
        Ok(SourceLine::Failure { error }) => Err(TugError::AcquisitionFailure(error)),
        Err(e) => Err(TugError::AcquisitionFailure(format!("malformed pose: {e}"))),
    };
    Some(event)
}

pub struct PoseSource {
    reader: Box<dyn BufRead + Send>,
    name: String,
}

impl PoseSource {
    /// Open a pose file, or stdin when `path` is `None`.
    pub fn open(path: Option<&Path>) -> Result<Self, TugError> {
        match path {
            Some(path) => {
                let file = File::open(path).map_err(|e| {
                    TugError::ModelUnavailable(format!("cannot open {}: {}", path.display(), e))
                })?;
                info!("Reading poses from {}", path.display());
                Ok(Self::from_reader(BufReader::new(file), path.display().to_string()))
            }
            None => {
                info!("Reading poses from stdin");
                Ok(Self::from_reader(BufReader::new(io::stdin()), "stdin".to_string()))
            }
        }
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static, name: impl Into<String>) -> Self {
        Self {
            reader: Box::new(reader),
            name: name.into(),
        }
    }

    /// Start the reader thread. The channel closes at end of input.
    pub fn spawn(self, capacity: usize) -> flume::Receiver<PoseEvent> {
        let (tx, rx) = flume::bounded::<PoseEvent>(capacity);
        let PoseSource { mut reader, name } = self;

        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let mut count = 0usize;
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Read error on {}: {}", name, e);
                        let _ = tx.send(Err(TugError::AcquisitionFailure(e.to_string())));
                        break;
                    }
                }
                // Undecodable bytes cost one tick, not the stream
                let Some(event) = parse_line(&String::from_utf8_lossy(&buf)) else {
                    continue;
                };
                count += 1;
                // Blocking send: a replay must not drop frames
                if tx.send(event).is_err() {
                    debug!("Pose consumer gone, reader for {} exiting", name);
                    return;
                }
            }
            info!("Pose source {} exhausted after {} ticks", name, count);
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_pose_line() {
        let line = r#"{"timestamp":1000,"score":0.9,"keypoints":[{"part":"leftHip","score":0.8,"position":{"x":1,"y":2}}]}"#;
        let pose = parse_line(line).unwrap().unwrap();
        assert_eq!(pose.timestamp, Some(1000));
        assert_eq!(pose.keypoints.len(), 1);
    }

    #[test]
    fn test_parse_failure_and_garbage() {
        assert!(matches!(
            parse_line(r#"{"error":"inference timeout"}"#),
            Some(Err(TugError::AcquisitionFailure(msg))) if msg == "inference timeout"
        ));
        assert!(matches!(parse_line("{not json"), Some(Err(TugError::AcquisitionFailure(_)))));
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn test_missing_file_is_model_unavailable() {
        let result = PoseSource::open(Some(Path::new("/nonexistent/poses.jsonl")));
        assert!(matches!(result, Err(TugError::ModelUnavailable(_))));
    }

    #[test]
    fn test_spawn_streams_all_lines() {
        let input = "{\"score\":0.9,\"keypoints\":[]}\n\n{\"error\":\"x\"}\n";
        let rx = PoseSource::from_reader(Cursor::new(input), "memory").spawn(1);
        let events: Vec<PoseEvent> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut input = b"{\"score\":0.9,\"keypoints\":[]}\n".to_vec();
        input.extend_from_slice(b"{\"error\":\"\xff\xfe\"}\n");
        input.extend_from_slice(b"\xc3\x28 not json\n");
        input.extend_from_slice(b"{\"score\":0.7,\"keypoints\":[]}");
        let rx = PoseSource::from_reader(Cursor::new(input), "memory").spawn(1);
        let events: Vec<PoseEvent> = rx.iter().collect();

        assert_eq!(events.len(), 4);
        assert!(matches!(&events[1], Err(TugError::AcquisitionFailure(_))));
        assert!(matches!(&events[2], Err(TugError::AcquisitionFailure(_))));
        assert!(matches!(&events[3], Ok(pose) if pose.score == 0.7));
    }
}
