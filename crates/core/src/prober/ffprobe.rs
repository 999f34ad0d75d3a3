//! ffprobe-backed media prober.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::config::ProberConfig;
use crate::metrics;

use super::{MediaProber, ProbeError, ProbeResult, ProbeStream, StreamDisposition, StreamKind};

/// Runs `ffprobe -show_format -show_streams` and parses its JSON output.
pub struct FfprobeProber {
    config: ProberConfig,
}

impl FfprobeProber {
    pub fn new(config: ProberConfig) -> Self {
        Self { config }
    }

    fn parse_output(output: &str) -> Result<ProbeResult, ProbeError> {
        #[derive(Deserialize)]
        struct Output {
            #[serde(default)]
            format: Option<Format>,
            #[serde(default)]
            streams: Vec<Stream>,
        }

        #[derive(Deserialize)]
        struct Format {
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct Stream {
            index: u32,
            #[serde(default)]
            codec_type: Option<String>,
            codec_name: Option<String>,
            channels: Option<u32>,
            bit_rate: Option<String>,
            #[serde(default)]
            tags: HashMap<String, String>,
            #[serde(default)]
            disposition: HashMap<String, i64>,
        }

        let parsed: Output = serde_json::from_str(output).map_err(|e| ProbeError::Parse {
            reason: e.to_string(),
        })?;

        let (duration_secs, size_bytes) = match parsed.format {
            Some(format) => (
                format.duration.and_then(|d| d.parse::<f64>().ok()),
                format.size.and_then(|s| s.parse::<u64>().ok()),
            ),
            None => (None, None),
        };

        let streams = parsed
            .streams
            .into_iter()
            .map(|s| {
                // Tag keys differ in case between containers ("language" vs "LANGUAGE").
                let tag = |name: &str| {
                    s.tags
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .map(|(_, v)| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                };
                let flag = |name: &str| s.disposition.get(name).copied().unwrap_or(0) != 0;

                ProbeStream {
                    index: s.index,
                    kind: match s.codec_type.as_deref() {
                        Some("video") => StreamKind::Video,
                        Some("audio") => StreamKind::Audio,
                        Some("subtitle") => StreamKind::Subtitle,
                        _ => StreamKind::Other,
                    },
                    codec_name: s.codec_name.clone(),
                    channels: s.channels,
                    bitrate: s
                        .bit_rate
                        .as_deref()
                        .and_then(|b| b.parse().ok())
                        .or_else(|| tag("BPS").and_then(|b| b.parse().ok())),
                    language: tag("language"),
                    title: tag("title"),
                    disposition: StreamDisposition {
                        default: flag("default"),
                        forced: flag("forced"),
                        comment: flag("comment"),
                        hearing_impaired: flag("hearing_impaired"),
                    },
                }
            })
            .collect();

        Ok(ProbeResult {
            duration_secs,
            size_bytes,
            streams,
        })
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        metrics::EXTERNAL_REQUESTS
            .with_label_values(&["ffprobe"])
            .inc();

        let timeout_secs = u64::from(self.config.timeout_secs);
        let run = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(timeout_secs), run)
            .await
            .map_err(|_| ProbeError::Timeout { timeout_secs })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::ProberNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    ProbeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                reason: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let result = Self::parse_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            path = %path.display(),
            streams = result.streams.len(),
            duration = ?result.duration_secs,
            "Probed media file"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output() {
        let json = r#"{
            "format": {"filename": "movie.mkv", "duration": "7200.5", "size": "5000000000"},
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264"},
                {"index": 1, "codec_type": "audio", "codec_name": "ac3", "channels": 6,
                 "bit_rate": "448000", "tags": {"language": "rus", "title": "Dub | LostFilm"},
                 "disposition": {"default": 1, "comment": 0}},
                {"index": 2, "codec_type": "audio", "codec_name": "aac", "channels": 2,
                 "tags": {"LANGUAGE": "eng", "BPS": "192000"},
                 "disposition": {"comment": 1}},
                {"index": 3, "codec_type": "subtitle", "codec_name": "subrip",
                 "tags": {"language": "eng", "title": " "},
                 "disposition": {"forced": 1}},
                {"index": 4, "codec_type": "attachment"}
            ]
        }"#;

        let result = FfprobeProber::parse_output(json).unwrap();
        assert_eq!(result.duration_secs, Some(7200.5));
        assert_eq!(result.size_bytes, Some(5_000_000_000));
        assert!(result.first_stream_is_video());
        assert_eq!(result.streams_of(StreamKind::Audio).count(), 2);

        let dub = &result.streams[1];
        assert_eq!(dub.language.as_deref(), Some("rus"));
        assert_eq!(dub.title.as_deref(), Some("Dub | LostFilm"));
        assert_eq!(dub.bitrate, Some(448000));
        assert!(dub.disposition.default);

        let commentary = &result.streams[2];
        assert_eq!(commentary.language.as_deref(), Some("eng"));
        assert_eq!(commentary.bitrate, Some(192000));
        assert!(commentary.disposition.comment);

        let subs = &result.streams[3];
        assert!(subs.disposition.forced);
        assert_eq!(subs.title, None);

        assert_eq!(result.streams[4].kind, StreamKind::Other);
    }

    #[test]
    fn test_parse_output_without_format() {
        let result = FfprobeProber::parse_output(r#"{"streams": []}"#).unwrap();
        assert_eq!(result.duration_secs, None);
        assert!(!result.first_stream_is_video());
    }

    #[test]
    fn test_parse_output_garbage() {
        assert!(matches!(
            FfprobeProber::parse_output("not json"),
            Err(ProbeError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_input() {
        let prober = FfprobeProber::new(ProberConfig::default());
        let result = prober.probe(Path::new("/nonexistent/movie.mkv")).await;
        assert!(matches!(result, Err(ProbeError::InputNotFound { .. })));
    }
}
