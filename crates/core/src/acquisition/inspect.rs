//! Sanity checks on a finished download before it is classified.

use thiserror::Error;

use crate::config::AcquisitionConfig;
use crate::prober::ProbeResult;

/// Why a downloaded file was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InspectionFailure {
    #[error("file is {size_bytes} bytes, limit is {max_bytes}")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("duration could not be probed")]
    MissingDuration,

    #[error("duration {duration_secs:.0}s does not match runtime {runtime_secs}s")]
    RuntimeMismatch { duration_secs: f64, runtime_secs: u64 },

    #[error("first stream is not video")]
    NoLeadingVideo,
}

/// Check a probed file against the slot's expectations. `runtime_secs` is
/// the official runtime, when known.
pub fn inspect(
    probe: &ProbeResult,
    file_size: u64,
    runtime_secs: Option<u64>,
    config: &AcquisitionConfig,
) -> Result<(), InspectionFailure> {
    let size_bytes = probe.size_bytes.unwrap_or(file_size).max(file_size);
    if size_bytes > config.max_file_size_bytes {
        return Err(InspectionFailure::TooLarge {
            size_bytes,
            max_bytes: config.max_file_size_bytes,
        });
    }

    if let Some(runtime_secs) = runtime_secs.filter(|r| *r > 0) {
        let duration_secs = probe
            .duration_secs
            .ok_or(InspectionFailure::MissingDuration)?;
        let runtime = runtime_secs as f64;
        if (duration_secs - runtime).abs() > runtime * config.runtime_tolerance {
            return Err(InspectionFailure::RuntimeMismatch {
                duration_secs,
                runtime_secs,
            });
        }
    }

    if !probe.first_stream_is_video() {
        return Err(InspectionFailure::NoLeadingVideo);
    }
    Ok(())
}
