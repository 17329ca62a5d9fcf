//! ffprobe adapter

use crate::error::ProbeError;
use analysis_core::{FrameRate, ProbeConfig, ProbeMetadata, VideoDetails};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// External metadata inspection capability.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    /// Availability check. Returns the tool's version line.
    async fn version(&self) -> Result<String, ProbeError>;

    /// Full inspection of a local file.
    async fn probe(&self, path: &Path) -> Result<ProbeMetadata, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    format_long_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    display_aspect_ratio: Option<String>,
    pix_fmt: Option<String>,
}

/// Normalize an ffprobe frame rate (`"30000/1001"` or `"29.97"`) to fps rounded to two
/// decimals.
pub fn parse_frame_rate(raw: Option<&str>) -> FrameRate {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return FrameRate::Unknown;
    };

    let value = match raw.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(_), Ok(den)) if den == 0.0 => return FrameRate::Unknown,
            (Ok(num), Ok(den)) => num / den,
            _ => return FrameRate::Unknown,
        },
        None => match raw.parse::<f64>() {
            Ok(v) => v,
            Err(_) => return FrameRate::Unknown,
        },
    };

    if value.is_finite() {
        FrameRate::Fps((value * 100.0).round() / 100.0)
    } else {
        FrameRate::Unknown
    }
}

fn is_kind(stream: &FfprobeStream, kind: &str) -> bool {
    stream.codec_type.as_deref() == Some(kind)
}

/// Map raw `-print_format json -show_format -show_streams` output to [`ProbeMetadata`].
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeMetadata, ProbeError> {
    let output: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let video_streams = output.streams.iter().filter(|s| is_kind(s, "video")).count();
    let audio_streams = output.streams.iter().filter(|s| is_kind(s, "audio")).count();

    let video_details = output
        .streams
        .iter()
        .find(|s| is_kind(s, "video"))
        .map(|s| VideoDetails {
            codec: s.codec_name.clone(),
            width: s.width,
            height: s.height,
            fps: parse_frame_rate(s.r_frame_rate.as_deref()),
            aspect_ratio: s.display_aspect_ratio.clone(),
            pixel_format: s.pix_fmt.clone(),
        });

    let format = output.format.unwrap_or_default();

    Ok(ProbeMetadata {
        format_name: format.format_name,
        format_long_name: format.format_long_name,
        duration_seconds: format.duration.as_deref().and_then(|d| d.parse::<f64>().ok()),
        bitrate: format.bit_rate.as_deref().and_then(|b| b.parse::<u64>().ok()),
        file_size: format.size.as_deref().and_then(|s| s.parse::<u64>().ok()),
        video_streams,
        audio_streams,
        video_details,
    })
}

/// ffprobe invoked as a child process
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    ffprobe_path: String,
    check_timeout: Duration,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            ffprobe_path: config.ffprobe_path.clone(),
            check_timeout: Duration::from_secs(config.check_timeout_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.ffprobe_path
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.ffprobe_path);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, mut command: Command, limit: Duration) -> Result<Vec<u8>, ProbeError> {
        let child = command
            .spawn()
            .map_err(|e| ProbeError::Unavailable(e.to_string()))?;

        let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(ProbeError::Timeout(limit.as_secs())),
        };

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl MetadataProbe for FfprobeProbe {
    async fn version(&self) -> Result<String, ProbeError> {
        let mut command = self.command();
        command.arg("-version");
        let stdout = self
            .run(command, self.check_timeout)
            .await
            .map_err(|e| match e {
                ProbeError::Timeout(_) | ProbeError::Unavailable(_) => e,
                other => ProbeError::Unavailable(other.to_string()),
            })?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    #[tracing::instrument(skip(self, path), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        file = %path.display()
    ))]
    async fn probe(&self, path: &Path) -> Result<ProbeMetadata, ProbeError> {
        let start = std::time::Instant::now();
        let mut command = self.command();
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);
        let stdout = self.run(command, self.timeout).await?;
        let metadata = parse_probe_output(&stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            video_duration = ?metadata.duration_seconds,
            video_streams = metadata.video_streams,
            audio_streams = metadata.audio_streams,
            "Video probe completed"
        );
        Ok(metadata)
    }
}

/// Result of the probe diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeStatus {
    pub available: bool,
    pub version: Option<String>,
    pub error: Option<String>,
}

/// Report whether the probe tool can be invoked.
pub async fn check_probe(probe: &dyn MetadataProbe) -> ProbeStatus {
    match probe.version().await {
        Ok(version) => ProbeStatus {
            available: true,
            version: Some(version),
            error: None,
        },
        Err(e) => ProbeStatus {
            available: false,
            version: None,
            error: Some(e.to_string()),
        },
    }
}
