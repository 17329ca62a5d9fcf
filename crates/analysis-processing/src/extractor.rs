use crate::error::ProbeError;
use crate::heuristic::{basic_analysis, file_extension};
use crate::placeholder::run_placeholder_analysis;
use crate::probe::MetadataProbe;
use crate::summary::render_summary;
use analysis_core::{
    ExtractedMetadata, FileInfo, ObjectAttributes, ProcessingInfo, RealMetadata,
    TechnicalMetadata,
};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const PROCESSOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds [`ExtractedMetadata`] for a downloaded file.
#[derive(Clone)]
pub struct MetadataExtractor {
    probe: Arc<dyn MetadataProbe>,
    placeholder_delay: Duration,
}

impl MetadataExtractor {
    pub fn new(probe: Arc<dyn MetadataProbe>, placeholder_delay: Duration) -> Self {
        Self {
            probe,
            placeholder_delay,
        }
    }

    /// Technical metadata from the probe, or the extension heuristic if any probe step fails.
    #[tracing::instrument(skip(self, path), fields(file = %path.display()))]
    pub async fn extract(&self, path: &Path) -> TechnicalMetadata {
        let result = match self.probe.version().await {
            Ok(version) => {
                tracing::debug!(version = %version, "Probe available");
                self.probe.probe(path).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(metadata) => TechnicalMetadata::Probe(metadata),
            Err(e) => {
                tracing::warn!(error = %e, "Probe extraction failed, using basic analysis");
                TechnicalMetadata::BasicAnalysis(basic_analysis(path, Some(e.to_string())))
            }
        }
    }

    /// Full extraction result for `path`. `source` is `None` when the object store
    /// metadata lookup failed.
    pub async fn extract_metadata(
        &self,
        path: &Path,
        source: Option<ObjectAttributes>,
    ) -> Result<ExtractedMetadata, ProbeError> {
        tracing::info!(file = %path.display(), "Extracting metadata");

        let file_info = file_info(path).await?;
        let technical = self.extract(path).await;
        let placeholder_analysis = run_placeholder_analysis(self.placeholder_delay).await;

        let metadata = ExtractedMetadata {
            processing_info: ProcessingInfo {
                processing_timestamp: Utc::now(),
                processor_version: PROCESSOR_VERSION.to_string(),
                extraction_status: "completed".to_string(),
            },
            real_metadata: RealMetadata {
                file_info,
                source_object: source,
                technical,
            },
            placeholder_analysis,
        };

        tracing::info!("{}", render_summary(&metadata));
        Ok(metadata)
    }
}

pub async fn file_info(path: &Path) -> Result<FileInfo, ProbeError> {
    let meta = tokio::fs::metadata(path).await?;
    Ok(FileInfo::new(
        path.display().to_string(),
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        meta.len(),
        file_extension(path),
        meta.modified().ok().map(DateTime::<Utc>::from),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{FrameRate, ProbeMetadata, VideoDetails};
    use async_trait::async_trait;
    use tempfile::TempDir;

    enum FakeProbe {
        Works,
        Absent,
        BrokenOutput,
    }

    #[async_trait]
    impl MetadataProbe for FakeProbe {
        async fn version(&self) -> Result<String, ProbeError> {
            match self {
                FakeProbe::Absent => Err(ProbeError::Unavailable("No such file".to_string())),
                _ => Ok("ffprobe version 6.1".to_string()),
            }
        }

        async fn probe(&self, _path: &Path) -> Result<ProbeMetadata, ProbeError> {
            match self {
                FakeProbe::Works => Ok(ProbeMetadata {
                    format_name: Some("mov,mp4".to_string()),
                    format_long_name: None,
                    duration_seconds: Some(10.0),
                    bitrate: Some(1_000_000),
                    file_size: Some(5),
                    video_streams: 1,
                    audio_streams: 1,
                    video_details: Some(VideoDetails {
                        codec: Some("h264".to_string()),
                        width: Some(1280),
                        height: Some(720),
                        fps: FrameRate::Fps(30.0),
                        aspect_ratio: None,
                        pixel_format: None,
                    }),
                }),
                _ => Err(ProbeError::Parse("expected value".to_string())),
            }
        }
    }

    fn extractor(probe: FakeProbe) -> MetadataExtractor {
        MetadataExtractor::new(Arc::new(probe), Duration::ZERO)
    }

    #[tokio::test]
    async fn probe_path_is_tagged_ffprobe() {
        let technical = extractor(FakeProbe::Works)
            .extract(Path::new("/tmp/a.mp4"))
            .await;
        assert_eq!(technical.extraction_method(), "ffprobe");
    }

    #[tokio::test]
    async fn absent_probe_falls_back_to_heuristic() {
        let technical = extractor(FakeProbe::Absent)
            .extract(Path::new("/tmp/a.mp4"))
            .await;
        match technical {
            TechnicalMetadata::BasicAnalysis(basic) => {
                assert_eq!(basic.detected_format, "MP4");
                assert_eq!(basic.likely_codec, "H.264");
                assert!(basic.probe_error.unwrap().contains("not available"));
            }
            other => panic!("expected basic analysis, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unparsable_probe_output_falls_back() {
        let technical = extractor(FakeProbe::BrokenOutput)
            .extract(Path::new("/tmp/a.mkv"))
            .await;
        assert_eq!(technical.extraction_method(), "basic_analysis");
    }

    #[tokio::test]
    async fn extract_metadata_keeps_namespaces_apart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc123.MP4");
        tokio::fs::write(&path, b"12345").await.unwrap();

        let metadata = extractor(FakeProbe::Absent)
            .extract_metadata(&path, None)
            .await
            .unwrap();

        assert_eq!(metadata.real_metadata.file_info.filename, "abc123.MP4");
        assert_eq!(metadata.real_metadata.file_info.file_extension, ".mp4");
        assert_eq!(metadata.real_metadata.file_info.file_size_bytes, 5);
        assert!(metadata.placeholder_analysis.simulated);

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            value["real_metadata"]["technical"]["extraction_method"],
            "basic_analysis"
        );
        assert!(value["real_metadata"].get("placeholder_analysis").is_none());
        assert_eq!(value["placeholder_analysis"]["simulated"], true);

        let real = serde_json::to_value(metadata.real_only()).unwrap();
        assert!(real.get("placeholder_analysis").is_none());
        let simulated = serde_json::to_value(metadata.placeholder_only()).unwrap();
        assert!(simulated.get("real_metadata").is_none());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = extractor(FakeProbe::Works)
            .extract_metadata(Path::new("/nonexistent/a.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }
}
