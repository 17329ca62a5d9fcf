//! Simulated gait analysis.
//!
//! Stands in for a real analysis algorithm. Every value here is fabricated and the section
//! is always flagged `simulated: true`.

use analysis_core::{PlaceholderAnalysis, SimulatedResults};
use std::time::Duration;

pub const PLACEHOLDER_NOTE: &str = "THIS IS PLACEHOLDER DATA - Replace with actual gait analysis";
pub const PLACEHOLDER_WARNING: &str = "These results are simulated for demonstration purposes only";

pub async fn run_placeholder_analysis(delay: Duration) -> PlaceholderAnalysis {
    tracing::info!(delay_ms = delay.as_millis() as u64, "Running placeholder analysis");
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    PlaceholderAnalysis {
        simulated: true,
        note: PLACEHOLDER_NOTE.to_string(),
        warning: PLACEHOLDER_WARNING.to_string(),
        analysis_results: SimulatedResults {
            analysis_type: "placeholder_gait_analysis".to_string(),
            status: "completed".to_string(),
            processing_time_seconds: delay.as_secs_f64(),
            gait_cycle_detected: true,
            estimated_stride_length_m: 1.25,
            estimated_cadence_spm: 110,
            estimated_walking_speed_mps: 1.4,
            confidence_score: 0.85,
            notes: vec![
                "This is a placeholder analysis".to_string(),
                "Replace with actual gait analysis algorithm".to_string(),
                "Results are simulated for demonstration".to_string(),
            ],
            next_steps: vec![
                "Implement actual video processing pipeline".to_string(),
                "Add machine learning models for gait analysis".to_string(),
                "Integrate with clinical assessment tools".to_string(),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_flagged_simulated() {
        let analysis = run_placeholder_analysis(Duration::ZERO).await;
        assert!(analysis.simulated);
        assert_eq!(analysis.analysis_results.estimated_cadence_spm, 110);
        assert_eq!(analysis.analysis_results.processing_time_seconds, 0.0);
    }
}
