use analysis_cli::init_tracing;
use analysis_core::ProbeConfig;
use analysis_processing::{check_probe, render_summary, FfprobeProbe, MetadataExtractor};
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "check_probe")]
#[command(about = "Check that ffprobe is installed and optionally extract metadata from a file")]
struct Args {
    /// ffprobe binary to invoke (defaults to FFPROBE_PATH or `ffprobe`)
    #[arg(long, env = "FFPROBE_PATH", default_value = "ffprobe")]
    ffprobe_path: String,

    /// Run a full extraction on this file and print the summary
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,
}

fn print_installation_instructions() {
    println!("\nInstallation Instructions:");
    println!("------------------------------");
    if cfg!(target_os = "windows") {
        println!("Windows:");
        println!("  1. Using Chocolatey: choco install ffmpeg");
        println!("  2. Using Scoop: scoop install ffmpeg");
        println!("  3. Manual: download from https://ffmpeg.org/download.html and add bin/ to PATH");
    } else if cfg!(target_os = "macos") {
        println!("macOS:");
        println!("  1. Using Homebrew: brew install ffmpeg");
        println!("  2. Using MacPorts: sudo port install ffmpeg");
    } else {
        println!("Linux:");
        println!("  Ubuntu/Debian: sudo apt install ffmpeg");
        println!("  CentOS/RHEL: sudo yum install ffmpeg");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = ProbeConfig {
        ffprobe_path: args.ffprobe_path,
        ..ProbeConfig::default()
    };
    let probe = Arc::new(FfprobeProbe::new(&config));

    let status = check_probe(probe.as_ref()).await;
    if status.available {
        println!(
            "ffprobe found: {}",
            status.version.as_deref().unwrap_or("unknown version")
        );
    } else {
        println!(
            "ffprobe unavailable: {}",
            status.error.as_deref().unwrap_or("unknown error")
        );
        println!("Metadata extraction will fall back to basic file analysis.");
        print_installation_instructions();
    }

    if let Some(file) = args.file {
        let extractor = MetadataExtractor::new(probe, Duration::ZERO);
        let metadata = extractor.extract_metadata(&file, None).await?;
        println!("{}", render_summary(&metadata));
    }

    if !status.available {
        bail!("ffprobe is not available");
    }
    Ok(())
}
