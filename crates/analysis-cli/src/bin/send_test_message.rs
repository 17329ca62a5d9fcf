use analysis_cli::{init_tracing, load_config};
use analysis_worker::{QueueClient, SqsQueueBackend};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "send_test_message")]
#[command(about = "Enqueue a simplified test notification for an object")]
struct Args {
    /// Bucket to reference (defaults to S3_BUCKET)
    #[arg(long)]
    bucket: Option<String>,

    /// Object key to reference (defaults to {S3_PREFIX}/test/sample_video.mp4)
    #[arg(long)]
    key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config()?;

    let bucket = args.bucket.unwrap_or_else(|| config.filter.bucket.clone());
    let key = args
        .key
        .unwrap_or_else(|| format!("{}/test/sample_video.mp4", config.filter.key_prefix));

    let backend = SqsQueueBackend::connect(config.aws_region.clone(), &config.queue)
        .await
        .context("Failed to initialize SQS")?;
    let queue = QueueClient::new(Arc::new(backend), config.filter.clone(), &config.queue);

    let message_id = queue
        .send_test_message(&bucket, &key)
        .await
        .context("Failed to send test message")?;

    println!("Test message sent");
    println!("  Queue:      {}", queue.queue_url());
    println!("  Message ID: {}", message_id);
    println!("  Object:     s3://{}/{}", bucket, key);
    Ok(())
}
