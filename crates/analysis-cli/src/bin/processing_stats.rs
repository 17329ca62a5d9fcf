use analysis_cli::{init_tracing, load_config, open_record_store, truncate_string, OutputFormat};
use analysis_core::ProcessingRecord;
use analysis_db::RecordStore;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "processing_stats")]
#[command(about = "Show processing record statistics")]
struct Args {
    /// List failed records that are still below the retry limit
    #[arg(long)]
    failed: bool,

    /// Retry limit used with --failed
    #[arg(long, default_value_t = 3)]
    max_retries: i32,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = load_config()?;
    let store = open_record_store(&config).await?;
    let stats = store.stats().await?;
    let failed = if args.failed {
        Some(store.failed_records(args.max_retries).await?)
    } else {
        None
    };

    match args.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "stats": stats,
                "failed_records": failed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("\n=== Processing Statistics ===\n");
            println!("Total Records: {}", stats.total_records);
            let counts = &stats.status_counts;
            println!("  pending:    {:>8}", counts.pending);
            println!("  processing: {:>8}", counts.processing);
            println!("  completed:  {:>8}", counts.completed);
            println!("  failed:     {:>8}", counts.failed);

            println!("\n--- Recent Records ---");
            if stats.recent_records.is_empty() {
                println!("(none)");
            }
            for record in &stats.recent_records {
                println!(
                    "{:>8}  {:<10}  {:<25}  {}",
                    record.id,
                    record.status.to_string(),
                    record.started_at.format("%Y-%m-%d %H:%M:%S"),
                    truncate_string(&record.source_key, 50)
                );
            }

            if let Some(failed) = &failed {
                print_failed(failed, args.max_retries);
            }
            println!();
        }
    }

    Ok(())
}

fn print_failed(records: &[ProcessingRecord], max_retries: i32) {
    println!("\n--- Failed Records (retry_count < {}) ---", max_retries);
    if records.is_empty() {
        println!("(none)");
    }
    for record in records {
        println!(
            "{:>8}  retries={}  {}  {}",
            record.id,
            record.retry_count,
            truncate_string(&record.source_key, 40),
            truncate_string(record.error_text.as_deref().unwrap_or("-"), 60)
        );
    }
}
