use analysis_cli::{init_tracing, open_record_store, OutputFormat};
use analysis_core::WorkerConfig;
use analysis_db::RecordStore;
use analysis_processing::{check_probe, FfprobeProbe};
use analysis_storage::{ObjectStoreClient, S3ObjectStore};
use analysis_worker::{QueueClient, SqsQueueBackend};
use anyhow::{bail, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "health_check")]
#[command(about = "Check configuration, queue, object store, probe tool and database")]
struct Args {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    healthy: bool,
    /// Required checks make the whole report unhealthy when they fail.
    required: bool,
    detail: Value,
}

impl Check {
    fn ok(name: &'static str, required: bool, detail: Value) -> Self {
        Self { name, healthy: true, required, detail }
    }

    fn failed(name: &'static str, required: bool, error: impl ToString) -> Self {
        Self {
            name,
            healthy: false,
            required,
            detail: json!({ "error": error.to_string() }),
        }
    }
}

async fn check_queue(config: &WorkerConfig) -> Check {
    match SqsQueueBackend::connect(config.aws_region.clone(), &config.queue).await {
        Ok(backend) => {
            let queue = QueueClient::new(Arc::new(backend), config.filter.clone(), &config.queue);
            let stats = queue.stats().await;
            Check::ok("queue", true, json!({ "url": queue.queue_url(), "stats": stats }))
        }
        Err(e) => Check::failed("queue", true, e),
    }
}

async fn check_storage(config: &WorkerConfig) -> Check {
    let store = match S3ObjectStore::new(config.aws_region.clone(), config.s3_endpoint.clone()).await
    {
        Ok(store) => store,
        Err(e) => return Check::failed("object_store", true, e),
    };
    let client = ObjectStoreClient::new(
        Arc::new(store),
        &config.filter.bucket,
        &config.filter.key_prefix,
        config.scratch.resolved_dir(),
    );
    let scratch = client.dir_stats().await;
    match client.check_connection().await {
        Ok(()) => Check::ok(
            "object_store",
            true,
            json!({ "bucket": config.filter.bucket, "scratch": scratch }),
        ),
        Err(e) => Check {
            detail: json!({ "error": e.to_string(), "scratch": scratch }),
            ..Check::failed("object_store", true, &e)
        },
    }
}

async fn check_probe_tool(config: &WorkerConfig) -> Check {
    let probe = FfprobeProbe::new(&config.probe);
    let status = check_probe(&probe).await;
    // Extraction still works without the tool, just with less detail.
    Check {
        name: "probe",
        healthy: status.available,
        required: false,
        detail: json!(status),
    }
}

async fn check_database(config: &WorkerConfig) -> Check {
    if config.database.url.is_none() {
        return Check::ok("database", false, json!({ "configured": false }));
    }
    let store = match open_record_store(config).await {
        Ok(store) => store,
        Err(e) => return Check::failed("database", true, format!("{:#}", e)),
    };
    match store.stats().await {
        Ok(stats) => Check::ok(
            "database",
            true,
            json!({
                "configured": true,
                "total_records": stats.total_records,
                "status_counts": stats.status_counts,
            }),
        ),
        Err(e) => Check::failed("database", true, e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let checks = match WorkerConfig::from_env() {
        Ok(config) => vec![
            Check::ok("config", true, json!({ "region": config.aws_region })),
            check_queue(&config).await,
            check_storage(&config).await,
            check_probe_tool(&config).await,
            check_database(&config).await,
        ],
        Err(e) => vec![Check::failed("config", true, e)],
    };

    let healthy = checks.iter().all(|c| c.healthy || !c.required);
    match args.format {
        OutputFormat::Json => {
            let report = json!({
                "status": if healthy { "healthy" } else { "unhealthy" },
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            for check in &checks {
                let mark = match (check.healthy, check.required) {
                    (true, _) => "OK",
                    (false, true) => "FAIL",
                    (false, false) => "WARN",
                };
                println!("{:<14} {:<5} {}", check.name, mark, check.detail);
            }
            println!("\nOverall: {}", if healthy { "healthy" } else { "unhealthy" });
        }
    }

    if !healthy {
        bail!("health check failed");
    }
    Ok(())
}
