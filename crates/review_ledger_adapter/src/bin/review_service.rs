#![forbid(unsafe_code)]

use std::{env, time::Duration};

use review_ledger_adapter::AdapterRuntime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// JSON-lines intake on stdin plus the periodic sweep, both over one in-process store.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let sweep_worker_enabled = parse_sweep_worker_enabled_from_env();
    let sweep_interval_ms = parse_sweep_interval_ms_from_env();
    let runtime = AdapterRuntime::default_from_env(&Handle::current());
    info!(
        ledger = runtime.ledger_label(),
        sweep_worker_enabled,
        sweep_interval_ms,
        "review_ledger_service started"
    );

    let sweep_worker = sweep_worker_enabled.then(|| {
        runtime.spawn_sweep_worker(&Handle::current(), Duration::from_millis(sweep_interval_ms))
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let adapter = runtime.clone();
                match tokio::task::spawn_blocking(move || adapter.run_command_line(&line)).await {
                    Ok(reply) => println!("{reply}"),
                    Err(err) => warn!(error = %err, "command panicked"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    if let Some(worker) = sweep_worker {
        worker.abort();
    }
    info!("review_ledger_service shutting down");
    Ok(())
}

fn parse_sweep_worker_enabled_from_env() -> bool {
    match env::var("REVIEW_LEDGER_SWEEP_WORKER_ENABLED") {
        Ok(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => true,
    }
}

fn parse_sweep_interval_ms_from_env() -> u64 {
    env::var("REVIEW_LEDGER_SWEEP_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| (1_000..=3_600_000).contains(v))
        .unwrap_or(60_000)
}
