//! Door sensor simulator
//!
//! Stands in for the sensor-equipped door client: posts random enter/exit
//! events to a running occupancy server at a fixed interval.
//!
//! Usage:
//!   cargo run --bin occupancy-sim -- --url http://localhost:3000 --interval-ms 500 --events 100

use clap::Parser;
use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "occupancy-sim", about = "Simulated door sensor for local testing")]
struct Args {
    /// Base URL of the occupancy server
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Delay between events
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Number of events to send (0 = run until interrupted)
    #[arg(long, default_value = "0")]
    events: u64,

    /// Probability that an event is an entry
    #[arg(long, default_value = "0.55")]
    enter_ratio: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    anyhow::ensure!((0.0..=1.0).contains(&args.enter_ratio), "--enter-ratio must be within 0..=1");

    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
    let endpoint = format!("{}/api/visitors/update", args.url.trim_end_matches('/'));
    let mut interval = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));

    info!(endpoint = %endpoint, interval_ms = %args.interval_ms, events = %args.events, "sim_started");

    let mut sent = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let action = if rand::thread_rng().gen_bool(args.enter_ratio) { "enter" } else { "exit" };
        let body = json!({ "action": action, "count": 1 });

        match client.post(&endpoint).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                let reply: Value = resp.json().await.unwrap_or(Value::Null);
                info!(action = %action, current_visitors = %reply["currentVisitors"], "sim_event_sent");
            }
            Ok(resp) => {
                warn!(action = %action, status = %resp.status(), "sim_event_rejected");
            }
            Err(e) => {
                warn!(action = %action, error = %e, "sim_event_failed");
            }
        }

        sent += 1;
        if args.events > 0 && sent >= args.events {
            break;
        }
    }

    info!(sent = %sent, "sim_finished");
    Ok(())
}
