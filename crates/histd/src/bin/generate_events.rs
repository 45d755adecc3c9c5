//! Event generator for load testing
//!
//! Publishes one ev42 frame per second with time-of-flight and detector-id
//! values drawn from normal distributions centred in the reference ranges.

use anyhow::{Context, Result};
use clap::Parser;
use histd::bus::create_producer;
use histd::codec::{encode_ev42, EventMessage};
use rand_distr::{Distribution, Normal};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOW_TOF: i32 = 0;
const HIGH_TOF: i32 = 100_000_000;
const LOW_DET: i32 = 1;
const HIGH_DET: i32 = 512;

#[derive(Debug, Parser)]
#[command(name = "generate_events", version, about = "Publish synthetic ev42 event messages")]
struct Args {
    /// Broker addresses
    #[arg(short, long, value_delimiter = ',', num_args = 1.., required = true)]
    brokers: Vec<String>,

    /// Topic to write to
    #[arg(short, long)]
    topic: String,

    /// Number of messages to write
    #[arg(short = 'n', long, alias = "num_messages")]
    num_messages: u64,

    /// Number of events per message
    #[arg(short = 'e', long, alias = "num_events", default_value_t = 1000)]
    num_events: usize,
}

fn generate_data(message_id: u64, num_events: usize) -> Result<EventMessage> {
    let tof_centre = (HIGH_TOF - LOW_TOF) / 2;
    let tof_scale = tof_centre / 5;
    let det_centre = (HIGH_DET - LOW_DET) / 2;
    let det_scale = det_centre / 5;

    let tof_dist = Normal::new(tof_centre as f64, tof_scale as f64)
        .context("time-of-flight distribution")?;
    let det_dist =
        Normal::new(det_centre as f64, det_scale as f64).context("detector distribution")?;

    let mut rng = rand::thread_rng();
    let tofs: Vec<i32> = (0..num_events)
        .map(|_| tof_dist.sample(&mut rng) as i32)
        .collect();
    let det_ids: Vec<i32> = (0..num_events)
        .map(|_| det_dist.sample(&mut rng) as i32)
        .collect();

    Ok(EventMessage {
        source: "histd".to_string(),
        message_id,
        pulse_time: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
        tofs,
        det_ids,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let producer = create_producer(&args.brokers).context("opening event producer")?;

    let mut start_time = None;
    let mut end_time = None;
    for message_id in 1..=args.num_messages {
        let msg = generate_data(message_id, args.num_events)?;
        producer
            .publish(&args.topic, &encode_ev42(&msg))
            .await
            .context("publishing event message")?;

        start_time.get_or_insert(msg.pulse_time);
        end_time = Some(msg.pulse_time);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    info!(
        "Num messages = {}, total events = {}",
        args.num_messages,
        args.num_messages * args.num_events as u64
    );
    info!(
        "Start timestamp = {:?}, end timestamp = {:?}",
        start_time, end_time
    );
    Ok(())
}
