//! workq - A minimal, constraint-gated background work queue.
//!
//! Usage:
//!   workq one-time [--input VALUE]    Submit one-time work gated on connectivity
//!   workq periodic [--interval SECS]  Run unique periodic work until Ctrl+C
//!
//! The environment signal is simulated from flags; real integrations feed
//! the queue from platform connectivity and battery callbacks.

use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use workq::{
    Connectivity, Constraints, EnvironmentSignal, ExistingWorkPolicy, NetworkType, Payload,
    WorkContext, WorkQueue, WorkRequest, Worker, WorkerError, WorkerRegistry,
};

/// workq - a minimal, constraint-gated background work queue
#[derive(Parser)]
#[command(name = "workq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Simulated connectivity
    #[arg(long, value_enum, default_value_t = NetworkArg::Unmetered)]
    network: NetworkArg,

    /// Simulate the device being on charge
    #[arg(long)]
    charging: bool,

    /// Simulated battery percentage
    #[arg(long, default_value_t = 100)]
    battery: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkArg {
    Offline,
    Metered,
    Unmetered,
}

impl From<NetworkArg> for Connectivity {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Offline => Connectivity::Offline,
            NetworkArg::Metered => Connectivity::Metered,
            NetworkArg::Unmetered => Connectivity::Unmetered,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one-time work that requires a connected network
    OneTime {
        /// Input payload value handed to the worker
        #[arg(long, default_value = "Input Value")]
        input: String,
    },

    /// Run unique periodic work (requires charging) until Ctrl+C
    Periodic {
        /// Repeat interval in seconds
        #[arg(long, default_value_t = 900)]
        interval: u64,

        /// Minimum accepted interval in seconds, lower it for demos
        #[arg(long, default_value_t = 900)]
        min_period: u64,
    },
}

/// Echoes its input and produces a fixed output value.
struct OneTimeWorker;

#[async_trait::async_trait]
impl Worker for OneTimeWorker {
    fn name(&self) -> &str {
        "one-time"
    }

    async fn run(&self, ctx: &WorkContext) -> Result<Payload, WorkerError> {
        if let Some(input) = ctx.payload().get("inputKey") {
            info!("Worker received input: {}", input);
        }
        Ok(Payload::new().with("outputKey", "Output Value"))
    }
}

/// Logs the wall-clock time of each run.
struct ClockWorker;

#[async_trait::async_trait]
impl Worker for ClockWorker {
    fn name(&self) -> &str {
        "clock"
    }

    async fn run(&self, _ctx: &WorkContext) -> Result<Payload, WorkerError> {
        let now = chrono::Local::now();
        info!("Periodic run at {}", now.format("%Y-%m-%d %H:%M:%S"));
        Ok(Payload::new().with("ranAt", now.to_rfc3339()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let signal = EnvironmentSignal::new(cli.network.into(), cli.charging, cli.battery);

    match cli.command {
        Commands::OneTime { input } => {
            run_one_time(signal, input).await?;
        }
        Commands::Periodic {
            interval,
            min_period,
        } => {
            run_periodic(signal, interval, min_period).await?;
        }
    }

    Ok(())
}

/// Submit one-time work and follow it to completion.
async fn run_one_time(
    signal: EnvironmentSignal,
    input: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = WorkerRegistry::new().register(Arc::new(OneTimeWorker));
    let queue = WorkQueue::new(registry).with_initial_signal(signal);
    let (handle, queue_task) = queue.start().await;

    let request = WorkRequest::one_time("one-time")
        .payload(Payload::new().with("inputKey", input))
        .constraints(Constraints::none().with_network(NetworkType::Connected))
        .build()?;
    let id = handle.submit(request).await?;
    info!("Submitted one-time work: {}", id);

    let mut stream = handle.subscribe(id).await?;

    loop {
        tokio::select! {
            state = stream.next() => {
                match state {
                    Some(state) => info!("Work {} is {}", id, state),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Cancelling...");
                handle.cancel(id).await?;
            }
        }
    }

    if let Some(info) = handle.info(id).await? {
        if let Some(output) = info.output {
            info!(
                "Output: {}",
                output.get("outputKey").unwrap_or("<missing>")
            );
        }
        if let Some(error) = info.error {
            warn!("Error: {}", error);
        }
    }

    handle.shutdown().await?;
    let _ = queue_task.await;
    Ok(())
}

/// Run unique periodic work until interrupted.
async fn run_periodic(
    signal: EnvironmentSignal,
    interval: u64,
    min_period: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = WorkerRegistry::new().register(Arc::new(ClockWorker));
    let queue = WorkQueue::new(registry)
        .with_initial_signal(signal)
        .with_min_period(Duration::from_secs(min_period));
    let (handle, queue_task) = queue.start().await;

    let request = WorkRequest::periodic("clock", Duration::from_secs(interval))
        .constraints(Constraints::none().with_charging(true))
        .unique("Periodic Work Request", ExistingWorkPolicy::Keep)
        .build()?;
    let id = handle.submit(request).await?;
    info!(
        "Submitted periodic work {} (interval: {}s), press Ctrl+C to stop",
        id, interval
    );

    let mut stream = handle.subscribe(id).await?;

    loop {
        tokio::select! {
            state = stream.next() => {
                match state {
                    Some(state) => info!("Work {} is {}", id, state),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("\nShutting down...");
                handle.cancel(id).await?;
            }
        }
    }

    handle.shutdown().await?;
    let _ = queue_task.await;
    info!("Goodbye!");
    Ok(())
}
