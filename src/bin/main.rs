use volley::*;

use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use volley::config::{Config, RunMode, DEFAULT_CONFIG_PATH};
use volley::dispatch::{DispatchMode, Engine};
use volley::shutdown::{Shutdown, StopReason};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target host:port, overrides baseURL from the config file
    url: Option<String>,

    /// Path to the JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dispatch policy
    #[arg(short, long, value_enum)]
    mode: Option<RunMode>,

    /// Total number of requests (quota mode)
    #[arg(short = 'n', long)]
    requests: Option<usize>,

    /// Fraction of requests that are POSTs
    #[arg(short, long)]
    post_ratio: Option<f64>,

    /// Number of concurrent workers (quota mode)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Duration of the test in seconds (interval mode)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Seed for the request mix
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the results file is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Skip the post-run server verification
    #[arg(long)]
    no_verify: bool,
}

impl Args {
    fn load_config(&self) -> Result<Config, error::ConfigError> {
        let (path, explicit) = match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        let mut config = Config::load_or_default(path, explicit)?;
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(n) = self.requests {
            config.total_requests = n;
        }
        if let Some(r) = self.post_ratio {
            config.post_ratio = r;
        }
        if let Some(w) = self.workers {
            config.worker_number = w;
        }
        if let Some(d) = self.duration {
            config.duration = d;
        }
        if let Some(t) = self.timeout {
            config.timeout = t;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

fn seconds_to_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Fire `shutdown` on Ctrl-C or when the operator types `q` + Enter.
fn watch_operator(shutdown: &Shutdown) {
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.fire(StopReason::Operator);
        }
    });

    // a plain thread so a pending read never holds up process exit
    let on_input = shutdown.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim(), "q" | "quit" | "stop") {
                on_input.fire(StopReason::Operator);
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let mode = DispatchMode::from_config(&config);

    let client = Arc::new(client::HttpMessageClient::new(config.timeout())?);
    let shutdown = Shutdown::new();
    let engine = Engine::new(
        client.clone(),
        config.endpoint(),
        workload::WorkloadGenerator::new(config.post_ratio, config.seed),
        shutdown.clone(),
    );

    println!("Starting test at: {}", Utc::now().to_rfc3339());
    println!("Configuration:");
    match mode {
        DispatchMode::Interval { duration, tick } => {
            println!("Duration: {}", seconds_to_hms(duration.as_secs()));
            println!("Request interval: {tick:?}");
        }
        DispatchMode::Quota {
            total,
            workers,
            pace,
            ..
        } => {
            println!("Total requests: {total}");
            println!("Workers: {workers}");
            println!("Per-worker interval: {pace:?}");
        }
    }
    println!("POST ratio: {:.2}", config.post_ratio);
    println!("Base URL: {}", config.endpoint());
    println!("Type 'q' and Enter (or press Ctrl-C) to stop early.");

    watch_operator(&shutdown);

    let pb = match mode {
        DispatchMode::Quota { total, .. } => {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(ProgressStyle::with_template(
                "{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} {msg}",
            )?);
            pb
        }
        DispatchMode::Interval { duration, .. } => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template("{spinner} {elapsed_precise}/{prefix} {msg}")?);
            pb.set_prefix(seconds_to_hms(duration.as_secs()));
            pb
        }
    };
    let progress = {
        let pb = pb.clone();
        let observer = engine.observer();
        let endpoint = engine.endpoint();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(200));
            loop {
                ticker.tick().await;
                let Some(snapshot) = observer.snapshot() else {
                    break;
                };
                pb.set_position(snapshot.total as u64);
                pb.set_message(format!(
                    "ok {} failed {} -> {}",
                    snapshot.successful,
                    snapshot.failed,
                    endpoint.load()
                ));
            }
        })
    };

    let report = engine.run(mode).await;
    progress.abort();
    pb.finish_and_clear();

    println!("{}", report::summary(&report));

    if !args.no_verify {
        if let Some(verification) =
            report::verify(client.as_ref(), &config.endpoint(), &report.stats).await
        {
            println!("{}", verification.render());
        }
    }

    match report::save_results(&report.stats, &args.output_dir) {
        Ok(path) => println!("Results saved to: {}", path.display()),
        Err(e) => tracing::error!("error saving results: {e}"),
    }

    // last handle on the pool; dropping it closes idle connections
    drop(client);
    Ok(())
}
