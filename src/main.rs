use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tugtrack::config::{self, TugConfig};
use tugtrack::logging;
use tugtrack::pipeline::{PhaseUpdate, Pipeline, StopHandle};
use tugtrack::source::PoseSource;

#[derive(Parser)]
#[command(name = "tugtrack", version = "0.1.0")]
#[command(about = "Timed Up and Go timer driven by pose keypoints")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON Lines pose stream through one TUG session
    Run {
        /// Pose stream (stdin when omitted)
        #[arg(short, long)] input:         Option<PathBuf>,
        /// Report CSV path
        #[arg(short, long)] output:        Option<String>,
        /// Also write a JSON report next to the CSV
        #[arg(long)]        json:          bool,
        #[arg(long)]        walk_distance: Option<f64>,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let mut cfg = config::load_config().unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        config::default_config()
    });

    match cli.command {
        Command::Run { input, output, json, walk_distance } => {
            if let Some(p) = input         { cfg.source.path = Some(p.display().to_string()); }
            if let Some(o) = output        { cfg.export.output_path = o; }
            if json                        { cfg.export.write_json = true; }
            if let Some(d) = walk_distance { cfg.tug.walk_distance_m = d; }
            cfg.validate()?;
            print_startup_info(&cfg);
            run(cfg).await?;
        }

        Command::Config => {
            cfg.validate()?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

async fn run(cfg: TugConfig) -> Result<()> {
    let source = PoseSource::open(cfg.source.path.as_deref().map(std::path::Path::new))?;
    let poses = source.spawn(cfg.source.channel_capacity);

    let (stop, stop_rx) = StopHandle::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping session");
            stop.stop();
        }
    });

    let (update_tx, update_rx) = flume::bounded::<PhaseUpdate>(64);
    let display = tokio::spawn(async move {
        while let Ok(update) = update_rx.recv_async().await {
            match update {
                PhaseUpdate::Prompt { text, .. } => println!(">> {}", text),
                PhaseUpdate::Speed { mps }       => println!("   speed {:.2} m/s", mps),
                PhaseUpdate::Done { .. }         => {}
            }
        }
    });

    let output_path = cfg.export.output_path.clone();
    let report = Pipeline::new(cfg).with_updates(update_tx).run(poses, stop_rx).await?;
    let _ = display.await;

    match report {
        Some(report) => {
            println!();
            println!("{}", report.summary());
            println!("Report: {}", output_path);
        }
        None => println!("Session ended before completion, no report written."),
    }
    Ok(())
}

fn print_startup_info(cfg: &TugConfig) {
    println!("╔══════════════════════════════════════════════╗");
    println!("║  TUGTRACK: Timed Up and Go                   ║");
    println!("╚══════════════════════════════════════════════╝");
    println!(
        "  Input:    {}",
        cfg.source.path.as_deref().unwrap_or("stdin")
    );
    println!("  Output:   {}", cfg.export.output_path);
    println!(
        "  Walk:     {:.2} m   Turn: {:.0}°   Hip sep: {:.2} m",
        cfg.tug.walk_distance_m, cfg.tug.turn_angle_deg, cfg.tug.hip_separation_m
    );
    println!();
}
