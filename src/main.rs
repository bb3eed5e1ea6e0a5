use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use attendance_engine::{
    build_manual_flow, build_monitor,
    clock::{Clock, SystemClock},
    config::EngineConfig,
    init_logging,
    manual::ManualFlow,
    schedule::resolve,
    Collaborators,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, env = "ATTENDANCE_CONFIG", default_value = "attendance.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the timetable and capture automatically until interrupted.
    Run,
    /// Print the course in progress right now, if any.
    Resolve,
    /// Operator-driven capture for one course, commands read from stdin.
    Manual {
        #[arg(long)]
        course: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = EngineConfig::load(Some(&cli.config))?;
    let collaborators = Collaborators::from_config(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Run => run(&config, &collaborators, clock).await,
        Command::Resolve => {
            let entries = collaborators.timetable.list_schedule_entries().await?;
            match resolve(clock.now_local(), &entries) {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                None => println!("no course in progress"),
            }
            Ok(())
        }
        Command::Manual { course } => manual(&config, &collaborators, clock, course).await,
    }
}

async fn run(config: &EngineConfig, collaborators: &Collaborators, clock: Arc<dyn Clock>) -> Result<()> {
    let monitor = build_monitor(config, collaborators, clock);
    let cancel_token = CancellationToken::new();

    tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
            }
            cancel_token.cancel();
        }
    });

    info!("attendance monitor running; press ctrl-c to stop");
    monitor.run(cancel_token).await;

    if let Some(summary) = monitor.last_summary().await {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

const MANUAL_HELP: &str = "commands: c(apture) r(etake) y(confirm) v(iew) q(uit)";

async fn manual(
    config: &EngineConfig,
    collaborators: &Collaborators,
    clock: Arc<dyn Clock>,
    course_id: i64,
) -> Result<()> {
    let entry = collaborators
        .timetable
        .list_schedule_entries()
        .await?
        .into_iter()
        .find(|entry| entry.course_id == course_id)
        .ok_or_else(|| anyhow!("course {course_id} is not in the timetable"))?;

    let flow = build_manual_flow(config, collaborators, clock);
    flow.start(entry).await.context("failed to start session")?;
    println!("{MANUAL_HELP}");

    let result = operator_loop(&flow).await;
    if let Some(summary) = flow.stop().await {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    result
}

async fn operator_loop(flow: &ManualFlow) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "c" | "capture" => match flow.capture().await {
                Ok(view) => println!("{}", serde_json::to_string(&view)?),
                Err(err) => println!("capture failed: {err}; press c to retry"),
            },
            "r" | "retake" => println!("{}", serde_json::to_string(&flow.retake().await)?),
            "y" | "confirm" => match flow.confirm().await {
                Ok(result) => println!("{}", serde_json::to_string(&result)?),
                Err(err) => println!("{err}"),
            },
            "v" | "view" => println!("{}", serde_json::to_string(&flow.view().await)?),
            "q" | "quit" => break,
            "" => {}
            _ => println!("{MANUAL_HELP}"),
        }
    }
    Ok(())
}
