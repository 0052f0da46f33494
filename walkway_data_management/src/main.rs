use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkway_client::{ClientConfig, WalkwayClient};
use walkway_data_management::{DataConfig, DataManager};
use walkway_lib::{
    distance::{haversine_distance, DistanceConfig, NoiseGate},
    geo_point::GeoPoint,
    walk_session::WalkSession,
};

#[derive(Parser)]
#[command(name = "walkway")]
#[command(about = "Record walks along walkways and submit them as walkway histories", long_about = None)]
struct Cli {
    /// Directory holding the database and the buffers of active walks
    #[arg(long, env = "WALKWAY_DATA_DIR", default_value = walkway_data_management::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Noise gate combining the per-axis deltas: either (OR) or both (AND)
    #[arg(long, env = "WALKWAY_GATE", default_value_t = NoiseGate::EitherAxis)]
    gate: NoiseGate,

    /// Base URL of the walkway REST backend
    #[arg(long, env = "WALKWAY_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "WALKWAY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Also write logs to this file
    #[arg(long, env = "WALKWAY_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a GPX file as a walk along a walkway
    Replay {
        walkway_id: i64,
        gpx_file: PathBuf,
        /// Submit the walk as a walkway history right away
        #[arg(long)]
        upload: bool,
    },
    /// List recorded walks
    List,
    /// List finished walks that have not been submitted
    Pending,
    /// Submit every pending walk as a walkway history
    Sync,
    /// Distance of a single step between two fixes
    #[command(allow_negative_numbers = true)]
    Distance {
        lat1: f64,
        lng1: f64,
        lat2: f64,
        lng2: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_file.as_ref())?;

    let distance = DistanceConfig::with_gate(cli.gate);

    match &cli.command {
        Commands::Replay { walkway_id, gpx_file, upload } => {
            let data_manager = data_manager(&cli, distance).await?;
            let session = data_manager.replay_gpx(*walkway_id, gpx_file).await?;
            print_session(&session);
            if *upload {
                let client = client(&cli)?;
                let history = data_manager.submit_history(session.session_id, &client).await?;
                println!("history {} (review: {})", history.walkway_history_id, history.can_review);
            }
        }
        Commands::List => {
            for session in data_manager(&cli, distance).await?.get_sessions().await? {
                print_session(&session);
            }
        }
        Commands::Pending => {
            for session in data_manager(&cli, distance).await?.pending_histories().await? {
                print_session(&session);
            }
        }
        Commands::Sync => {
            let client = client(&cli)?;
            let report = data_manager(&cli, distance).await?.sync_histories(&client).await?;
            for (session_id, history) in &report.submitted {
                println!("{}\tsubmitted as history {}", session_id, history.walkway_history_id);
            }
            for (session_id, reason) in &report.failed {
                println!("{}\tfailed: {}", session_id, reason);
            }
            if !report.failed.is_empty() {
                bail!("{} walks could not be submitted", report.failed.len());
            }
        }
        // Needs neither the data directory nor the backend
        Commands::Distance { lat1, lng1, lat2, lng2 } => {
            let (from, to) = (GeoPoint::new(*lat1, *lng1), GeoPoint::new(*lat2, *lng2));
            println!("step:      {} m", distance.incremental_distance(&[from, to]));
            println!("haversine: {:.2} m", haversine_distance(&from, &to));
        }
    }

    Ok(())
}

async fn data_manager(cli: &Cli, distance: DistanceConfig) -> anyhow::Result<DataManager> {
    let config = DataConfig {
        distance,
        ..DataConfig::new(cli.data_dir.clone())
    };
    Ok(DataManager::start(config).await?)
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {path:?}"))?;
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info,walkway_data_management=info,walkway_client=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn client(cli: &Cli) -> anyhow::Result<WalkwayClient> {
    let Some(api_url) = &cli.api_url else {
        bail!("--api-url (or WALKWAY_API_URL) is required to reach the walkway backend");
    };

    let mut config = ClientConfig::new(api_url.as_str());
    if let Some(token) = &cli.token {
        config = config.with_access_token(token.as_str());
    }

    Ok(WalkwayClient::new(config)?)
}

fn print_session(session: &WalkSession) {
    let state = if session.active {
        "A".to_string()
    } else {
        match &session.history {
            Some(history) => format!("H{}", history.walkway_history_id),
            None => ".".to_string(),
        }
    };

    println!(
        "{}\t{}\twalkway {}\t{}\t{} m\t{} s\t{} fixes",
        session.session_id,
        state,
        session.walkway_id,
        session.start_time.format("%Y-%m-%d %H:%M UTC"),
        session.distance,
        session.elapsed().num_seconds(),
        session.track_points.len()
    );
}
