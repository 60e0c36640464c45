use clap::Parser;
use sim_lidar_samples::{
    Args,
    scanner::{ScanConfig, Scanner},
    settings::Settings,
    shutdown::Shutdown,
    sim::{SimClient as _, ZenohSim},
};
use std::{error::Error, path::PathBuf, time::Duration};
use tracing::info;

/// Polls the simulator's lidars and writes world-frame point clouds to
/// `<run_start>_<lidar>_pointcloud.asc`, one file per lidar.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: Args,

    /// Vehicle carrying the lidars.
    #[arg(long, default_value = "Drone1")]
    vehicle: String,

    /// Lidar to scan, may be repeated. Defaults to the lidars listed for the
    /// vehicle in --settings, or LidarSensor1.
    #[arg(long = "lidar")]
    lidars: Vec<String>,

    /// Simulator settings.json used to discover the vehicle's lidars.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory the .asc files are written to.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Superimpose new scans onto existing files instead of truncating them.
    #[arg(long)]
    append: bool,

    /// Time in seconds to run command before exiting.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Time in milliseconds to wait for each simulator reply.
    #[arg(long, default_value = "2000")]
    query_timeout_ms: u64,
}

impl Cli {
    fn lidars(&self) -> Result<Vec<String>, Box<dyn Error>> {
        if !self.lidars.is_empty() {
            return Ok(self.lidars.clone());
        }
        match &self.settings {
            Some(path) => Ok(Settings::load(path)?.lidar_names(&self.vehicle)?),
            None => Ok(vec!["LidarSensor1".to_owned()]),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    sim_lidar_samples::init_tracing();
    let cli = Cli::parse();

    let session = sim_lidar_samples::open_session(&cli.common).await?;
    let sim = ZenohSim::new(session, Duration::from_millis(cli.query_timeout_ms));
    sim.confirm_connection().await?;
    println!("Connected!");

    let mut config = ScanConfig::new(cli.vehicle.clone(), cli.lidars()?);
    config.output_dir = cli.output_dir.clone();
    config.append = cli.append;
    config.timeout = cli.timeout.map(Duration::from_secs);
    info!("scanning {:?} on {}", config.lidars, config.vehicle);

    let scanner = Scanner::new(config);
    #[cfg(feature = "rerun")]
    let (scanner, _serve_guard) = {
        let (rr, serve_guard) = cli.common.rerun.init("lidar-pointcloud")?;
        (scanner.with_rerun(rr), serve_guard)
    };

    let shutdown = Shutdown::on_ctrl_c()?;
    println!("Scanning has started");
    println!("Use Ctrl-C to stop scanning");

    let summary = scanner.run(&sim, &shutdown).await?;
    for (lidar, points) in &summary.points {
        info!("{lidar}: {points} points");
    }
    println!("Done!");

    Ok(())
}
