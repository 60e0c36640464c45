use crate::{
    error::{Error, Result},
    quaternion::Quaternion,
    shutdown::Shutdown,
    sim::SimClient,
    transform::{self, WorldPoint},
    writer::{AscWriter, pointcloud_filename},
};
use std::{
    collections::{BTreeMap, btree_map::Entry},
    path::PathBuf,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub vehicle: String,
    pub lidars: Vec<String>,
    pub output_dir: PathBuf,
    /// Superimpose onto existing files instead of truncating them.
    pub append: bool,
    /// Unix seconds used to name this run's files.
    pub run_start: u64,
    /// Stop after this long even without an interrupt.
    pub timeout: Option<Duration>,
}

impl ScanConfig {
    pub fn new(vehicle: impl Into<String>, lidars: Vec<String>) -> Self {
        ScanConfig {
            vehicle: vehicle.into(),
            lidars,
            output_dir: PathBuf::from("."),
            append: false,
            run_start: unix_seconds(),
            timeout: None,
        }
    }

    pub fn output_path(&self, lidar: &str) -> PathBuf {
        self.output_dir
            .join(pointcloud_filename(self.run_start, lidar))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSummary {
    /// Scans processed, summed over all lidars.
    pub scans: u64,
    /// Points written per lidar.
    pub points: BTreeMap<String, u64>,
}

/// Polls every lidar in turn, transforms each scan into the world frame
/// and appends it to that lidar's file until cancelled.
pub struct Scanner {
    config: ScanConfig,
    writers: BTreeMap<String, AscWriter>,
    scans: u64,
    #[cfg(feature = "rerun")]
    rr: Option<rerun::RecordingStream>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Scanner {
            config,
            writers: BTreeMap::new(),
            scans: 0,
            #[cfg(feature = "rerun")]
            rr: None,
        }
    }

    /// Also log every transformed scan to Rerun under `lidar/<name>`.
    #[cfg(feature = "rerun")]
    pub fn with_rerun(mut self, rr: rerun::RecordingStream) -> Self {
        self.rr = Some(rr);
        self
    }

    /// Runs until `shutdown` is cancelled, the timeout expires or the
    /// simulator fails. Output files are flushed and closed in every case;
    /// a simulator error is returned after that.
    pub async fn run<S: SimClient>(mut self, sim: &S, shutdown: &Shutdown) -> Result<ScanSummary> {
        let outcome = self.poll(sim, shutdown).await;
        let closed = self.close();
        settle(outcome, closed)
    }

    async fn poll<S: SimClient>(&mut self, sim: &S, shutdown: &Shutdown) -> Result<()> {
        let start = Instant::now();
        let lidars = self.config.lidars.clone();
        if lidars.is_empty() {
            warn!("no lidars to scan");
            return Ok(());
        }

        loop {
            for lidar in &lidars {
                if shutdown.is_cancelled() {
                    info!("scan interrupted");
                    return Ok(());
                }
                if let Some(timeout) = self.config.timeout {
                    if start.elapsed() >= timeout {
                        info!("scan timeout reached");
                        return Ok(());
                    }
                }
                self.scan_once(sim, lidar).await?;
            }
        }
    }

    /// Fetches, transforms and writes a single scan of `lidar`. Returns the
    /// number of points written.
    pub async fn scan_once<S: SimClient>(&mut self, sim: &S, lidar: &str) -> Result<usize> {
        let vehicle = self.config.vehicle.as_str();
        let data = sim.get_lidar_data(lidar, vehicle).await?;
        let state = sim.get_vehicle_state(vehicle).await?;

        if data.point_cloud.len() % 3 != 0 {
            return Err(Error::MalformedScan {
                sensor: lidar.to_owned(),
                len: data.point_cloud.len(),
            });
        }

        let vehicle_orientation: Quaternion = state.kinematics.orientation.into();
        let points: Vec<WorldPoint> = transform::transform_points(
            transform::triples(&data.point_cloud),
            data.pose.into(),
            vehicle_orientation,
            unix_millis(),
        )
        .collect();

        let writer = match self.writers.entry(lidar.to_owned()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let path = self.config.output_path(lidar);
                info!("writing {lidar} points to {}", path.display());
                e.insert(AscWriter::create(path, self.config.append)?)
            }
        };
        let n = writer.write_scan(points.iter().copied())?;
        self.scans += 1;
        debug!("{lidar}: {n} points (sim time {} ns)", data.time_stamp);

        #[cfg(feature = "rerun")]
        if let Some(rr) = &self.rr {
            use rerun::{Color, Points3D, Position3D};
            let [r, g, b] = transform::POINT_COLOR;
            let rr_points = Points3D::new(
                points
                    .iter()
                    .map(|p| Position3D::new(p.x as f32, p.y as f32, p.z as f32)),
            )
            .with_colors([Color::from_rgb(r, g, b)]);
            if let Err(e) = rr.log(format!("lidar/{lidar}"), &rr_points) {
                warn!("failed to log {lidar} points: {e:?}");
            }
        }

        Ok(n)
    }

    /// Flushes and closes every output file.
    fn close(&mut self) -> Result<ScanSummary> {
        let mut summary = ScanSummary {
            scans: self.scans,
            points: BTreeMap::new(),
        };
        for (lidar, writer) in std::mem::take(&mut self.writers) {
            let path = writer.path().to_path_buf();
            let points = writer.finish()?;
            debug!("closed {} ({points} points)", path.display());
            summary.points.insert(lidar, points);
        }
        Ok(summary)
    }
}

/// The error that stopped the loop wins over one raised while closing.
fn settle(outcome: Result<()>, closed: Result<ScanSummary>) -> Result<ScanSummary> {
    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            warn!("failed to close output files: {close_err}");
            Err(e)
        }
        (Err(e), Ok(_)) => Err(e),
        (Ok(()), closed) => closed,
    }
}

pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> Error {
        Error::Io(std::io::Error::other("disk full"))
    }

    #[test]
    fn loop_error_wins_over_close_error() {
        let stop = Error::MalformedScan {
            sensor: "LidarSensor1".to_owned(),
            len: 4,
        };
        let result = settle(Err(stop), Err(io_error()));
        assert!(matches!(result, Err(Error::MalformedScan { len: 4, .. })));
    }

    #[test]
    fn close_error_reported_after_clean_stop() {
        assert!(matches!(settle(Ok(()), Err(io_error())), Err(Error::Io(_))));
    }

    #[test]
    fn loop_error_reported_after_clean_close() {
        let result = settle(
            Err(Error::NoReply("sim/Drone1/state".to_owned())),
            Ok(ScanSummary::default()),
        );
        assert!(matches!(result, Err(Error::NoReply(_))));
    }

    #[test]
    fn summary_returned_when_both_succeed() {
        let summary = ScanSummary {
            scans: 2,
            points: BTreeMap::from([("LidarSensor1".to_owned(), 6)]),
        };
        assert_eq!(settle(Ok(()), Ok(summary.clone())).unwrap(), summary);
    }
}
