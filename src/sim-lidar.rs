use clap::Parser;
use sim_lidar_samples::{
    Args,
    quaternion::Quaternion,
    settings::{DEFAULT_SETTINGS, SensorSettings, Settings},
    sim::{self, LidarData, VehicleState},
    transform::Pose,
};
use std::{error::Error, path::PathBuf, time::Instant};
use tracing::{debug, info, warn};

/// Stand-in simulator. Answers lidar and vehicle-state queries for the
/// vehicles in a settings.json, with every lidar seeing a wall at its
/// configured range.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: Args,

    /// Simulator settings.json. Defaults to Drone1 with two lidars.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Vehicle yaw rate in degrees per second.
    #[arg(long, default_value = "10.0")]
    yaw_rate: f64,
}

enum Request<'a> {
    Ping,
    State { vehicle: &'a str },
    Lidar { vehicle: &'a str, lidar: &'a str },
}

fn parse_request(key: &str) -> Option<Request<'_>> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        ["sim", "ping"] => Some(Request::Ping),
        ["sim", vehicle, "state"] => Some(Request::State { vehicle: *vehicle }),
        ["sim", vehicle, "lidar", lidar] => Some(Request::Lidar {
            vehicle: *vehicle,
            lidar: *lidar,
        }),
        _ => None,
    }
}

/// One revolution of returns in the sensor frame, `x` forward and `z` down.
fn synthesize_scan(sensor: &SensorSettings) -> Vec<f32> {
    let channels = sensor.number_of_channels.max(1) as usize;
    let per_channel = sensor.points_per_scan() / channels;
    let (h_start, h_span) = sensor.horizontal_fov();
    let upper = sensor.vertical_fov_upper.to_radians();
    let lower = sensor.vertical_fov_lower.to_radians();

    let mut points = Vec::with_capacity(per_channel * channels * 3);
    for c in 0..channels {
        let elevation = if channels == 1 {
            upper
        } else {
            lower + (upper - lower) * c as f64 / (channels - 1) as f64
        };
        for i in 0..per_channel {
            let azimuth = h_start + h_span * i as f64 / per_channel as f64;
            let flat = sensor.range * elevation.cos();
            points.push((flat * azimuth.cos()) as f32);
            points.push((flat * azimuth.sin()) as f32);
            points.push((-sensor.range * elevation.sin()) as f32);
        }
    }
    points
}

struct World {
    settings: Settings,
    start: Instant,
    yaw_rate: f64,
}

impl World {
    fn clock_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn vehicle_pose(&self) -> Pose {
        let yaw = self.yaw_rate.to_radians() * self.start.elapsed().as_secs_f64();
        Pose::new([0.0, 0.0, 0.0], Quaternion::from_yaw(yaw))
    }

    fn reply(&self, request: &Request) -> Result<Vec<u8>, String> {
        let encoded = match *request {
            Request::Ping => sim::encode(&self.clock_ns()),
            Request::State { vehicle } => {
                self.settings.vehicle(vehicle).map_err(|e| e.to_string())?;
                sim::encode(&VehicleState {
                    time_stamp: self.clock_ns(),
                    kinematics: self.vehicle_pose().into(),
                })
            }
            Request::Lidar { vehicle, lidar } => {
                let sensor = self
                    .settings
                    .vehicle(vehicle)
                    .map_err(|e| e.to_string())?
                    .lidars()
                    .find(|(name, _)| name.as_str() == lidar)
                    .map(|(_, s)| s)
                    .ok_or_else(|| format!("lidar {lidar} not found on {vehicle}"))?;
                sim::encode(&LidarData {
                    time_stamp: self.clock_ns(),
                    point_cloud: synthesize_scan(sensor),
                    pose: self.vehicle_pose().compose(sensor.mount()).into(),
                })
            }
        };
        encoded.map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    sim_lidar_samples::init_tracing();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::from_json(DEFAULT_SETTINGS)?,
    };
    for (name, vehicle) in &settings.vehicles {
        let lidars: Vec<_> = vehicle.lidars().map(|(n, _)| n.as_str()).collect();
        info!("vehicle {name} with lidars {lidars:?}");
    }
    let world = World {
        settings,
        start: Instant::now(),
        yaw_rate: cli.yaw_rate,
    };

    let session = sim_lidar_samples::open_session(&cli.common).await?;
    let queryable = session
        .declare_queryable("sim/**")
        .await
        .map_err(sim_lidar_samples::Error::zenoh)?;
    info!("simulator ready");

    while let Ok(query) = queryable.recv_async().await {
        let key = query.key_expr().as_str().to_owned();
        let result = match parse_request(&key) {
            Some(request) => world.reply(&request),
            None => Err(format!("unknown request {key}")),
        };

        match result {
            Ok(payload) => {
                debug!("{key}: {} bytes", payload.len());
                if let Err(e) = query.reply(query.key_expr().clone(), payload).await {
                    warn!("failed to reply to {key}: {e:?}");
                }
            }
            Err(message) => {
                warn!("{message}");
                if let Err(e) = query.reply_err(message).await {
                    warn!("failed to reply to {key}: {e:?}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zenoh_errors_reach_main() {
        let err: Box<dyn Error + Send + Sync> = "no route to router".into();
        let main_err: Box<dyn Error> = sim_lidar_samples::Error::zenoh(err).into();
        assert_eq!(main_err.to_string(), "zenoh error: no route to router");
    }

    #[test]
    fn parses_keys() {
        assert!(matches!(parse_request("sim/ping"), Some(Request::Ping)));
        assert!(matches!(
            parse_request("sim/Drone1/state"),
            Some(Request::State { vehicle: "Drone1" })
        ));
        assert!(matches!(
            parse_request("sim/Drone1/lidar/LidarSensor2"),
            Some(Request::Lidar {
                vehicle: "Drone1",
                lidar: "LidarSensor2"
            })
        ));
        assert!(parse_request("sim/Drone1").is_none());
        assert!(parse_request("rt/lidar/points").is_none());
    }

    #[test]
    fn scan_points_lie_at_range() {
        let settings = Settings::from_json(DEFAULT_SETTINGS).unwrap();
        let sensor = &settings.vehicle("Drone1").unwrap().sensors["LidarSensor1"];
        let scan = synthesize_scan(sensor);
        assert_eq!(scan.len(), 800 * 3);
        for p in scan.chunks_exact(3) {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - 12.0).abs() < 1e-3);
        }
    }

    #[test]
    fn multi_channel_spans_vertical_fov() {
        let sensor = SensorSettings {
            number_of_channels: 4,
            points_per_second: 400.0,
            rotations_per_second: 1.0,
            vertical_fov_upper: 10.0,
            vertical_fov_lower: -20.0,
            range: 5.0,
            ..Default::default()
        };
        let scan = synthesize_scan(&sensor);
        assert_eq!(scan.len(), 400 * 3);
        let zs: Vec<f32> = scan.chunks_exact(3).map(|p| p[2]).collect();
        let top = -(5.0 * 10f64.to_radians().sin()) as f32;
        let bottom = -(5.0 * (-20f64).to_radians().sin()) as f32;
        assert!((zs[0] - bottom).abs() < 1e-4);
        assert!((zs[zs.len() - 1] - top).abs() < 1e-4);
    }

    #[test]
    fn lidar_reply_uses_mounted_pose() {
        let world = World {
            settings: Settings::from_json(DEFAULT_SETTINGS).unwrap(),
            start: Instant::now(),
            yaw_rate: 0.0,
        };
        let bytes = world
            .reply(&Request::Lidar {
                vehicle: "Drone1",
                lidar: "LidarSensor1",
            })
            .unwrap();
        let data: LidarData = cdr::deserialize(&bytes).unwrap();
        assert_eq!(data.pose.position.z_val, -1.0);
        assert_eq!(data.point_cloud.len() % 3, 0);

        assert!(
            world
                .reply(&Request::Lidar {
                    vehicle: "Drone1",
                    lidar: "Missing"
                })
                .is_err()
        );
        assert!(world.reply(&Request::State { vehicle: "Car1" }).is_err());
    }
}
