use crate::{
    error::{Error, Result},
    quaternion::Quaternion,
    transform,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{future::Future, time::Duration};
use tracing::{debug, info};
use zenoh::Session;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3r {
    pub x_val: f64,
    pub y_val: f64,
    pub z_val: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Quaternionr {
    pub w_val: f64,
    pub x_val: f64,
    pub y_val: f64,
    pub z_val: f64,
}

impl Default for Quaternionr {
    fn default() -> Self {
        Quaternion::IDENTITY.into()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vector3r,
    pub orientation: Quaternionr,
}

/// One lidar sweep as reported by the simulator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LidarData {
    /// Simulator clock in nanoseconds.
    pub time_stamp: u64,
    /// Flat `x, y, z` triples in the sensor frame.
    pub point_cloud: Vec<f32>,
    /// Sensor pose in the world frame.
    pub pose: Pose,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleState {
    pub time_stamp: u64,
    /// Estimated vehicle pose in the world frame.
    pub kinematics: Pose,
}

impl From<Quaternionr> for Quaternion {
    fn from(q: Quaternionr) -> Self {
        Quaternion::new(q.w_val, q.x_val, q.y_val, q.z_val)
    }
}

impl From<Quaternion> for Quaternionr {
    fn from(q: Quaternion) -> Self {
        Quaternionr {
            w_val: q.w,
            x_val: q.x,
            y_val: q.y,
            z_val: q.z,
        }
    }
}

impl From<Vector3r> for [f64; 3] {
    fn from(v: Vector3r) -> Self {
        [v.x_val, v.y_val, v.z_val]
    }
}

impl From<[f64; 3]> for Vector3r {
    fn from(v: [f64; 3]) -> Self {
        Vector3r {
            x_val: v[0],
            y_val: v[1],
            z_val: v[2],
        }
    }
}

impl From<Pose> for transform::Pose {
    fn from(p: Pose) -> Self {
        transform::Pose::new(p.position.into(), p.orientation.into())
    }
}

impl From<transform::Pose> for Pose {
    fn from(p: transform::Pose) -> Self {
        Pose {
            position: p.position.into(),
            orientation: p.orientation.into(),
        }
    }
}

pub fn ping_key() -> String {
    "sim/ping".to_owned()
}

pub fn lidar_key(vehicle: &str, lidar: &str) -> String {
    format!("sim/{vehicle}/lidar/{lidar}")
}

pub fn state_key(vehicle: &str) -> String {
    format!("sim/{vehicle}/state")
}

/// The simulator as seen by the scanner.
pub trait SimClient {
    /// Checks that the simulator answers, returning its clock in nanoseconds.
    fn confirm_connection(&self) -> impl Future<Output = Result<u64>>;

    fn get_lidar_data(
        &self,
        lidar: &str,
        vehicle: &str,
    ) -> impl Future<Output = Result<LidarData>>;

    fn get_vehicle_state(&self, vehicle: &str) -> impl Future<Output = Result<VehicleState>>;
}

/// Simulator session reached through zenoh queries. Every request is a
/// `get` on a key expression answered by the simulator's queryable with a
/// CDR encoded reply.
pub struct ZenohSim {
    session: Session,
    timeout: Duration,
}

impl ZenohSim {
    pub fn new(session: Session, timeout: Duration) -> Self {
        ZenohSim { session, timeout }
    }

    async fn query<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        debug!("query {key}");
        let replies = self
            .session
            .get(key)
            .timeout(self.timeout)
            .await
            .map_err(Error::zenoh)?;

        let Ok(reply) = replies.recv_async().await else {
            return Err(Error::NoReply(key.to_owned()));
        };

        match reply.result() {
            Ok(sample) => Ok(cdr::deserialize::<T>(&sample.payload().to_bytes())?),
            Err(err) => Err(Error::ReplyError {
                key: key.to_owned(),
                message: String::from_utf8_lossy(&err.payload().to_bytes()).into_owned(),
            }),
        }
    }
}

impl SimClient for ZenohSim {
    async fn confirm_connection(&self) -> Result<u64> {
        let clock: u64 = self.query(&ping_key()).await?;
        info!("connected to simulator (clock {clock} ns)");
        Ok(clock)
    }

    async fn get_lidar_data(&self, lidar: &str, vehicle: &str) -> Result<LidarData> {
        self.query(&lidar_key(vehicle, lidar)).await
    }

    async fn get_vehicle_state(&self, vehicle: &str) -> Result<VehicleState> {
        self.query(&state_key(vehicle)).await
    }
}

/// Encodes a reply payload the way the simulator's queryable sends it.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(cdr::serialize::<_, _, cdr::CdrLe>(value, cdr::Infinite)?)
}
