//! Simulator `settings.json`: the vehicles and the sensors mounted on them.
//!
//! Only the fields the lidar samples need are modelled; everything else in
//! the file is ignored and nothing is validated beyond what deserialization
//! requires.

use crate::{
    error::{Error, Result},
    quaternion::Quaternion,
    transform::Pose,
};
use serde::Deserialize;
use std::{collections::BTreeMap, f64::consts::PI, path::Path};

/// `SensorType` value identifying a lidar.
pub const SENSOR_TYPE_LIDAR: u8 = 6;

/// Two downward-pitched lidars on `Drone1`.
pub const DEFAULT_SETTINGS: &str = include_str!("../config/settings.json");

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub sim_mode: String,
    #[serde(default)]
    pub vehicles: BTreeMap<String, VehicleSettings>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct VehicleSettings {
    #[serde(default)]
    pub vehicle_type: String,
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorSettings>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase", default)]
pub struct SensorSettings {
    pub sensor_type: u8,
    pub enabled: bool,
    pub number_of_channels: u32,
    pub rotations_per_second: f64,
    pub range: f64,
    pub points_per_second: f64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
    /// Degrees.
    pub roll: f64,
    /// Degrees.
    pub pitch: f64,
    /// Degrees.
    pub yaw: f64,
    #[serde(rename = "VerticalFOVUpper")]
    pub vertical_fov_upper: f64,
    #[serde(rename = "VerticalFOVLower")]
    pub vertical_fov_lower: f64,
    #[serde(rename = "HorizontalFOVStart")]
    pub horizontal_fov_start: f64,
    #[serde(rename = "HorizontalFOVEnd")]
    pub horizontal_fov_end: f64,
    pub data_frame: String,
}

impl Default for SensorSettings {
    fn default() -> Self {
        SensorSettings {
            sensor_type: 0,
            enabled: true,
            number_of_channels: 16,
            rotations_per_second: 10.0,
            range: 100.0,
            points_per_second: 100_000.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            vertical_fov_upper: 0.0,
            vertical_fov_lower: 0.0,
            horizontal_fov_start: 0.0,
            horizontal_fov_end: 0.0,
            data_frame: "SensorLocalFrame".to_owned(),
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn vehicle(&self, name: &str) -> Result<&VehicleSettings> {
        self.vehicles
            .get(name)
            .ok_or_else(|| Error::UnknownVehicle(name.to_owned()))
    }

    /// Names of the enabled lidars mounted on `vehicle`, in name order.
    pub fn lidar_names(&self, vehicle: &str) -> Result<Vec<String>> {
        Ok(self
            .vehicle(vehicle)?
            .lidars()
            .map(|(name, _)| name.clone())
            .collect())
    }
}

impl VehicleSettings {
    pub fn lidars(&self) -> impl Iterator<Item = (&String, &SensorSettings)> {
        self.sensors
            .iter()
            .filter(|(_, s)| s.sensor_type == SENSOR_TYPE_LIDAR && s.enabled)
    }
}

impl SensorSettings {
    /// Mount pose relative to the vehicle body.
    pub fn mount(&self) -> Pose {
        let orientation = Quaternion::from_euler(
            self.roll.to_radians(),
            self.pitch.to_radians(),
            self.yaw.to_radians(),
        );
        Pose::new([self.x, self.y, self.z], orientation)
    }

    /// Points returned for one full revolution.
    pub fn points_per_scan(&self) -> usize {
        if self.rotations_per_second <= 0.0 {
            return self.points_per_second.max(0.0) as usize;
        }
        (self.points_per_second / self.rotations_per_second).max(0.0) as usize
    }

    /// Horizontal field of view in radians as `(start, span)`. Equal start
    /// and end mean a full revolution.
    pub fn horizontal_fov(&self) -> (f64, f64) {
        let start = self.horizontal_fov_start.to_radians();
        let span = (self.horizontal_fov_end - self.horizontal_fov_start).to_radians();
        if span <= 0.0 { (start, 2.0 * PI) } else { (start, span) }
    }
}
