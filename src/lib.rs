use clap::Parser;
use serde_json::json;
use zenoh::config::{Config, WhatAmI};

pub mod error;
pub mod quaternion;
pub mod scanner;
pub mod settings;
pub mod shutdown;
pub mod sim;
pub mod transform;
pub mod writer;

pub use error::{Error, Result};

#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// Rerun parameters
    #[cfg(feature = "rerun")]
    #[command(flatten)]
    pub rerun: rerun::clap::RerunArgs,

    /// zenoh connection mode
    #[arg(long, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(short, long)]
    remote: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(short, long)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long)]
    no_multicast_scouting: bool,

    /// interface used for zenoh multicast scouting
    #[arg(long, default_value = "lo")]
    multicast_interface: String,
}

impl TryFrom<&Args> for Config {
    type Error = Error;

    fn try_from(args: &Args) -> Result<Self> {
        let mut config = Config::default();

        config
            .insert_json5("mode", &json!(args.mode).to_string())
            .map_err(Error::zenoh)?;

        if !args.remote.is_empty() {
            config
                .insert_json5("connect/endpoints", &json!(args.remote).to_string())
                .map_err(Error::zenoh)?;
        }

        if !args.listen.is_empty() {
            config
                .insert_json5("listen/endpoints", &json!(args.listen).to_string())
                .map_err(Error::zenoh)?;
        }

        if args.no_multicast_scouting {
            config
                .insert_json5("scouting/multicast/enabled", &json!(false).to_string())
                .map_err(Error::zenoh)?;
        }

        config
            .insert_json5(
                "scouting/multicast/interface",
                &json!(args.multicast_interface).to_string(),
            )
            .map_err(Error::zenoh)?;

        Ok(config)
    }
}

/// Opens a zenoh session from the shared command line options.
pub async fn open_session(args: &Args) -> Result<zenoh::Session> {
    let config = Config::try_from(args)?;
    zenoh::open(config).await.map_err(Error::zenoh)
}

/// Installs the `tracing` subscriber used by the sample binaries. The level
/// comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_build_zenoh_config() {
        let args = Args::parse_from([
            "test",
            "--mode",
            "client",
            "-r",
            "tcp/127.0.0.1:7447",
            "--no-multicast-scouting",
        ]);
        assert_eq!(args.remote, vec!["tcp/127.0.0.1:7447"]);
        assert!(Config::try_from(&args).is_ok());
    }
}
