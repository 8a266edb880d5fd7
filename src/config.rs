use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::TimeTheZoneError;

/// The structure of a valid TimeTheZone configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Path of the timezone table file
    pub zone_store_path: String,
    /// Listening port
    pub port: u16,
    /// CSV file to seed an empty table from instead of the builtin records
    pub seed_csv_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            zone_store_path: "timezones.toml".to_string(),
            port: 3000,
            seed_csv_path: None,
        }
    }
}

pub async fn parse_config<P>(path: P) -> Result<Config, TimeTheZoneError>
where
    P: AsRef<std::path::Path>,
{
    if let Ok(config_file) = tokio::fs::read_to_string(&path).await {
        Ok(toml::from_str(&config_file).map_err(TimeTheZoneError::ConfigFileParsingError)?)
    } else {
        warn!("unable to read config file, using default config");
        Ok(Config::default())
    }
}

pub struct Args {
    pub config_path: String,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} /path/to/config/file", args[0]);
        std::process::exit(1);
    }
    Args {
        config_path: args[1].clone(),
    }
}
