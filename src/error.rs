use thiserror::Error;

use crate::store::ZoneStoreError;

#[derive(Error, Debug)]
pub enum TimeTheZoneError {
    #[error("Config file parsing error: {0}")]
    ConfigFileParsingError(#[from] toml::de::Error),
    #[error("Tokio error: {0}")]
    TokioError(#[from] tokio::io::Error),
    #[error("Zone store error: {0}")]
    ZoneStoreError(#[from] ZoneStoreError),
    #[error("Couldn't read seed CSV file: {0}")]
    ReadSeedCsvError(tokio::io::Error),
}
