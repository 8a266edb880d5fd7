use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    fs::{self, File, try_exists},
    io::AsyncWriteExt,
};

#[derive(Debug, Error)]
pub enum ZoneStoreError {
    #[error("A timezone for city \"{0}\" already exists")]
    DuplicateCity(String),
    #[error("Field \"{0}\" must not be empty")]
    MissingField(&'static str),
    #[error("Couldn't open directory at path: {0}")]
    OpenDirError(tokio::io::Error),
    #[error("Couldn't read zone table file: {0}")]
    ReadTableError(tokio::io::Error),
    #[error("Couldn't write zone table file: {0}")]
    WriteTableError(tokio::io::Error),
    #[error("Couldn't parse zone table file: {0}")]
    ParseTableError(toml::de::Error),
}

/// Durable home for timezone records. The whole table lives in a single
/// TOML file at `path`, rewritten atomically on every insert.
pub struct ZoneStore {
    pub path: PathBuf,
    pub table: ZoneTable,
}

#[derive(Deserialize, Serialize, Clone, PartialEq, Debug)]
pub struct ZoneTable {
    /// Monotonic id counter, persisted so ids are never reused
    pub next_id: u32,
    pub records: Vec<TimezoneRecord>,
}

impl Default for ZoneTable {
    fn default() -> Self {
        ZoneTable {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq, Debug)]
pub struct TimezoneRecord {
    pub id: u32,
    pub city: String,
    /// IANA timezone name (e.g. "Europe/Rome"), display-only
    pub timezone: String,
    /// Static offset from UTC, in hours (may be fractional)
    pub offset: f64,
    pub created_at: DateTime<Utc>,
}

/// Builtin seed used when no CSV is configured.
const BUILTIN_SEED: [(&str, &str, f64); 2] = [
    ("Roma", "Europe/Rome", 1.0),
    ("New York", "America/New_York", -5.0),
];

impl ZoneStore {
    // Returns whether a table file exists at the given path (though doesn't
    // check if it's valid)
    pub async fn exists<P>(path: P) -> Result<bool, ZoneStoreError>
    where
        P: AsRef<Path>,
    {
        try_exists(path).await.map_err(ZoneStoreError::ReadTableError)
    }

    // Loads an existing ZoneStore from the given table file. Errors if no
    // file exists, or if it's malformed.
    pub async fn load<P>(path: P) -> Result<Self, ZoneStoreError>
    where
        P: AsRef<Path>,
    {
        let path: PathBuf = path.as_ref().to_path_buf();
        let file_contents = fs::read_to_string(&path)
            .await
            .map_err(ZoneStoreError::ReadTableError)?;
        let table = toml::from_str(&file_contents).map_err(ZoneStoreError::ParseTableError)?;
        Ok(ZoneStore { path, table })
    }

    // Creates a new ZoneStore at the given path, writing an empty table.
    pub async fn create<P>(path: P) -> Result<Self, ZoneStoreError>
    where
        P: AsRef<Path>,
    {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(ZoneStoreError::OpenDirError)?;
        }

        let mut store = ZoneStore {
            path: path.as_ref().to_owned(),
            table: ZoneTable::default(),
        };
        store.write_table().await?;
        Ok(store)
    }

    pub fn is_empty(&self) -> bool {
        self.table.records.is_empty()
    }

    // Case-insensitive exact match on city; first match in insertion order.
    pub fn find_by_city(&self, city: &str) -> Option<&TimezoneRecord> {
        let city = city.to_lowercase();
        self.table
            .records
            .iter()
            .find(|record| record.city.to_lowercase() == city)
    }

    // Every record, in insertion order.
    pub fn list(&self) -> &[TimezoneRecord] {
        &self.table.records
    }

    /// Inserts a new record with an auto-assigned id and the current
    /// timestamp, persisting the table. Uniqueness of `city` is enforced
    /// under case-sensitive comparison; empty required fields are rejected.
    /// Returns the stored record.
    pub async fn insert(
        &mut self,
        city: &str,
        timezone: &str,
        offset: f64,
    ) -> Result<TimezoneRecord, ZoneStoreError> {
        if city.is_empty() {
            return Err(ZoneStoreError::MissingField("city"));
        }
        if timezone.is_empty() {
            return Err(ZoneStoreError::MissingField("timezone"));
        }
        if self.table.records.iter().any(|record| record.city == city) {
            return Err(ZoneStoreError::DuplicateCity(city.to_string()));
        }

        let record = TimezoneRecord {
            id: self.table.next_id,
            city: city.to_string(),
            timezone: timezone.to_string(),
            offset,
            created_at: Utc::now(),
        };
        let record_index = self.table.records.len();
        self.table.records.push(record);
        self.table.next_id += 1;
        self.write_table().await?;
        Ok(self.table.records[record_index].clone())
    }

    /// One-time seed for an empty table: two wired-in records.
    pub async fn seed_builtin(&mut self) -> Result<usize, ZoneStoreError> {
        for (city, timezone, offset) in BUILTIN_SEED {
            self.insert(city, timezone, offset).await?;
        }
        Ok(BUILTIN_SEED.len())
    }

    /// One-time seed from CSV contents where each line after the header is
    /// `"<timezone_id>","<offset_seconds>"`. The city name is the last
    /// path segment of the timezone id with underscores replaced by spaces;
    /// the offset converts from seconds to hours. Malformed lines and
    /// duplicate cities are skipped individually without aborting the seed.
    /// Returns the number of records inserted.
    pub async fn seed_from_csv(&mut self, contents: &str) -> Result<usize, ZoneStoreError> {
        let mut inserted = 0;
        // first line is the header row
        for line in contents.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let Some((zone_id, offset_seconds)) = parse_seed_line(line) else {
                warn!("skipping malformed seed line {line:?}");
                continue;
            };
            let city = city_from_zone_id(&zone_id);
            match self.insert(&city, &zone_id, offset_seconds / 3600.0).await {
                Ok(_) => inserted += 1,
                Err(ZoneStoreError::DuplicateCity(city)) => {
                    warn!("skipping duplicate seed city {city:?}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(inserted)
    }

    async fn write_table(&mut self) -> Result<(), ZoneStoreError> {
        // the mutable reference isn't strictly needed, but it keeps two
        // writers from racing the rename
        let tmp_path = self.path.with_extension("toml.new");
        let mut table_tmp_file = File::create(&tmp_path)
            .await
            .map_err(ZoneStoreError::WriteTableError)?;

        let table_contents =
            toml::to_string_pretty(&self.table).expect("failed to serialize zone table");
        table_tmp_file
            .write_all(table_contents.as_bytes())
            .await
            .map_err(ZoneStoreError::WriteTableError)?;

        fs::rename(tmp_path, &self.path)
            .await
            .map_err(ZoneStoreError::WriteTableError)?;

        Ok(())
    }
}

// "Europe/Rome" -> "Rome", "America/New_York" -> "New York"
fn city_from_zone_id(zone_id: &str) -> String {
    let segment = zone_id.rsplit('/').next().unwrap_or(zone_id);
    segment.replace('_', " ")
}

// Parses a seed line like `"Europe/Rome","3600"`. The offset field may
// appear with or without quotes.
fn parse_seed_line(line: &str) -> Option<(String, f64)> {
    let rest = line.trim().strip_prefix('"')?;
    let (zone_id, rest) = rest.split_once('"')?;
    let offset_field = rest.strip_prefix(',')?.trim().trim_matches('"');
    let offset_seconds: f64 = offset_field.parse().ok()?;
    if zone_id.is_empty() {
        return None;
    }
    Some((zone_id.to_string(), offset_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{Builder, TempDir};

    fn make_temp_dir() -> TempDir {
        Builder::new().prefix("zone_store_test").tempdir().unwrap()
    }

    fn table_path(dir: &TempDir) -> PathBuf {
        dir.path().join("timezones.toml")
    }

    #[tokio::test]
    async fn test_create_and_load_empty_table() {
        let dir = make_temp_dir();
        let path = table_path(&dir);
        assert!(!ZoneStore::exists(&path).await.unwrap());
        let created_store = ZoneStore::create(&path).await.unwrap();
        assert!(created_store.is_empty());
        assert!(ZoneStore::exists(&path).await.unwrap());
        let loaded_store = ZoneStore::load(&path).await.unwrap();
        assert_eq!(loaded_store.table.records.len(), 0);
        assert_eq!(loaded_store.table.next_id, 1);
    }

    #[tokio::test]
    async fn test_load_malformed_table_fails() {
        let dir = make_temp_dir();
        let path = table_path(&dir);
        tokio::fs::write(&path, "not a zone table").await.unwrap();
        assert!(matches!(
            ZoneStore::load(&path).await,
            Err(ZoneStoreError::ParseTableError(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_persists() {
        let dir = make_temp_dir();
        let mut store = ZoneStore::create(table_path(&dir)).await.unwrap();
        let roma = store.insert("Roma", "Europe/Rome", 1.0).await.unwrap();
        let new_york = store
            .insert("New York", "America/New_York", -5.0)
            .await
            .unwrap();
        assert_eq!(roma.id, 1);
        assert_eq!(new_york.id, 2);

        let reloaded = ZoneStore::load(table_path(&dir)).await.unwrap();
        assert_eq!(reloaded.table, store.table);
        assert_eq!(reloaded.table.next_id, 3);
    }

    #[tokio::test]
    async fn test_find_by_city_is_case_insensitive() {
        let dir = make_temp_dir();
        let mut store = ZoneStore::create(table_path(&dir)).await.unwrap();
        store.insert("Roma", "Europe/Rome", 1.0).await.unwrap();

        for query in ["Roma", "roma", "ROMA", "rOmA"] {
            let record = store.find_by_city(query).unwrap();
            assert_eq!(record.city, "Roma");
            assert_eq!(record.timezone, "Europe/Rome");
        }
        assert!(store.find_by_city("Atlantis").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_city_is_rejected_and_table_unchanged() {
        let dir = make_temp_dir();
        let mut store = ZoneStore::create(table_path(&dir)).await.unwrap();
        store.insert("Roma", "Europe/Rome", 1.0).await.unwrap();
        let table_before = store.table.clone();

        assert!(matches!(
            store.insert("Roma", "Europe/Berlin", 2.0).await,
            Err(ZoneStoreError::DuplicateCity(city)) if city == "Roma"
        ));
        assert_eq!(store.table, table_before);
        assert_eq!(
            ZoneStore::load(table_path(&dir)).await.unwrap().table,
            table_before
        );

        // uniqueness is case-sensitive, so a case variant is a new record
        store.insert("ROMA", "Europe/Rome", 1.0).await.unwrap();
        assert_eq!(store.list().len(), 2);
        // lookup still returns the first match in insertion order
        assert_eq!(store.find_by_city("roma").unwrap().city, "Roma");
    }

    #[tokio::test]
    async fn test_empty_required_fields_are_rejected() {
        let dir = make_temp_dir();
        let mut store = ZoneStore::create(table_path(&dir)).await.unwrap();
        assert!(matches!(
            store.insert("", "Europe/Rome", 1.0).await,
            Err(ZoneStoreError::MissingField("city"))
        ));
        assert!(matches!(
            store.insert("Roma", "", 1.0).await,
            Err(ZoneStoreError::MissingField("timezone"))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_insert_round_trip() {
        let dir = make_temp_dir();
        let mut store = ZoneStore::create(table_path(&dir)).await.unwrap();
        let created = store.insert("Paris", "Europe/Paris", 1.0).await.unwrap();

        let found = store.find_by_city("paris").unwrap();
        assert_eq!(found, &created);
        assert_eq!(found.timezone, "Europe/Paris");
        assert_eq!(found.offset, 1.0);
        assert_eq!(store.list(), std::slice::from_ref(&created));
    }

    #[tokio::test]
    async fn test_seed_builtin() {
        let dir = make_temp_dir();
        let mut store = ZoneStore::create(table_path(&dir)).await.unwrap();
        assert_eq!(store.seed_builtin().await.unwrap(), 2);

        let roma = store.find_by_city("roma").unwrap();
        assert_eq!(roma.timezone, "Europe/Rome");
        assert_eq!(roma.offset, 1.0);
        let new_york = store.find_by_city("new york").unwrap();
        assert_eq!(new_york.timezone, "America/New_York");
        assert_eq!(new_york.offset, -5.0);
    }

    #[tokio::test]
    async fn test_seed_from_csv() {
        let dir = make_temp_dir();
        let mut store = ZoneStore::create(table_path(&dir)).await.unwrap();
        let csv = concat!(
            "\"timezone\",\"offset\"\n",
            "\"Europe/Rome\",\"3600\"\n",
            "\"America/New_York\",\"-18000\"\n",
            "\"Asia/Kolkata\",\"19800\"\n",
            "\"Asia/Calcutta/New_York\",\"0\"\n",
            "not a csv line\n",
            "\n",
        );
        // the last well-formed line collides with America/New_York's city
        assert_eq!(store.seed_from_csv(csv).await.unwrap(), 3);

        let rome = store.find_by_city("Rome").unwrap();
        assert_eq!(rome.timezone, "Europe/Rome");
        assert_eq!(rome.offset, 1.0);

        let new_york = store.find_by_city("new york").unwrap();
        assert_eq!(new_york.timezone, "America/New_York");
        assert_eq!(new_york.offset, -5.0);

        // fractional hour offsets survive the seconds-to-hours conversion
        let kolkata = store.find_by_city("Kolkata").unwrap();
        assert_eq!(kolkata.offset, 5.5);
    }

    #[test]
    fn test_city_from_zone_id() {
        assert_eq!(city_from_zone_id("Europe/Rome"), "Rome");
        assert_eq!(city_from_zone_id("America/New_York"), "New York");
        assert_eq!(city_from_zone_id("America/Argentina/Buenos_Aires"), "Buenos Aires");
        assert_eq!(city_from_zone_id("UTC"), "UTC");
    }

    #[test]
    fn test_parse_seed_line() {
        assert_eq!(
            parse_seed_line("\"Europe/Rome\",\"3600\""),
            Some(("Europe/Rome".to_string(), 3600.0))
        );
        assert_eq!(
            parse_seed_line("\"America/New_York\",-18000"),
            Some(("America/New_York".to_string(), -18000.0))
        );
        assert_eq!(parse_seed_line("Europe/Rome,3600"), None);
        assert_eq!(parse_seed_line("\"Europe/Rome\",\"not a number\""), None);
        assert_eq!(parse_seed_line("\"\",\"3600\""), None);
    }
}
