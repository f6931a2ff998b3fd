//! Snapshot store
//!
//! Writes each fetched snapshot to a timestamped file under a fixed base
//! directory and reads the vehicle rows back for loading. Files are never
//! modified or removed here; retention belongs to whoever owns the directory.
//!
//! File names have one-second resolution (`gps_brt_2024-05-01_13-45-07.json`).
//! Two runs within the same second write the same name and the later one
//! overwrites the earlier file.

use brt_common::types::extract_vehicles;
use brt_common::{Snapshot, VehicleRecord};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::SnapshotConfig;
use crate::error::{IngestError, IngestResult};

pub mod structured;
pub mod tabular;

/// Prefix shared by every snapshot file name
pub const FILE_PREFIX: &str = "gps_brt_";

/// `chrono` pattern of the timestamp part of a file name
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// On-disk encoding of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// Whole response as pretty JSON
    #[default]
    Json,
    /// Vehicle rows only, one CSV line per vehicle
    Csv,
}

impl SnapshotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Csv => "csv",
        }
    }

    /// Format implied by a file extension, if any
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for SnapshotFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "csv" => Ok(SnapshotFormat::Csv),
            _ => Err(anyhow::anyhow!("Invalid snapshot format: {}", s)),
        }
    }
}

impl std::fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
    format: SnapshotFormat,
}

impl SnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>, format: SnapshotFormat) -> Self {
        Self {
            base_dir: base_dir.into(),
            format,
        }
    }

    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self::new(config.dir.clone(), config.format)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Deterministic file name for a capture time
    pub fn name_for(&self, timestamp: NaiveDateTime) -> String {
        format!(
            "{}{}.{}",
            FILE_PREFIX,
            timestamp.format(TIMESTAMP_FORMAT),
            self.format.extension()
        )
    }

    /// Write `snapshot` to `<base_dir>/<name>` and return the path.
    ///
    /// The base directory must already exist; it is never created here.
    pub fn persist(&self, name: &str, snapshot: &Snapshot) -> IngestResult<PathBuf> {
        if !self.base_dir.is_dir() {
            return Err(IngestError::DirectoryMissing(self.base_dir.clone()));
        }

        let path = self.base_dir.join(name);
        let bytes = match self.format {
            SnapshotFormat::Json => {
                structured::encode(snapshot).map_err(|e| IngestError::write(&path, e))?
            },
            SnapshotFormat::Csv => {
                let rows: Vec<&VehicleRecord> = snapshot.vehicles().collect();
                tabular::encode(&rows).map_err(|e| IngestError::write(&path, e))?
            },
        };

        std::fs::write(&path, &bytes).map_err(|e| IngestError::write(&path, e))?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            vehicles = snapshot.vehicle_count(),
            "Snapshot persisted"
        );
        Ok(path)
    }

    /// Read a snapshot file back into vehicle records.
    ///
    /// The encoding follows the file extension, falling back to the store
    /// format. A file without a usable `vehicles` container yields an empty
    /// list and a warning, not an error.
    pub fn reload(&self, path: &Path) -> IngestResult<Vec<VehicleRecord>> {
        let bytes = std::fs::read(path).map_err(|e| IngestError::read(path, e))?;
        let format = SnapshotFormat::from_path(path).unwrap_or(self.format);
        debug!(path = %path.display(), %format, "Reloading snapshot");

        let records = match format {
            SnapshotFormat::Json => {
                let value = structured::decode(&bytes).map_err(|e| IngestError::read(path, e))?;
                match extract_vehicles(value) {
                    Some(records) => records,
                    None => {
                        warn!(path = %path.display(), "Snapshot has no vehicles container");
                        Vec::new()
                    },
                }
            },
            SnapshotFormat::Csv => {
                let records = tabular::decode(&bytes).map_err(|e| IngestError::read(path, e))?;
                if records.is_empty() {
                    warn!(path = %path.display(), "Snapshot has no vehicle rows");
                }
                records
            },
        };

        info!(path = %path.display(), vehicles = records.len(), "Snapshot reloaded");
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn feed() -> Snapshot {
        Snapshot::try_from(json!({
            "vehicles": [
                {"codigo": "BRT-01", "placa": "LSN4I49", "linha": "42A", "latitude": -22.98, "longitude": -43.36, "velocidade": 0, "sentido": "Alvorada → Galeão"},
                {"codigo": "BRT-02", "linha": "11", "latitude": null, "ignicao": 1}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_name_for_is_deterministic() {
        let store = SnapshotStore::new("/data", SnapshotFormat::Json);
        assert_eq!(store.name_for(at(13, 45, 7)), "gps_brt_2024-05-01_13-45-07.json");
        assert_eq!(store.name_for(at(13, 45, 7)), store.name_for(at(13, 45, 7)));

        let csv = SnapshotStore::new("/data", SnapshotFormat::Csv);
        assert!(csv.name_for(at(0, 0, 0)).ends_with(".csv"));
    }

    #[test]
    fn test_same_second_names_collide() {
        let store = SnapshotStore::new("/data", SnapshotFormat::Json);
        let early = at(9, 0, 1);
        let late = early + chrono::Duration::milliseconds(900);
        assert_eq!(store.name_for(early), store.name_for(late));
    }

    #[test]
    fn test_persist_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created");
        let store = SnapshotStore::new(&missing, SnapshotFormat::Json);

        let err = store.persist("x.json", &feed()).unwrap_err();
        assert!(matches!(err, IngestError::DirectoryMissing(ref p) if *p == missing));
        assert!(!missing.exists());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), SnapshotFormat::Json);
        let snapshot = feed();

        let path = store.persist(&store.name_for(at(1, 2, 3)), &snapshot).unwrap();
        assert_eq!(path, dir.path().join("gps_brt_2024-05-01_01-02-03.json"));
        assert!(std::fs::read(&path).unwrap().is_ascii());

        let reloaded = store.reload(&path).unwrap();
        assert_eq!(Some(reloaded), snapshot.into_vehicles());
    }

    #[test]
    fn test_csv_round_trip_modulo_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), SnapshotFormat::Csv);
        let snapshot = feed();
        let original = snapshot.clone().into_vehicles().unwrap();

        let path = store.persist(&store.name_for(at(1, 2, 3)), &snapshot).unwrap();
        let reloaded = store.reload(&path).unwrap();

        assert_eq!(reloaded.len(), original.len());
        for (before, after) in original.iter().zip(&reloaded) {
            for (key, value) in before {
                assert_eq!(&after[key], value);
            }
            for (key, value) in after {
                if !before.contains_key(key) {
                    assert_eq!(value, &Value::Null);
                }
            }
        }
    }

    #[test]
    fn test_csv_keeps_fieldless_vehicles() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), SnapshotFormat::Csv);
        let snapshot = Snapshot::try_from(json!({"vehicles": [{}, {}]})).unwrap();

        let path = store.persist("gps_brt_blank.csv", &snapshot).unwrap();

        assert_eq!(store.reload(&path).unwrap(), snapshot.into_vehicles().unwrap());
    }

    #[test]
    fn test_reload_without_vehicles_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), SnapshotFormat::Json);
        let snapshot = Snapshot::from_slice(br#"{"status": "maintenance"}"#).unwrap();

        let path = store.persist("gps_brt_empty.json", &snapshot).unwrap();
        assert!(store.reload(&path).unwrap().is_empty());

        std::fs::write(dir.path().join("odd.json"), r#"{"vehicles": "none"}"#).unwrap();
        assert!(store.reload(&dir.path().join("odd.json")).unwrap().is_empty());
    }

    #[test]
    fn test_reload_follows_file_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_store = SnapshotStore::new(dir.path(), SnapshotFormat::Csv);
        let path = csv_store.persist("gps_brt_x.csv", &feed()).unwrap();

        let json_store = SnapshotStore::new(dir.path(), SnapshotFormat::Json);
        assert_eq!(json_store.reload(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_reload_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), SnapshotFormat::Json);

        let err = store.reload(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, IngestError::Read { .. }));

        std::fs::write(dir.path().join("broken.json"), "{\"vehicles\": [").unwrap();
        let err = store.reload(&dir.path().join("broken.json")).unwrap_err();
        assert!(matches!(err, IngestError::Read { .. }));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Csv);
        assert!("parquet".parse::<SnapshotFormat>().is_err());
        assert_eq!(
            SnapshotFormat::from_path(Path::new("/d/gps_brt_x.json")),
            Some(SnapshotFormat::Json)
        );
        assert_eq!(SnapshotFormat::from_path(Path::new("/d/gps_brt_x")), None);
    }
}
