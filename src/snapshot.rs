//! Snapshot and compare report CSV files.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CalError, CalResult};
use crate::registers::RegisterEntry;

/// Outcome of comparing one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Match,
    Mismatch,
    Error,
    Skipped,
}

/// One row of the compare report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRow {
    pub key: String,
    pub cmd_read: String,
    pub expected: String,
    pub actual: String,
    pub status: Status,
    /// `actual - expected`, blank when either side is not a number.
    pub delta: String,
    pub notes: String,
}

/// Loads a calibration snapshot. Keys must be unique.
pub fn read_snapshot(path: &Path) -> CalResult<Vec<RegisterEntry>> {
    let csv_err = |source| CalError::Csv { path: path.to_path_buf(), source };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    for row in reader.deserialize::<RegisterEntry>() {
        let entry = row.map_err(csv_err)?;
        if !seen.insert(entry.key.clone()) {
            return Err(CalError::Malformed {
                path: path.to_path_buf(),
                reason: format!("duplicate key '{}'", entry.key),
            });
        }
        entries.push(entry);
    }
    Ok(entries)
}

pub fn write_snapshot(path: &Path, entries: &[RegisterEntry]) -> CalResult<()> {
    write_rows(path, entries)
}

pub fn write_report(path: &Path, rows: &[CompareRow]) -> CalResult<()> {
    write_rows(path, rows)
}

fn write_rows<R: Serialize>(path: &Path, rows: &[R]) -> CalResult<()> {
    let csv_err = |source| CalError::Csv { path: path.to_path_buf(), source };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| CalError::file(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::RegisterTable;

    #[test]
    fn snapshot_header_and_optional_write_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.csv");

        let table = RegisterTable::sr7xx();
        let mut entries: Vec<RegisterEntry> = table.iter().take(3).cloned().collect();
        entries[0].value = "StanfordResearchSystems,SR720,s/n00001,ver1.0".into();
        entries[1].value = "-12.5".into();
        write_snapshot(&path, &entries).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("key,cmd_read,cmd_write,scope,value,notes\n"));
        assert!(text.contains("IDN,*IDN?,,global,"));

        let back = read_snapshot(&path).unwrap();
        assert_eq!(back[0].cmd_write, None);
        assert_eq!(back[1].cmd_write.as_deref(), Some("$FRQ"));
        assert_eq!(back[0].value, entries[0].value);
        assert_eq!(back[2].value, "");
    }

    #[test]
    fn hand_edited_snapshot_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.csv");
        std::fs::write(
            &path,
            "key,cmd_read,cmd_write,scope,value,notes\n ZOFS , ZOFS? , ZOFS <v> ,cal, 0.00123 ,\n",
        )
        .unwrap();

        let rows = read_snapshot(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "ZOFS");
        assert_eq!(rows[0].write_command("0.5").unwrap(), "ZOFS 0.5");
        assert_eq!(rows[0].value, "0.00123");
    }

    #[test]
    fn missing_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.csv");
        std::fs::write(&path, "key,cmd_read\nFRQ,$FRQ?\n").unwrap();
        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(err, CalError::Csv { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.csv");
        std::fs::write(
            &path,
            "key,cmd_read,cmd_write,scope,value,notes\nFRQ,$FRQ?,$FRQ,global,1,\nFRQ,$FRQ?,$FRQ,global,2,\n",
        )
        .unwrap();
        assert!(matches!(read_snapshot(&path), Err(CalError::Malformed { .. })));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_snapshot(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn report_status_is_lowercase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let row = CompareRow {
            key: "ZOFS".into(),
            cmd_read: "ZOFS?".into(),
            expected: "0.00123".into(),
            actual: "0.00123".into(),
            status: Status::Match,
            delta: "0.0".into(),
            notes: String::new(),
        };
        write_report(&path, &[row]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "key,cmd_read,expected,actual,status,delta,notes\nZOFS,ZOFS?,0.00123,0.00123,match,0.0,\n"
        );
    }
}
