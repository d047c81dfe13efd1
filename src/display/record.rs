//! Backup record display formatting
//!
//! Formats catalog records for terminal output in table, JSON and detail
//! views.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::BackupResult;
use crate::models::BackupRecord;

/// One table row per cataloged backup
#[derive(Tabled)]
pub struct RecordRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Database")]
    pub database: String,
    #[tabled(rename = "Created")]
    pub created: String,
    #[tabled(rename = "Size (MB)")]
    pub size: u64,
    #[tabled(rename = "Path")]
    pub path: String,
}

impl From<&BackupRecord> for RecordRow {
    fn from(record: &BackupRecord) -> Self {
        let created = record
            .created_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S %:z").to_string())
            .unwrap_or_else(|| record.time.clone());

        Self {
            name: record.name.clone(),
            database: record.database.clone(),
            created,
            size: record.size,
            path: record.path.clone(),
        }
    }
}

/// Format a list of records as a table
pub fn format_record_list(records: &[BackupRecord]) -> String {
    if records.is_empty() {
        return "No backups found.".to_string();
    }

    let mut table = Table::new(records.iter().map(RecordRow::from));
    table.with(Style::sharp());
    table.to_string()
}

/// Format a list of records as a pretty JSON array
pub fn format_record_json(records: &[BackupRecord]) -> BackupResult<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Format a single record in detail
pub fn format_record_details(record: &BackupRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!("Backup:   {}\n", record.name));
    output.push_str(&format!("Database: {}\n", record.database));
    output.push_str(&format!("Created:  {}\n", record.time));
    output.push_str(&format!("Artifact: {}\n", record.path));
    output.push_str(&format!("Size:     {} MB\n", record.size));

    output
}

/// The summary line printed after a query
pub fn format_record_count(count: usize) -> String {
    format!("You have {} backups", count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BackupRecord {
        BackupRecord {
            name: "orders-1700000000".into(),
            time: "2023-11-14T22:13:20Z".into(),
            database: "orders".into(),
            path: "/tmp/orders-1700000000.aes".into(),
            size: 12,
        }
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(format_record_list(&[]), "No backups found.");
    }

    #[test]
    fn test_table_contents() {
        let table = format_record_list(&[sample()]);
        assert!(table.contains("Size (MB)"));
        assert!(table.contains("orders-1700000000"));
        assert!(table.contains("2023-11-14 22:13:20 +00:00"));
        assert!(table.contains("/tmp/orders-1700000000.aes"));
    }

    #[test]
    fn test_unparseable_time_shown_verbatim() {
        let mut record = sample();
        record.time = "yesterday".into();
        assert_eq!(RecordRow::from(&record).created, "yesterday");
    }

    #[test]
    fn test_json_uses_catalog_field_names() {
        let json = format_record_json(&[sample()]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["name"], "orders-1700000000");
        assert_eq!(parsed[0]["size"], 12);
    }

    #[test]
    fn test_details_and_count() {
        let details = format_record_details(&sample());
        assert!(details.contains("Size:     12 MB"));
        assert_eq!(format_record_count(0), "You have 0 backups");
    }
}
