//! Plain-text output of the offline commands

use std::fmt::Write;

use chrono::{DateTime, Utc};

use common::models::ArtifactRecord;
use common::types::Sentiment;
use common::utils::format_bytes;
use storage_adapter::CachedArtifact;

/// One line of `cache list`
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub artifact: CachedArtifact,

    /// Sidecar record, missing for directories dropped in by hand
    pub record: Option<ArtifactRecord>,
}

const CACHE_HEADERS: [&str; 5] = ["MODEL ID", "NAME", "VERSION", "SIZE", "CREATED"];

/// Renders the cache listing as an aligned table
pub fn format_cache_table(rows: &[CacheRow]) -> String {
    if rows.is_empty() {
        return "No cached models\n".to_string();
    }

    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|row| {
            let (name, version, created) = match &row.record {
                Some(record) => (
                    record.model_name.clone(),
                    record.model_version.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                    timestamp(&record.model_creation),
                ),
                None => ("-".to_string(), "-".to_string(), timestamp(&row.artifact.modified_at)),
            };

            [
                row.artifact.model_id.to_string(),
                name,
                version,
                format_bytes(row.artifact.size_bytes),
                created,
            ]
        })
        .collect();

    let mut widths = CACHE_HEADERS.map(str::len);
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &CACHE_HEADERS.map(str::to_string), &widths);
    for line in &cells {
        push_line(&mut out, line, &widths);
    }
    out
}

/// Renders one `LABEL<TAB>text` line per prediction
pub fn format_predictions(texts: &[String], sentiments: &[Sentiment]) -> String {
    texts
        .iter()
        .zip(sentiments)
        .fold(String::new(), |mut out, (text, sentiment)| {
            let _ = writeln!(out, "{}\t{}", sentiment, text);
            out
        })
}

fn push_line(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::models::{ArtifactMetadata, ModelId, ModelReference};
    use std::path::PathBuf;

    fn artifact(id: &str, size_bytes: u64) -> CachedArtifact {
        CachedArtifact {
            model_id: ModelId::new(id).unwrap(),
            path: PathBuf::from("/models").join(id),
            size_bytes,
            modified_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_cache() {
        assert_eq!(format_cache_table(&[]), "No cached models\n");
    }

    #[test]
    fn test_cache_table() {
        let reference = ModelReference::version("basic_model", 1);
        let metadata = ArtifactMetadata {
            name: "basic_model".to_string(),
            version: Some(1),
            created_at: Utc.with_ymd_and_hms(2025, 2, 14, 12, 30, 0).unwrap(),
            flavors: Vec::new(),
            artifact_uri: "mlflow-artifacts:/0/models/m-1/artifacts".to_string(),
            tags: Default::default(),
        };
        let record = ArtifactRecord::new(
            ModelId::new("m-1").unwrap(),
            &reference,
            metadata,
            PathBuf::from("/models/m-1"),
        );

        let table = format_cache_table(&[
            CacheRow {
                artifact: artifact("m-1", 2048),
                record: Some(record),
            },
            CacheRow {
                artifact: artifact("manual", 10),
                record: None,
            },
        ]);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("MODEL ID"));
        assert!(lines[1].starts_with("m-1"));
        assert!(lines[1].contains("basic_model"));
        assert!(lines[1].contains("2.0 KiB"));
        assert!(lines[1].ends_with("2025-02-14 12:30:00"));
        assert!(lines[2].starts_with("manual"));
        assert!(lines[2].ends_with("2025-03-01 08:00:00"));
    }

    #[test]
    fn test_predictions() {
        let texts = vec!["I love it".to_string(), "awful".to_string()];
        let out = format_predictions(&texts, &[Sentiment::Positive, Sentiment::Negative]);
        assert_eq!(out, "POSITIVE\tI love it\nNEGATIVE\tawful\n");
    }
}
