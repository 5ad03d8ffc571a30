use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::{info, warn};
use serde_json::{Map, Value};

use crate::runtime::Error;

pub const METRICS_FILE: &str = "metrics.json";

#[derive(Args)]
pub struct CollectMetricsCMD {
    /// Folder holding one sub-directory per clustered matrix
    #[arg(long = "base-dir", value_parser = clap::value_parser!(PathBuf))]
    pub base_dir: PathBuf,

    /// CSV to write; defaults to <base-dir>/metrics.csv
    #[arg(short = 'o', long = "output", value_parser = clap::value_parser!(PathBuf))]
    pub path_out: Option<PathBuf>,
}
impl CollectMetricsCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let path_out = self
            .path_out
            .clone()
            .unwrap_or_else(|| self.base_dir.join("metrics.csv"));
        let num_rows = CollectMetrics::run(&CollectMetrics {
            base_dir: self.base_dir.clone(),
            path_out,
        })?;
        info!("CollectMetrics has finished successfully: {} rows", num_rows);
        Ok(())
    }
}

/// One CSV row: column name and rendered value, in first-appearance order
type MetricsRow = Vec<(String, String)>;

/// Gathers the metrics.json of each clustered matrix into one table
pub struct CollectMetrics {
    pub base_dir: PathBuf,
    pub path_out: PathBuf,
}
impl CollectMetrics {
    /// Nested objects become `outer_inner` columns
    pub fn flatten(prefix: &str, obj: &Map<String, Value>, row: &mut MetricsRow) {
        for (key, value) in obj {
            let name = format!("{}{}", prefix, key);
            match value {
                Value::Object(inner) => Self::flatten(&format!("{}_", name), inner, row),
                Value::Null => row.push((name, String::new())),
                Value::String(s) => row.push((name, s.clone())),
                other => row.push((name, other.to_string())),
            }
        }
    }

    /// Python's json module writes NaN, Infinity and -Infinity as bare
    /// tokens. Turn those into null; string contents are left alone
    pub fn nonfinite_to_null(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_string = false;
        let mut escaped = false;
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
            } else if c == '"' {
                in_string = true;
            } else if let Some(token) = ["-Infinity", "Infinity", "NaN"]
                .into_iter()
                .find(|token| rest.starts_with(*token))
            {
                out.push_str("null");
                rest = &rest[token.len()..];
                continue;
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
        out
    }

    fn read_row(matrix_name: &str, path: &Path) -> anyhow::Result<MetricsRow> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let value: Value = serde_json::from_str(&Self::nonfinite_to_null(&text))
            .map_err(|e| Error::file_not_valid(path, Some(e.to_string())))?;
        let obj = match value {
            Value::Object(obj) => obj,
            _ => return Err(Error::file_not_valid(path, Some("expected a JSON object")).into()),
        };

        let mut row: MetricsRow = vec![("matrix_name".to_string(), matrix_name.to_string())];
        Self::flatten("", &obj, &mut row);
        Ok(row)
    }

    /// Rows sorted by matrix name
    pub fn collect_rows(base_dir: &Path) -> anyhow::Result<Vec<MetricsRow>> {
        if !base_dir.is_dir() {
            return Err(Error::file_not_found(base_dir).into());
        }

        let mut subdirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                subdirs.push((entry.file_name().to_string_lossy().to_string(), path));
            }
        }
        subdirs.sort();

        let mut rows = Vec::new();
        for (name, dir) in subdirs {
            let path_metrics = dir.join(METRICS_FILE);
            if path_metrics.is_file() {
                rows.push(Self::read_row(&name, &path_metrics)?);
            }
        }
        Ok(rows)
    }

    /// Run the algorithm. Returns the number of rows written
    pub fn run(params: &CollectMetrics) -> anyhow::Result<usize> {
        let rows = Self::collect_rows(&params.base_dir)?;
        if rows.is_empty() {
            warn!("No {} found in {}", METRICS_FILE, params.base_dir.display());
            return Ok(0);
        }

        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for (name, _) in row {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }

        if let Some(parent) = params.path_out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(&params.path_out)
            .with_context(|| format!("Failed to create {}", params.path_out.display()))?;
        writer.write_record(&columns)?;
        for row in &rows {
            let record = columns.iter().map(|col| {
                row.iter()
                    .find(|(name, _)| name == col)
                    .map(|(_, value)| value.as_str())
                    .unwrap_or("")
            });
            writer.write_record(record)?;
        }
        writer.flush()?;

        info!("Saved {} rows to {}", rows.len(), params.path_out.display());
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_metrics(base: &Path, name: &str, json: &str) {
        let dir = base.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(METRICS_FILE), json).unwrap();
    }

    #[test]
    fn test_flatten_and_merge_columns() {
        let dir = tempfile::tempdir().unwrap();
        write_metrics(
            dir.path(),
            "matrix_rank30",
            r#"{"ari": 0.5, "leiden": {"n_clusters": 12, "res": 1.0}, "note": null}"#,
        );
        write_metrics(dir.path(), "matrix_rank10", r#"{"ari": 0.25, "silhouette": "0.1"}"#);
        fs::create_dir_all(dir.path().join("matrix_empty")).unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();

        let path_out = dir.path().join("out").join("metrics.csv");
        let num_rows = CollectMetrics::run(&CollectMetrics {
            base_dir: dir.path().to_path_buf(),
            path_out: path_out.clone(),
        })
        .unwrap();
        assert_eq!(num_rows, 2);

        let csv = fs::read_to_string(&path_out).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "matrix_name,ari,silhouette,leiden_n_clusters,leiden_res,note");
        assert_eq!(lines[1], "matrix_rank10,0.25,0.1,,,");
        assert_eq!(lines[2], "matrix_rank30,0.5,,12,1.0,");
    }

    #[test]
    fn test_nan_and_infinity_become_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        write_metrics(
            dir.path(),
            "matrix_rank30",
            r#"{"ari": 0.5, "silhouette": NaN, "score": {"lo": -Infinity, "hi": Infinity}, "note": "NaN"}"#,
        );
        let path_out = dir.path().join("metrics.csv");
        CollectMetrics::run(&CollectMetrics {
            base_dir: dir.path().to_path_buf(),
            path_out: path_out.clone(),
        })
        .unwrap();

        let csv = fs::read_to_string(&path_out).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "matrix_name,ari,silhouette,score_lo,score_hi,note");
        assert_eq!(lines[1], "matrix_rank30,0.5,,,,NaN");
    }

    #[test]
    fn test_nonfinite_to_null_skips_strings() {
        assert_eq!(
            CollectMetrics::nonfinite_to_null(r#"{"a": NaN, "b": "x\"NaN", "c": [Infinity]}"#),
            r#"{"a": null, "b": "x\"NaN", "c": [null]}"#
        );
    }

    #[test]
    fn test_no_metrics_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("matrix_a")).unwrap();
        let path_out = dir.path().join("metrics.csv");
        let num_rows = CollectMetrics::run(&CollectMetrics {
            base_dir: dir.path().to_path_buf(),
            path_out: path_out.clone(),
        })
        .unwrap();
        assert_eq!(num_rows, 0);
        assert!(!path_out.exists());
    }

    #[test]
    fn test_not_an_object() {
        let dir = tempfile::tempdir().unwrap();
        write_metrics(dir.path(), "matrix_a", "[1, 2]");
        let err = CollectMetrics::collect_rows(dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::FileNotValid { .. })));
    }

    #[test]
    fn test_missing_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = CollectMetrics::collect_rows(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::FileNotFound { .. })));
    }
}
