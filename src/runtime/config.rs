use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::genome::Organism;
use crate::pipeline::ToolEnv;
use crate::utils::expand_and_resolve_path;

pub const DEFAULT_DATASETS_DIR: &str = "~/Datasets";
pub const DEFAULT_SCRIPTS_DIR: &str = "scripts";
pub const DEFAULT_WINDOW: u64 = 5000;
pub const DEFAULT_COACC_THRESH: f64 = 0.1;
pub const DEFAULT_TOP_N_GENES: usize = 10;
pub const DEFAULT_GTF: &str = "~/Datasets/gencode.v49.basic.annotation.gtf";
pub const DEFAULT_CELLTYPIST_MODEL: &str = "Healthy_COVID19_PBMC";

/// Settings for one full pipeline run. Everything has a default so that a
/// config file only needs to name what differs on a given machine
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub datasets_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub gtf: PathBuf,
    pub celltypist_model: String,
    pub top_n_genes_per_class: usize,
    pub window: u64,
    pub coacc_thresh: f64,
    pub organism: Organism,
    pub scopen_ranks: Vec<u32>,
    pub max_parallel_clustering: usize,

    /// Conda environment per tool family; None runs the tool from $PATH
    pub python_env: Option<String>,
    pub r_env: Option<String>,
    pub scopen_env: Option<String>,
    pub bedtools_env: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            datasets_dir: PathBuf::from(DEFAULT_DATASETS_DIR),
            scripts_dir: PathBuf::from(DEFAULT_SCRIPTS_DIR),
            gtf: PathBuf::from(DEFAULT_GTF),
            celltypist_model: DEFAULT_CELLTYPIST_MODEL.to_string(),
            top_n_genes_per_class: DEFAULT_TOP_N_GENES,
            window: DEFAULT_WINDOW,
            coacc_thresh: DEFAULT_COACC_THRESH,
            organism: Organism::Human,
            scopen_ranks: vec![30],
            max_parallel_clustering: crate::pipeline::DEFAULT_MAX_CONCURRENT,
            python_env: None,
            r_env: None,
            scopen_env: None,
            bedtools_env: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<PipelineConfig> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open pipeline config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse pipeline config {}", path.display()))?;
        Ok(config)
    }

    pub fn python(&self) -> ToolEnv {
        ToolEnv::from_name(&self.python_env)
    }

    pub fn r(&self) -> ToolEnv {
        ToolEnv::from_name(&self.r_env)
    }

    pub fn scopen(&self) -> ToolEnv {
        ToolEnv::from_name(&self.scopen_env)
    }

    pub fn bedtools(&self) -> ToolEnv {
        ToolEnv::from_name(&self.bedtools_env)
    }

    pub fn script(&self, name: &str) -> anyhow::Result<PathBuf> {
        Ok(expand_and_resolve_path(&self.scripts_dir)?.join(name))
    }
}

/// Directory convention for one dataset: inputs under `input/`, each stage
/// writing under its own `output/<stage>/`
#[derive(Clone, Debug)]
pub struct DatasetLayout {
    pub base: PathBuf,
}

impl DatasetLayout {
    pub fn new(datasets_dir: &Path, data_name: &str) -> anyhow::Result<DatasetLayout> {
        if data_name.is_empty() || data_name.contains('/') {
            return Err(crate::runtime::Error::usage(format!(
                "Dataset name '{}' must be a plain directory name",
                data_name
            ))
            .into());
        }
        let datasets_dir = expand_and_resolve_path(datasets_dir)?;
        Ok(DatasetLayout {
            base: datasets_dir.join(data_name),
        })
    }

    pub fn input_dir(&self) -> PathBuf {
        self.base.join("input")
    }

    pub fn output_dir(&self, stage: &str) -> PathBuf {
        self.base.join("output").join(stage)
    }

    /// Peak × cell matrix dumped by the region extractor
    pub fn regions_dir(&self) -> PathBuf {
        self.output_dir("regions")
    }

    pub fn celltypist_dir(&self) -> PathBuf {
        self.output_dir("celltypist")
    }

    pub fn core_genes(&self) -> PathBuf {
        self.celltypist_dir().join("celltypist_core_genes.txt")
    }

    pub fn core_regions_bed(&self, window: u64) -> PathBuf {
        self.celltypist_dir()
            .join(format!("core_genes_regions_{}bp.bed", window))
    }

    pub fn core_peaks_bed(&self, window: u64) -> PathBuf {
        self.celltypist_dir()
            .join(format!("core_genes_regions_{}bp_intersected_peaks.bed", window))
    }

    pub fn core_peaks_ids(&self, window: u64) -> PathBuf {
        self.celltypist_dir()
            .join(format!("core_genes_regions_{}bp_intersected_peaks.txt", window))
    }

    pub fn cicero_split_prefix(&self) -> PathBuf {
        self.output_dir("cicero").join("split").join("peaks")
    }

    /// Co-accessibility tables, one peaks_chr*.csv per chromosome
    pub fn cicero_tables_dir(&self) -> PathBuf {
        self.output_dir("cicero").join("filtered")
    }

    pub fn cicero_filter_dir(&self) -> PathBuf {
        self.output_dir("celltypist_cicero")
    }

    pub fn scopen_dir(&self) -> PathBuf {
        self.output_dir("scopen")
    }

    pub fn clustering_dir(&self) -> PathBuf {
        self.output_dir("clustering_scopen_cicero")
    }

    pub fn metrics_csv(&self) -> PathBuf {
        self.output_dir("metrics").join("metrics.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "window": 1000, "organism": "mouse", "r_env": "cicero" }"#)
                .unwrap();
        assert_eq!(config.window, 1000);
        assert_eq!(config.organism, Organism::Mouse);
        assert_eq!(config.coacc_thresh, DEFAULT_COACC_THRESH);
        assert_eq!(config.max_parallel_clustering, 16);
        assert!(matches!(config.r(), ToolEnv::Conda { .. }));
        assert!(matches!(config.python(), ToolEnv::Inherit));
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let res: Result<PipelineConfig, _> = serde_json::from_str(r#"{ "windw": 1000 }"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_layout() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "PBMC10k").unwrap();
        assert!(layout.input_dir().ends_with("PBMC10k/input"));
        assert!(layout.output_dir("cicero").ends_with("PBMC10k/output/cicero"));

        assert!(DatasetLayout::new(dir.path(), "").is_err());
        assert!(DatasetLayout::new(dir.path(), "a/b").is_err());
    }
}
