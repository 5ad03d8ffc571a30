use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::fileformat::{convert_peak_file, PeakFormat};
use crate::genome::Organism;
use crate::pipeline::{Builtin, ExternalCommand, Pipeline, Stage, ToolEnv};
use crate::runtime::{DatasetLayout, PipelineConfig};
use crate::utils::{check_bedtools, check_conda, check_rscript, expand_and_resolve_path};

use super::cicero_filter::CiceroFilter;
use super::cluster::{ClusterSubdatasets, DEFAULT_SUBDATASET_PREFIX};
use super::collect_metrics::CollectMetrics;
use super::core_regions::CoreRegions;
use super::determine_job_count;
use super::split_chrom::SplitChrom;

#[derive(Args)]
pub struct RunPipelineCMD {
    /// Dataset name, e.g. PBMC10k
    #[arg(long = "data-name")]
    pub data_name: String,

    /// JSON file with pipeline settings
    #[arg(long = "config", value_parser = clap::value_parser!(PathBuf))]
    pub path_config: Option<PathBuf>,

    /// Directory holding one folder per dataset
    #[arg(long = "datasets-dir", value_parser = clap::value_parser!(PathBuf))]
    pub datasets_dir: Option<PathBuf>,

    /// Directory with the helper Python and R scripts
    #[arg(long = "scripts-dir", value_parser = clap::value_parser!(PathBuf))]
    pub scripts_dir: Option<PathBuf>,

    /// TSS window in bp
    #[arg(long = "window")]
    pub window: Option<u64>,

    /// Co-accessibility threshold
    #[arg(long = "coacc-thresh")]
    pub coacc_thresh: Option<f64>,

    /// human or mouse
    #[arg(long = "organism")]
    pub organism: Option<String>,

    //Job settings for the clustering fan-out
    #[arg(short = '@', value_parser = clap::value_parser!(usize))]
    pub max_jobs: Option<usize>,

    /// Print the stages and exit without running anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}
impl RunPipelineCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let mut config = match &self.path_config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        //Command line wins over the config file
        if let Some(dir) = &self.datasets_dir {
            config.datasets_dir = dir.clone();
        }
        if let Some(dir) = &self.scripts_dir {
            config.scripts_dir = dir.clone();
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(thresh) = self.coacc_thresh {
            config.coacc_thresh = thresh;
        }
        if let Some(organism) = &self.organism {
            config.organism = Organism::from_label(organism);
        }
        if self.max_jobs.is_some() {
            config.max_parallel_clustering = determine_job_count(self.max_jobs)?;
        }

        let layout = DatasetLayout::new(&config.datasets_dir, &self.data_name)?;
        let pipeline = build_scatac_pipeline(&layout, &config)?;

        if self.dry_run {
            pipeline.check_disjoint_outputs()?;
            for line in pipeline.plan() {
                println!("{}", line);
            }
            return Ok(());
        }

        check_tools(&config)?;
        let report = pipeline.run()?;
        info!(
            "RunPipeline has finished successfully: {} stages for {}",
            report.completed.len(),
            self.data_name
        );
        Ok(())
    }
}

/// Fail early if a tool the pipeline calls directly is missing
fn check_tools(config: &PipelineConfig) -> anyhow::Result<()> {
    let envs = [config.python(), config.r(), config.scopen(), config.bedtools()];
    if envs.iter().any(|env| matches!(env, ToolEnv::Conda { .. })) {
        check_conda()?;
    }
    if config.bedtools() == ToolEnv::Inherit {
        check_bedtools()?;
    }
    if config.r() == ToolEnv::Inherit {
        check_rscript()?;
    }
    Ok(())
}

/// The scATAC-seq pipeline for one dataset, from raw input to the clustering
/// metrics table
pub fn build_scatac_pipeline(layout: &DatasetLayout, config: &PipelineConfig) -> anyhow::Result<Pipeline> {
    let window = config.window;
    let regions_dir = layout.regions_dir();
    let path_peaks = regions_dir.join("peaks.txt");
    let path_peaks_bed = regions_dir.join("peaks.bed");
    let matrix_files = ["peaks.txt", "matrix.mtx", "barcodes.tsv"].map(|f| regions_dir.join(f));
    let path_gtf = expand_and_resolve_path(&config.gtf)?;

    let mut pipeline = Pipeline::new();

    pipeline.push(
        Stage::new(
            "extract-regions",
            ExternalCommand::new("python")
                .arg(config.script("extract_regions.py")?)
                .arg("--input_dir")
                .arg(layout.input_dir())
                .arg("--output_dir")
                .arg(&regions_dir)
                .env(config.python()),
        )
        .input(layout.input_dir())
        .outputs(&matrix_files),
    );

    pipeline.push(
        Stage::new(
            "celltypist-core-genes",
            ExternalCommand::new("python")
                .arg(config.script("celltypist_core_genes.py")?)
                .arg("--model_name")
                .arg(&config.celltypist_model)
                .arg("--top_n_genes_per_class")
                .arg(config.top_n_genes_per_class.to_string())
                .arg("--out_dir")
                .arg(layout.celltypist_dir())
                .env(config.python()),
        )
        .output(layout.core_genes()),
    );

    let core_regions = CoreRegions {
        path_genes: layout.core_genes(),
        path_gtf: path_gtf.clone(),
        window,
        path_out: layout.core_regions_bed(window),
    };
    pipeline.push(
        Stage::new(
            "core-regions",
            Builtin::new(format!("TSS ±{} bp windows of the core genes", window), move || {
                CoreRegions::run(&core_regions)?;
                Ok(())
            }),
        )
        .input(layout.core_genes())
        .input(&path_gtf)
        .output(layout.core_regions_bed(window)),
    );

    let (ids_in, bed_out) = (path_peaks.clone(), path_peaks_bed.clone());
    pipeline.push(
        Stage::new(
            "peaks-to-bed",
            Builtin::new(format!("convert {} to BED", path_peaks.display()), move || {
                convert_peak_file(&ids_in, &bed_out, PeakFormat::Bed)?;
                Ok(())
            }),
        )
        .input(&path_peaks)
        .output(&path_peaks_bed),
    );

    pipeline.push(
        Stage::new(
            "intersect",
            ExternalCommand::new("bedtools")
                .arg("intersect")
                .arg("-a")
                .arg(&path_peaks_bed)
                .arg("-b")
                .arg(layout.core_regions_bed(window))
                .arg("-u")
                .stdout_to(layout.core_peaks_bed(window))
                .env(config.bedtools()),
        )
        .input(&path_peaks_bed)
        .input(layout.core_regions_bed(window))
        .output(layout.core_peaks_bed(window)),
    );

    let (bed_in, ids_out) = (layout.core_peaks_bed(window), layout.core_peaks_ids(window));
    pipeline.push(
        Stage::new(
            "core-peaks-to-ids",
            Builtin::new("convert the intersected peaks to ids", move || {
                convert_peak_file(&bed_in, &ids_out, PeakFormat::Ids)?;
                Ok(())
            }),
        )
        .input(layout.core_peaks_bed(window))
        .output(layout.core_peaks_ids(window)),
    );

    let split = SplitChrom {
        path_in: path_peaks.clone(),
        prefix_out: layout.cicero_split_prefix(),
        max_chr: config.organism.max_chr(),
    };
    let split_dir = layout.output_dir("cicero").join("split");
    pipeline.push(
        Stage::new(
            "split-peaks",
            Builtin::new(
                format!("split peaks by chromosome ({} autosomes + X, Y)", split.max_chr),
                move || {
                    SplitChrom::run(&split)?;
                    Ok(())
                },
            ),
        )
        .input(&path_peaks)
        .output(&split_dir),
    );

    pipeline.push(
        Stage::new(
            "cicero",
            ExternalCommand::new("Rscript")
                .arg(config.script("run_cicero.R")?)
                .arg("--split_dir")
                .arg(&split_dir)
                .arg("--regions_dir")
                .arg(&regions_dir)
                .arg("--output_dir")
                .arg(layout.cicero_tables_dir())
                .env(config.r()),
        )
        .input(&split_dir)
        .inputs(&matrix_files)
        .output(layout.cicero_tables_dir()),
    );

    let cicero_filter = CiceroFilter::from_layout(layout, window, config.coacc_thresh);
    let filter_outputs = cicero_filter.outputs();
    pipeline.push(
        Stage::new(
            "cicero-filter",
            Builtin::new(
                format!("core peaks plus partners with coaccess >= {}", config.coacc_thresh),
                move || {
                    CiceroFilter::run(&cicero_filter)?;
                    Ok(())
                },
            ),
        )
        .input(layout.core_peaks_ids(window))
        .input(layout.cicero_tables_dir())
        .inputs(&matrix_files)
        .outputs(&filter_outputs),
    );

    for rank in &config.scopen_ranks {
        let dir_out = layout.scopen_dir().join(format!("{}rank{}", DEFAULT_SUBDATASET_PREFIX, rank));
        pipeline.push(
            Stage::new(
                format!("scopen-rank{}", rank),
                ExternalCommand::new("scopen")
                    .arg("--input")
                    .arg(layout.cicero_filter_dir())
                    .arg("--input_format")
                    .arg("10X")
                    .arg("--output_dir")
                    .arg(&dir_out)
                    .arg("--output_prefix")
                    .arg("scOpen")
                    .arg("--output_format")
                    .arg("10X")
                    .arg("--n_components")
                    .arg(rank.to_string())
                    .env(config.scopen()),
            )
            .inputs(&filter_outputs)
            .output(&dir_out),
        );
    }

    pipeline.push(
        Stage::new(
            "cluster",
            ClusterSubdatasets {
                dir_in: layout.scopen_dir(),
                dir_out: layout.clustering_dir(),
                path_script: config.script("clustering.py")?,
                env: config.python(),
                prefix: DEFAULT_SUBDATASET_PREFIX.to_string(),
                max_concurrent: config.max_parallel_clustering,
            },
        )
        .input(layout.scopen_dir())
        .output(layout.clustering_dir()),
    );

    let metrics = CollectMetrics {
        base_dir: layout.clustering_dir(),
        path_out: layout.metrics_csv(),
    };
    pipeline.push(
        Stage::new(
            "metrics",
            Builtin::new("collect metrics.json of every clustered matrix", move || {
                CollectMetrics::run(&metrics)?;
                Ok(())
            }),
        )
        .input(layout.clustering_dir())
        .output(layout.metrics_csv()),
    );

    Ok(pipeline)
}
