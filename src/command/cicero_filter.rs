use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::{debug, info};
use serde::Deserialize;

use crate::fileformat::mtx;
use crate::fileformat::peak_id_to_bed;
use crate::runtime::{require_nonempty, DatasetLayout, Error};
use crate::runtime::{DEFAULT_COACC_THRESH, DEFAULT_DATASETS_DIR, DEFAULT_WINDOW};

#[derive(Args)]
pub struct CiceroFilterCMD {
    /// Dataset name, e.g. PBMC10k
    #[arg(long = "data-name")]
    pub data_name: String,

    /// Window size in bp; must match the core regions
    #[arg(long = "window", default_value_t = DEFAULT_WINDOW)]
    pub window: u64,

    /// Minimum co-accessibility score for a connection to be followed
    #[arg(long = "coacc-thresh", default_value_t = DEFAULT_COACC_THRESH)]
    pub coacc_thresh: f64,

    /// Directory holding one folder per dataset
    #[arg(long = "datasets-dir", default_value = DEFAULT_DATASETS_DIR)]
    pub datasets_dir: PathBuf,
}
impl CiceroFilterCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let layout = DatasetLayout::new(&self.datasets_dir, &self.data_name)?;
        let params = CiceroFilter::from_layout(&layout, self.window, self.coacc_thresh);
        CiceroFilter::run(&params)?;
        Ok(())
    }
}

/// One row of a Cicero connection table. Scores of NA never pass
#[derive(Debug, Deserialize)]
struct Connection {
    #[serde(rename = "Peak1")]
    peak1: String,
    #[serde(rename = "Peak2")]
    peak2: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    coaccess: Option<f64>,
}

#[derive(Debug, Default)]
pub struct CiceroFilterStats {
    pub num_core: usize,
    pub total_connections: usize,
    pub core_connections: usize,
    pub num_selected: usize,
    pub num_retained: usize,
}

/// Expands the core peaks with co-accessible partners and writes the
/// reduced matrix used as scOpen input
#[derive(Clone, Debug)]
pub struct CiceroFilter {
    pub path_core_peaks: PathBuf,
    pub dir_tables: PathBuf,
    pub dir_regions: PathBuf,
    pub dir_out: PathBuf,
    pub window: u64,
    pub coacc_thresh: f64,
}
impl CiceroFilter {
    pub fn from_layout(layout: &DatasetLayout, window: u64, coacc_thresh: f64) -> CiceroFilter {
        CiceroFilter {
            path_core_peaks: layout.core_peaks_ids(window),
            dir_tables: layout.cicero_tables_dir(),
            dir_regions: layout.regions_dir(),
            dir_out: layout.cicero_filter_dir(),
            window,
            coacc_thresh,
        }
    }

    /// Thresholds are written with a decimal point, so 1 gives `coacc1.0`
    pub fn path_selected(&self) -> PathBuf {
        self.dir_out
            .join(format!("selected_peaks_{}bp_coacc{:?}.txt", self.window, self.coacc_thresh))
    }

    /// Files making up the scOpen input
    pub fn outputs(&self) -> Vec<PathBuf> {
        vec![
            self.path_selected(),
            self.dir_out.join("peaks.txt"),
            self.dir_out.join("peaks.bed"),
            self.dir_out.join("barcodes.tsv"),
            self.dir_out.join("matrix.mtx"),
        ]
    }

    fn read_ids(path: &Path) -> anyhow::Result<Vec<String>> {
        let reader = BufReader::new(File::open(path)?);
        let mut ids = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let id = line.trim().trim_matches('"');
            if !id.is_empty() {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Cicero tables in name order
    pub fn list_tables(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut tables: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_table = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("peaks_chr") && n.ends_with(".csv"))
                .unwrap_or(false);
            if is_table && path.is_file() {
                tables.push(path);
            }
        }
        tables.sort();
        Ok(tables)
    }

    /// Core peaks plus both ends of every connection that touches a core
    /// peak with a score of at least `coacc_thresh`
    pub fn select_peaks(
        core: &HashSet<String>,
        tables: &[PathBuf],
        coacc_thresh: f64,
        stats: &mut CiceroFilterStats,
    ) -> anyhow::Result<BTreeSet<String>> {
        let mut selected: BTreeSet<String> = core.iter().cloned().collect();

        for table in tables {
            let mut reader = csv::Reader::from_path(table)
                .with_context(|| format!("Failed to open {}", table.display()))?;
            let mut num_in_table = 0;
            for row in reader.deserialize() {
                let row: Connection = row.with_context(|| format!("Failed to parse {}", table.display()))?;
                num_in_table += 1;

                let passes = matches!(row.coaccess, Some(score) if score >= coacc_thresh);
                if !passes {
                    continue;
                }
                let peak1 = row.peak1.replace('"', "");
                let peak2 = row.peak2.replace('"', "");
                if core.contains(&peak1) || core.contains(&peak2) {
                    stats.core_connections += 1;
                    selected.insert(peak1);
                    selected.insert(peak2);
                }
            }
            debug!("{}: {} connections", table.display(), num_in_table);
            stats.total_connections += num_in_table;
        }
        Ok(selected)
    }

    /// Run the algorithm
    pub fn run(params: &CiceroFilter) -> anyhow::Result<CiceroFilterStats> {
        for dir in [&params.dir_tables, &params.dir_regions] {
            if !dir.is_dir() {
                return Err(Error::file_not_found(dir).into());
            }
        }
        require_nonempty(&params.path_core_peaks)?;

        let mut stats = CiceroFilterStats::default();

        let core: HashSet<String> = Self::read_ids(&params.path_core_peaks)?.into_iter().collect();
        stats.num_core = core.len();
        info!("Core peaks: {}", core.len());

        let tables = Self::list_tables(&params.dir_tables)?;
        if tables.is_empty() {
            return Err(Error::file_empty(&params.dir_tables).into());
        }
        info!("Found {} Cicero tables", tables.len());

        //Check the matrix inputs before writing anything
        let path_peaks = params.dir_regions.join("peaks.txt");
        let path_matrix = params.dir_regions.join("matrix.mtx");
        let path_barcodes = params.dir_regions.join("barcodes.tsv");
        for p in [&path_peaks, &path_matrix, &path_barcodes] {
            require_nonempty(p)?;
        }

        let selected = Self::select_peaks(&core, &tables, params.coacc_thresh, &mut stats)?;
        stats.num_selected = selected.len();
        info!("Total connections: {}", stats.total_connections);
        info!("Core-related connections: {}", stats.core_connections);
        info!("Selected peaks (core + coaccessible): {}", selected.len());

        fs::create_dir_all(&params.dir_out)
            .with_context(|| format!("Failed to create {}", params.dir_out.display()))?;

        let path_selected = params.path_selected();
        {
            let mut writer = BufWriter::new(File::create(&path_selected)?);
            for id in &selected {
                writeln!(writer, "{}", id)?;
            }
            writer.flush()?;
        }
        info!("Selected peak list saved to {}", path_selected.display());

        //Matrix rows follow peaks.txt
        let all_peaks = Self::read_ids(&path_peaks)?;
        let keep_rows: Vec<usize> = all_peaks
            .iter()
            .enumerate()
            .filter(|(_, id)| selected.contains(*id))
            .map(|(index, _)| index)
            .collect();
        if keep_rows.is_empty() {
            return Err(Error::file_not_valid(
                &path_peaks,
                Some("none of the selected peaks is listed; check the peak id format"),
            )
            .into());
        }
        stats.num_retained = keep_rows.len();
        info!("Peaks in original matrix: {}, retained: {}", all_peaks.len(), keep_rows.len());

        let matrix = mtx::read_mtx(&path_matrix)?;
        if matrix.rows() != all_peaks.len() {
            return Err(Error::file_not_valid(
                &path_matrix,
                Some(format!(
                    "{} rows but {} peaks in {}",
                    matrix.rows(),
                    all_peaks.len(),
                    path_peaks.display()
                )),
            )
            .into());
        }
        let reduced = mtx::subset_rows(&matrix, &keep_rows);
        info!("Reduced matrix from {:?} to {:?}", matrix.shape(), reduced.shape());

        {
            let mut writer_ids = BufWriter::new(File::create(params.dir_out.join("peaks.txt"))?);
            let mut writer_bed = BufWriter::new(File::create(params.dir_out.join("peaks.bed"))?);
            for &row in &keep_rows {
                let id = &all_peaks[row];
                writeln!(writer_ids, "{}", id)?;
                writeln!(writer_bed, "{}", peak_id_to_bed(id)?)?;
            }
            writer_ids.flush()?;
            writer_bed.flush()?;
        }
        fs::copy(&path_barcodes, params.dir_out.join("barcodes.tsv"))?;
        mtx::write_mtx(&params.dir_out.join("matrix.mtx"), &reduced)?;

        info!("scOpen input written to {}", params.dir_out.display());
        Ok(stats)
    }
}
