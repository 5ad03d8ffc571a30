use std::collections::BTreeSet;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::info;

use crate::fileformat::gtf::{FeatureCollection, GtfParseSettings};
use crate::runtime::{require_nonempty, Error, DEFAULT_WINDOW};

#[derive(Args)]
pub struct CoreRegionsCMD {
    /// Core gene names, one per line
    #[arg(long = "genes", value_parser = clap::value_parser!(PathBuf))]
    pub path_genes: PathBuf,

    /// Gene annotation (GTF, optionally compressed)
    #[arg(long = "gtf", value_parser = clap::value_parser!(PathBuf))]
    pub path_gtf: PathBuf,

    /// Window around each TSS, in bp
    #[arg(long = "window", default_value_t = DEFAULT_WINDOW)]
    pub window: u64,

    /// BED file to write
    #[arg(short = 'o', value_parser = clap::value_parser!(PathBuf))]
    pub path_out: PathBuf,
}
impl CoreRegionsCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        CoreRegions::run(&CoreRegions {
            path_genes: self.path_genes.clone(),
            path_gtf: self.path_gtf.clone(),
            window: self.window,
            path_out: self.path_out.clone(),
        })?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BedRegion {
    pub chr: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub strand: &'static str,
}

/// Builds BED windows around the TSS of each core gene
pub struct CoreRegions {
    pub path_genes: PathBuf,
    pub path_gtf: PathBuf,
    pub window: u64,
    pub path_out: PathBuf,
}
impl CoreRegions {
    pub fn read_gene_list(path: &Path) -> anyhow::Result<BTreeSet<String>> {
        require_nonempty(path)?;
        let reader = BufReader::new(File::open(path)?);
        let mut genes = BTreeSet::new();
        for line in reader.lines() {
            let line = line?;
            let gene = line.trim();
            if !gene.is_empty() {
                genes.insert(gene.to_string());
            }
        }
        Ok(genes)
    }

    /// TSS is 1-based; BED is 0-based half-open, so the window covers
    /// [tss - window, tss + window] in 1-based coordinates
    pub fn regions_for(
        gtf: &FeatureCollection,
        genes: &BTreeSet<String>,
        window: u64,
    ) -> Vec<BedRegion> {
        let mut regions: Vec<BedRegion> = gtf
            .list_feature
            .iter()
            .filter(|g| genes.contains(&g.gene_name))
            .map(|g| {
                let tss = g.tss();
                BedRegion {
                    chr: g.gene_chr.clone(),
                    start: tss.saturating_sub(1 + window),
                    end: tss + window,
                    name: g.gene_name.clone(),
                    strand: g.gene_strand.as_str(),
                }
            })
            .collect();
        regions.sort_by(|a, b| {
            (&a.chr, a.start, a.end, &a.name).cmp(&(&b.chr, b.start, b.end, &b.name))
        });
        regions
    }

    /// Run the algorithm. Returns the number of regions written
    pub fn run(params: &CoreRegions) -> anyhow::Result<usize> {
        let genes = Self::read_gene_list(&params.path_genes)?;
        info!("Core genes: {}", genes.len());

        let gtf = FeatureCollection::read_file(&params.path_gtf, &GtfParseSettings::default())?;
        let regions = Self::regions_for(&gtf, &genes, params.window);

        let found: BTreeSet<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        info!("Core genes found in GTF: {} / {}", found.len(), genes.len());
        if found.is_empty() {
            return Err(Error::file_not_valid(
                &params.path_gtf,
                Some("none of the core genes has a matching gene_name"),
            )
            .into());
        }

        if let Some(parent) = params.path_out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file_out = File::create(&params.path_out)
            .with_context(|| format!("Failed to create {}", params.path_out.display()))?;
        let mut writer = BufWriter::new(file_out);
        for r in &regions {
            writeln!(writer, "{}\t{}\t{}\t{}\t{}", r.chr, r.start, r.end, r.name, r.strand)?;
        }
        writer.flush()?;

        info!("Saved {} regions (TSS±{} bp) to {}", regions.len(), params.window, params.path_out.display());
        Ok(regions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GTF: &str = "chr2\tX\tgene\t5000\t9000\t.\t-\t.\tgene_id \"G2\"; gene_name \"CD8A\";\n\
chr1\tX\tgene\t100\t900\t.\t+\t.\tgene_id \"G1\"; gene_name \"CD4\";\n\
chr1\tX\tgene\t20000\t30000\t.\t+\t.\tgene_id \"G3\"; gene_name \"OTHER\";\n";

    fn setup(genes: &str) -> (tempfile::TempDir, CoreRegions) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("genes.txt"), genes).unwrap();
        std::fs::write(dir.path().join("genes.gtf"), GTF).unwrap();
        let params = CoreRegions {
            path_genes: dir.path().join("genes.txt"),
            path_gtf: dir.path().join("genes.gtf"),
            window: 500,
            path_out: dir.path().join("out").join("core.bed"),
        };
        (dir, params)
    }

    #[test]
    fn test_windows_around_tss() {
        let (_dir, params) = setup("CD8A\n\nCD4\n");
        assert_eq!(CoreRegions::run(&params).unwrap(), 2);

        let bed = std::fs::read_to_string(&params.path_out).unwrap();
        //CD4 on + starts at 100 and is clipped at 0; CD8A on - starts at its end
        assert_eq!(bed, "chr1\t0\t600\tCD4\t+\nchr2\t8499\t9500\tCD8A\t-\n");
    }

    #[test]
    fn test_no_gene_found_is_an_error() {
        let (_dir, params) = setup("NOPE\n");
        assert!(CoreRegions::run(&params).is_err());
        assert!(!params.path_out.exists());
    }

    #[test]
    fn test_missing_gene_list() {
        let (dir, mut params) = setup("CD4\n");
        params.path_genes = dir.path().join("missing.txt");
        let err = CoreRegions::run(&params).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::FileNotFound { .. })));
    }
}
