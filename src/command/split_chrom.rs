use std::ffi::OsString;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::{debug, info};

use crate::genome::{Chromosome, Organism};
use crate::runtime::require_nonempty;

#[derive(Args)]
pub struct SplitChromCMD {
    /// Peak/region records; first field is chr_start_end or the BED chromosome
    #[arg(value_parser = clap::value_parser!(PathBuf))]
    pub path_in: PathBuf,

    /// Output prefix; files are written as <prefix>_chr<N>.tsv
    #[arg(value_parser = clap::value_parser!(PathBuf))]
    pub prefix_out: PathBuf,

    /// Organism deciding the autosome count (mouse: 19, otherwise 22)
    #[arg(default_value = "human")]
    pub organism: String,

    /// Override the autosome count, for organisms not known by name
    #[arg(long = "max-chr", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_chr: Option<u32>,
}
impl SplitChromCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let max_chr = match self.max_chr {
            Some(max_chr) => max_chr,
            None => Organism::from_label(&self.organism).max_chr(),
        };

        let stats = SplitChrom::run(&SplitChrom {
            path_in: self.path_in.clone(),
            prefix_out: self.prefix_out.clone(),
            max_chr,
        })?;

        info!(
            "SplitChrom has finished successfully: {} records, {} kept, {} dropped",
            stats.num_records,
            stats.num_kept(),
            stats.num_dropped
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SplitStats {
    pub num_records: u64,
    pub num_dropped: u64,
    /// Records per chromosome, in file order
    pub per_chromosome: Vec<(Chromosome, u64)>,
}

impl SplitStats {
    pub fn num_kept(&self) -> u64 {
        self.per_chromosome.iter().map(|(_, n)| n).sum()
    }
}

/// Splits a peak file into one file per chromosome
pub struct SplitChrom {
    pub path_in: PathBuf,
    pub prefix_out: PathBuf,
    pub max_chr: u32,
}
impl SplitChrom {
    /// `<prefix>_chr<label>.tsv`, built on the OS string so that prefixes
    /// need not be UTF-8
    pub fn output_path(prefix: &Path, chrom: Chromosome) -> PathBuf {
        let mut name: OsString = prefix.as_os_str().to_owned();
        name.push(format!("_chr{}.tsv", chrom));
        PathBuf::from(name)
    }

    /// All files a split with this prefix produces, in chromosome order
    pub fn output_paths(prefix: &Path, max_chr: u32) -> Vec<PathBuf> {
        Chromosome::all(max_chr)
            .map(|chrom| Self::output_path(prefix, chrom))
            .collect()
    }

    /// Run the algorithm
    pub fn run(params: &SplitChrom) -> anyhow::Result<SplitStats> {
        //Nothing may be written unless there is something to split
        require_nonempty(&params.path_in)?;

        if let Some(parent) = Self::output_path(&params.prefix_out, Chromosome::X).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
            }
        }

        //Every chromosome gets a file, even if no record ends up in it
        let mut writers: Vec<BufWriter<File>> = Vec::new();
        let mut per_chromosome: Vec<(Chromosome, u64)> = Vec::new();
        for chrom in Chromosome::all(params.max_chr) {
            let path = Self::output_path(&params.prefix_out, chrom);
            let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
            writers.push(BufWriter::new(file));
            per_chromosome.push((chrom, 0));
        }

        let file_in = File::open(&params.path_in)
            .with_context(|| format!("Failed to open {}", params.path_in.display()))?;
        let mut reader = BufReader::new(file_in);

        //Records are routed as raw bytes; they need not be UTF-8 and keep their line endings
        let mut num_records = 0;
        let mut num_dropped = 0;
        let mut buf: Vec<u8> = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            num_records += 1;

            match Chromosome::from_record_bytes(&buf, params.max_chr) {
                Some(chrom) => {
                    let slot = chrom.slot(params.max_chr);
                    writers[slot].write_all(&buf)?;
                    if !buf.ends_with(b"\n") {
                        writers[slot].write_all(b"\n")?;
                    }
                    per_chromosome[slot].1 += 1;
                }
                None => {
                    //Other contigs are filtered out on purpose
                    num_dropped += 1;
                }
            }
        }

        for writer in writers.iter_mut() {
            writer.flush()?;
        }

        if num_dropped > 0 {
            debug!("Dropped {} records without a recognised chromosome", num_dropped);
        }
        for (chrom, count) in &per_chromosome {
            debug!("chr{}: {} records", chrom, count);
        }

        Ok(SplitStats {
            num_records,
            num_dropped,
            per_chromosome,
        })
    }
}
