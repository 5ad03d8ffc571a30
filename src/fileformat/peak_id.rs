use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use log::info;

use crate::runtime::Error;

/// Which way to convert a list of peaks
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PeakFormat {
    /// `chr\tstart\tend` BED intervals
    Bed,
    /// `chr_start_end` identifiers, one per line
    Ids,
}

fn is_coordinate(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split a `chr_start_end` identifier into its three fields. The last two
/// '_'-separated parts are the coordinates, so contig names may contain '_'
pub fn split_peak_id(id: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = id.rsplitn(3, '_');
    let end = parts.next();
    let start = parts.next();
    let chrom = parts.next();
    match (chrom, start, end) {
        (Some(chrom), Some(start), Some(end))
            if !chrom.is_empty() && is_coordinate(start) && is_coordinate(end) =>
        {
            Ok((chrom, start, end))
        }
        _ => Err(Error::parse_error(
            format!("peak id '{}'", id),
            Some("expected <chromosome>_<start>_<end>"),
        )),
    }
}

/// `chr_start_end` to `chr\tstart\tend`, keeping the text of every field
pub fn peak_id_to_bed(id: &str) -> Result<String, Error> {
    let (chrom, start, end) = split_peak_id(id)?;
    Ok(format!("{}\t{}\t{}", chrom, start, end))
}

/// First three columns of a BED line to `chr_start_end`; extra columns are dropped
pub fn bed_to_peak_id(line: &str) -> Result<String, Error> {
    let mut fields = line.split('\t');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(chrom), Some(start), Some(end))
            if !chrom.is_empty() && is_coordinate(start) && is_coordinate(end) =>
        {
            Ok(format!("{}_{}_{}", chrom, start, end))
        }
        _ => Err(Error::parse_error(
            format!("BED line '{}'", line),
            Some("expected <chromosome>\\t<start>\\t<end>"),
        )),
    }
}

/// Convert a whole file of peaks. Blank lines are skipped; BED header
/// lines (track/browser/#) are skipped when reading BED
pub fn convert_peak_file(path_in: &Path, path_out: &Path, to: PeakFormat) -> anyhow::Result<usize> {
    crate::runtime::require_nonempty(path_in)?;

    let reader = BufReader::new(File::open(path_in)?);
    let file_out = File::create(path_out)
        .with_context(|| format!("Failed to create {}", path_out.display()))?;
    let mut writer = BufWriter::new(file_out);

    let mut num_written = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let converted = match to {
            PeakFormat::Bed => peak_id_to_bed(line.trim_matches('"'))?,
            PeakFormat::Ids => {
                if line.starts_with('#') || line.starts_with("track") || line.starts_with("browser") {
                    continue;
                }
                bed_to_peak_id(line)?
            }
        };
        writeln!(writer, "{}", converted)?;
        num_written += 1;
    }
    writer.flush()?;

    info!("Converted {} peaks from {} to {}", num_written, path_in.display(), path_out.display());
    Ok(num_written)
}
