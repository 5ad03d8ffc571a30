use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::fileformat::{convert_peak_file, PeakFormat};

#[derive(Args)]
pub struct ConvertPeaksCMD {
    /// Peaks to convert: chr_start_end ids, or BED intervals
    #[arg(short = 'i', value_parser = clap::value_parser!(PathBuf))]
    pub path_in: PathBuf,

    /// Converted peaks
    #[arg(short = 'o', value_parser = clap::value_parser!(PathBuf))]
    pub path_out: PathBuf,

    /// Format to convert into
    #[arg(long = "to", value_enum)]
    pub to: PeakFormat,
}
impl ConvertPeaksCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let num_peaks = convert_peak_file(&self.path_in, &self.path_out, self.to)?;
        info!("ConvertPeaks has finished successfully: {} peaks", num_peaks);
        Ok(())
    }
}
