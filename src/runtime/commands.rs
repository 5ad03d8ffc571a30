use std::fmt;

use clap::Subcommand;

use crate::command;

///////////////////////////////
/// Possible subcommands to parse
#[derive(Subcommand)]
pub enum Commands {
    /// Split a peak file into one file per chromosome
    SplitChrom(command::SplitChromCMD),
    /// Convert peaks between chr_start_end ids and BED
    ConvertPeaks(command::ConvertPeaksCMD),
    /// BED windows around the TSS of core genes
    CoreRegions(command::CoreRegionsCMD),
    /// Keep core peaks and their co-accessible partners
    CiceroFilter(command::CiceroFilterCMD),
    /// Run the clustering script over every sub-dataset
    Cluster(command::ClusterCMD),
    /// Gather per-matrix metrics.json into one CSV
    CollectMetrics(command::CollectMetricsCMD),
    /// Run the whole pipeline for one dataset
    Run(command::RunPipelineCMD),
}

impl Commands {
    pub fn try_execute(&mut self) -> anyhow::Result<()> {
        match self {
            Commands::SplitChrom(cmd) => cmd.try_execute(),
            Commands::ConvertPeaks(cmd) => cmd.try_execute(),
            Commands::CoreRegions(cmd) => cmd.try_execute(),
            Commands::CiceroFilter(cmd) => cmd.try_execute(),
            Commands::Cluster(cmd) => cmd.try_execute(),
            Commands::CollectMetrics(cmd) => cmd.try_execute(),
            Commands::Run(cmd) => cmd.try_execute(),
        }
    }
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cmd = match self {
            Commands::SplitChrom(_) => "SplitChrom",
            Commands::ConvertPeaks(_) => "ConvertPeaks",
            Commands::CoreRegions(_) => "CoreRegions",
            Commands::CiceroFilter(_) => "CiceroFilter",
            Commands::Cluster(_) => "Cluster",
            Commands::CollectMetrics(_) => "CollectMetrics",
            Commands::Run(_) => "Run",
        };
        write!(f, "{}", cmd)
    }
}
