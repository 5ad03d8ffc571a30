pub mod cicero_filter;
pub mod cluster;
pub mod collect_metrics;
pub mod convert_peaks;
pub mod core_regions;
pub mod run_pipeline;
pub mod split_chrom;
pub mod threadcount;

pub use threadcount::determine_job_count;

pub use split_chrom::SplitChrom;
pub use split_chrom::SplitChromCMD;

pub use convert_peaks::ConvertPeaksCMD;

pub use core_regions::CoreRegions;
pub use core_regions::CoreRegionsCMD;

pub use cicero_filter::CiceroFilter;
pub use cicero_filter::CiceroFilterCMD;

pub use cluster::ClusterCMD;
pub use cluster::ClusterSubdatasets;

pub use collect_metrics::CollectMetrics;
pub use collect_metrics::CollectMetricsCMD;

pub use run_pipeline::build_scatac_pipeline;
pub use run_pipeline::RunPipelineCMD;
