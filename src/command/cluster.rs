use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use log::info;
use walkdir::WalkDir;

use crate::pipeline::{ExternalCommand, FanOut, FanOutJob, StageAction, StageStatus, ToolEnv};
use crate::runtime::Error;

use super::determine_job_count;

pub const DEFAULT_SUBDATASET_PREFIX: &str = "matrix_";
pub const DEFAULT_CLUSTERING_SCRIPT: &str = "scripts/clustering.py";

#[derive(Args)]
pub struct ClusterCMD {
    /// Directory holding one sub-directory per imputed matrix
    #[arg(short = 'i', value_parser = clap::value_parser!(PathBuf))]
    pub dir_in: PathBuf,

    /// Each sub-dataset gets <out>/<name>
    #[arg(short = 'o', value_parser = clap::value_parser!(PathBuf))]
    pub dir_out: PathBuf,

    /// Clustering script, run once per sub-dataset
    #[arg(long = "script", value_parser = clap::value_parser!(PathBuf), default_value = DEFAULT_CLUSTERING_SCRIPT)]
    pub path_script: PathBuf,

    /// Conda environment to run the script in
    #[arg(long = "env")]
    pub env: Option<String>,

    /// Only sub-directories starting with this are clustered
    #[arg(long = "prefix", default_value = DEFAULT_SUBDATASET_PREFIX)]
    pub prefix: String,

    //Job settings
    #[arg(short = '@', value_parser = clap::value_parser!(usize))]
    pub max_jobs: Option<usize>,
}
impl ClusterCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let max_concurrent = determine_job_count(self.max_jobs)?;

        let params = ClusterSubdatasets {
            dir_in: self.dir_in.clone(),
            dir_out: self.dir_out.clone(),
            path_script: self.path_script.clone(),
            env: ToolEnv::from_name(&self.env),
            prefix: self.prefix.clone(),
            max_concurrent,
        };
        params.execute()?;

        info!("Cluster has finished successfully");
        Ok(())
    }
}

/// Creates the job's output directory, then runs its command
struct ClusteringJob {
    dir_out: PathBuf,
    command: ExternalCommand,
}

impl StageAction for ClusteringJob {
    fn describe(&self) -> String {
        self.command.describe()
    }

    fn execute(&self) -> anyhow::Result<StageStatus> {
        fs::create_dir_all(&self.dir_out)
            .with_context(|| format!("Failed to create {}", self.dir_out.display()))?;
        self.command.execute()
    }
}

/// Runs the clustering script over every sub-dataset, a bounded number at a
/// time. Sub-datasets are looked up when the stage runs, as they only exist
/// once imputation is done
#[derive(Clone, Debug)]
pub struct ClusterSubdatasets {
    pub dir_in: PathBuf,
    pub dir_out: PathBuf,
    pub path_script: PathBuf,
    pub env: ToolEnv,
    pub prefix: String,
    pub max_concurrent: usize,
}

impl ClusterSubdatasets {
    /// Immediate sub-directories matching the prefix, sorted by name
    pub fn discover(dir_in: &Path, prefix: &str) -> anyhow::Result<Vec<(String, PathBuf)>> {
        if !dir_in.is_dir() {
            return Err(Error::file_not_found(dir_in).into());
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(dir_in).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(prefix) {
                found.push((name, entry.path().to_path_buf()));
            }
        }
        Ok(found)
    }

    pub fn jobs(&self) -> anyhow::Result<Vec<FanOutJob>> {
        let subdatasets = Self::discover(&self.dir_in, &self.prefix)?;
        if subdatasets.is_empty() {
            return Err(Error::file_empty(&self.dir_in).into());
        }

        let jobs = subdatasets
            .into_iter()
            .map(|(name, dir_sub)| {
                let dir_out = self.dir_out.join(&name);
                let command = ExternalCommand::new("python")
                    .arg(&self.path_script)
                    .arg("--input_dir")
                    .arg(&dir_sub)
                    .arg("--output_dir")
                    .arg(&dir_out)
                    .env(self.env.clone());
                FanOutJob {
                    name,
                    output_dir: dir_out.clone(),
                    action: Box::new(ClusteringJob { dir_out, command }),
                }
            })
            .collect();
        Ok(jobs)
    }
}

impl StageAction for ClusterSubdatasets {
    fn describe(&self) -> String {
        format!(
            "python {} for each {}/{}*, at most {} at a time",
            self.path_script.display(),
            self.dir_in.display(),
            self.prefix,
            self.max_concurrent
        )
    }

    fn execute(&self) -> anyhow::Result<StageStatus> {
        let fanout = FanOut::new("cluster", self.max_concurrent)?;
        let jobs = self.jobs()?;
        fanout.run(jobs)?;
        Ok(StageStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_input(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let dir_in = dir.path().join("scopen");
        for name in names {
            fs::create_dir_all(dir_in.join(name)).unwrap();
        }
        fs::write(dir_in.join("matrix_file.txt"), "not a dir").unwrap();
        dir
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = make_input(&["matrix_rank30", "other", "matrix_rank10"]);
        let found = ClusterSubdatasets::discover(&dir.path().join("scopen"), "matrix_").unwrap();
        let names: Vec<&str> = found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["matrix_rank10", "matrix_rank30"]);
    }

    #[test]
    fn test_jobs_get_disjoint_outputs() {
        let dir = make_input(&["matrix_a", "matrix_b"]);
        let params = ClusterSubdatasets {
            dir_in: dir.path().join("scopen"),
            dir_out: dir.path().join("clustering"),
            path_script: PathBuf::from("clustering.py"),
            env: ToolEnv::Conda {
                env_name: "cluster".to_string(),
            },
            prefix: DEFAULT_SUBDATASET_PREFIX.to_string(),
            max_concurrent: 2,
        };
        let jobs = params.jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].output_dir, dir.path().join("clustering").join("matrix_b"));
        assert!(jobs[0]
            .action
            .describe()
            .starts_with("conda run -n cluster --no-capture-output python clustering.py --input_dir"));
    }

    #[test]
    fn test_no_subdatasets_is_missing_data() {
        let dir = make_input(&["other"]);
        let params = ClusterSubdatasets {
            dir_in: dir.path().join("scopen"),
            dir_out: dir.path().join("clustering"),
            path_script: PathBuf::from("clustering.py"),
            env: ToolEnv::Inherit,
            prefix: DEFAULT_SUBDATASET_PREFIX.to_string(),
            max_concurrent: 2,
        };
        let err = params.execute().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::FileEmpty { .. })));
    }

    #[test]
    fn test_failing_script_names_the_job() {
        let dir = make_input(&["matrix_a"]);
        let params = ClusterSubdatasets {
            dir_in: dir.path().join("scopen"),
            dir_out: dir.path().join("clustering"),
            path_script: dir.path().join("missing_script.py"),
            env: ToolEnv::Inherit,
            prefix: DEFAULT_SUBDATASET_PREFIX.to_string(),
            max_concurrent: 1,
        };
        //Either python is absent or it fails on the missing script
        let err = params.execute().unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::StageFailed { stage, .. }) | Some(Error::StageError { stage, .. }) => {
                assert_eq!(stage, "cluster:matrix_a");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
