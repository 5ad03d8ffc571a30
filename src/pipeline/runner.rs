use std::path::Path;
use std::time::Instant;

use log::{error, info};

use crate::runtime::{require_nonempty, Error};

use super::{Stage, StageStatus};

/// Every claimed output must be disjoint from every other: neither the same
/// path nor one nested inside another. Claims by the same owner are not compared
pub(crate) fn check_disjoint<'a, I>(claims: I) -> Result<(), Error>
where
    I: IntoIterator<Item = (&'a str, &'a Path)>,
{
    let claims: Vec<(&str, &Path)> = claims.into_iter().collect();
    for (i, (owner_a, path_a)) in claims.iter().enumerate() {
        for (owner_b, path_b) in &claims[i + 1..] {
            if owner_a == owner_b {
                continue;
            }
            if path_a.starts_with(path_b) || path_b.starts_with(path_a) {
                return Err(Error::OverlappingOutputs {
                    first: owner_a.to_string(),
                    second: owner_b.to_string(),
                    path: path_b.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub completed: Vec<String>,
}

/// An ordered list of stages, run one after the other. The first failure
/// ends the run; there is no retry and no resume
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline { stages: Vec::new() }
    }

    pub fn add(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn check_disjoint_outputs(&self) -> Result<(), Error> {
        check_disjoint(self.stages.iter().flat_map(|stage| {
            stage
                .outputs
                .iter()
                .map(move |p| (stage.name.as_str(), p.as_path()))
        }))
    }

    /// Human-readable plan of what `run` would do
    pub fn plan(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (index, stage) in self.stages.iter().enumerate() {
            lines.push(format!("{}. {}: {}", index + 1, stage.name, stage.action.describe()));
            for input in &stage.inputs {
                lines.push(format!("     needs    {}", input.display()));
            }
            for output in &stage.outputs {
                lines.push(format!("     produces {}", output.display()));
            }
        }
        lines
    }

    pub fn run(&self) -> anyhow::Result<PipelineReport> {
        self.check_disjoint_outputs()?;

        let num_stages = self.stages.len();
        let mut report = PipelineReport::default();
        for (index, stage) in self.stages.iter().enumerate() {
            info!(
                "Stage {}/{} '{}': {}",
                index + 1,
                num_stages,
                stage.name,
                stage.action.describe()
            );

            for input in &stage.inputs {
                if let Err(e) = require_nonempty(input) {
                    error!("Stage '{}' cannot start: {}", stage.name, e);
                    return Err(e.into());
                }
            }

            let time_start = Instant::now();
            match stage.action.execute() {
                Ok(StageStatus::Success) => {}
                Ok(StageStatus::Failed { code }) => {
                    return Err(Error::stage_failed(&stage.name, code).into());
                }
                Err(e) => {
                    //Keep the original classification when the action already produced one
                    return match e.downcast::<Error>() {
                        Ok(err) => Err(anyhow::Error::from(err).context(format!("Stage '{}'", stage.name))),
                        Err(e) => Err(Error::stage_error(&stage.name, &e).into()),
                    };
                }
            }

            for output in &stage.outputs {
                if require_nonempty(output).is_err() {
                    return Err(Error::output_missing(&stage.name, output).into());
                }
            }

            info!("Stage '{}' finished in {:.1?}", stage.name, time_start.elapsed());
            report.completed.push(stage.name.clone());
        }

        info!("Pipeline finished: {} stages", report.completed.len());
        Ok(report)
    }
}
