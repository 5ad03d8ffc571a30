use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::runtime::Error;

use super::runner::check_disjoint;
use super::{StageAction, StageStatus};

/// Default cap on concurrently running fan-out jobs
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// One independent invocation, writing only below its own output directory
pub struct FanOutJob {
    pub name: String,
    pub output_dir: PathBuf,
    pub action: Box<dyn StageAction>,
}

#[derive(Debug, Default)]
pub struct FanOutReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

enum JobOutcome {
    Completed,
    Failed(Option<i32>),
    Errored(anyhow::Error),
    Skipped,
}

/// Fixed-size worker pool over a queue of jobs, joined before returning.
/// After the first failure, queued jobs are skipped; running ones finish
pub struct FanOut {
    name: String,
    max_concurrent: usize,
}

impl FanOut {
    pub fn new<S: Into<String>>(name: S, max_concurrent: usize) -> Result<FanOut, Error> {
        if max_concurrent < 1 {
            return Err(Error::usage("Fan-out needs at least one concurrent job"));
        }
        Ok(FanOut {
            name: name.into(),
            max_concurrent,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn run(&self, jobs: Vec<FanOutJob>) -> anyhow::Result<FanOutReport> {
        check_disjoint(jobs.iter().map(|j| (j.name.as_str(), j.output_dir.as_path())))?;

        let num_jobs = jobs.len();
        if num_jobs == 0 {
            warn!("Fan-out '{}' has no jobs to run", self.name);
            return Ok(FanOutReport::default());
        }

        //Note that pool threads only wait on the external processes
        let num_workers = self.max_concurrent.min(num_jobs);
        info!(
            "Fan-out '{}': {} jobs, at most {} at a time",
            self.name, num_jobs, num_workers
        );
        let thread_pool = threadpool::ThreadPool::new(num_workers);

        let abort = Arc::new(AtomicBool::new(false));
        let (tx_done, rx_done) = crossbeam::channel::unbounded::<(usize, String, JobOutcome)>();

        for (index, job) in jobs.into_iter().enumerate() {
            let abort = Arc::clone(&abort);
            let tx_done = tx_done.clone();
            thread_pool.execute(move || {
                if abort.load(Ordering::SeqCst) {
                    let _ = tx_done.send((index, job.name, JobOutcome::Skipped));
                    return;
                }

                debug!("Job '{}' started: {}", job.name, job.action.describe());
                let outcome = match job.action.execute() {
                    Ok(StageStatus::Success) => JobOutcome::Completed,
                    Ok(StageStatus::Failed { code }) => {
                        abort.store(true, Ordering::SeqCst);
                        JobOutcome::Failed(code)
                    }
                    Err(e) => {
                        abort.store(true, Ordering::SeqCst);
                        JobOutcome::Errored(e)
                    }
                };
                debug!("Job '{}' done", job.name);
                let _ = tx_done.send((index, job.name, outcome));
            });
        }
        drop(tx_done);

        //Barrier: every admitted job has finished or been skipped
        thread_pool.join();

        let mut report = FanOutReport::default();
        let mut first_failure: Option<Error> = None;
        let mut outcomes: Vec<(usize, String, JobOutcome)> = rx_done.iter().collect();

        //Messages arrive in completion order, which decides the reported failure
        for (_, name, outcome) in outcomes.iter() {
            let job_stage = format!("{}:{}", self.name, name);
            match outcome {
                JobOutcome::Failed(code) if first_failure.is_none() => {
                    first_failure = Some(Error::stage_failed(job_stage, *code));
                }
                JobOutcome::Errored(e) if first_failure.is_none() => {
                    first_failure = Some(Error::stage_error(job_stage, e));
                }
                _ => {}
            }
        }

        outcomes.sort_by_key(|(index, _, _)| *index);
        for (_, name, outcome) in outcomes {
            match outcome {
                JobOutcome::Completed => report.completed.push(name),
                JobOutcome::Failed(_) | JobOutcome::Errored(_) => report.failed.push(name),
                JobOutcome::Skipped => report.skipped.push(name),
            }
        }

        let num_reported = report.completed.len() + report.failed.len() + report.skipped.len();
        if num_reported != num_jobs && first_failure.is_none() {
            first_failure = Some(Error::stage_error(
                &self.name,
                &anyhow::anyhow!("{} jobs ended without reporting back", num_jobs - num_reported),
            ));
        }

        info!(
            "Fan-out '{}' finished: {} completed, {} failed, {} skipped",
            self.name,
            report.completed.len(),
            report.failed.len(),
            report.skipped.len()
        );

        match first_failure {
            Some(err) => Err(err.into()),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    /// Tracks how many jobs run at the same time
    struct CountingAction {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        executed: Arc<AtomicUsize>,
        fail: bool,
    }

    impl StageAction for CountingAction {
        fn describe(&self) -> String {
            "count".to_string()
        }

        fn execute(&self) -> anyhow::Result<StageStatus> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.executed.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.running.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Ok(StageStatus::Failed { code: Some(9) })
            } else {
                Ok(StageStatus::Success)
            }
        }
    }

    struct Counters {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        executed: Arc<AtomicUsize>,
    }

    impl Counters {
        fn new() -> Counters {
            Counters {
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                executed: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn job(&self, index: usize, fail: bool) -> FanOutJob {
            FanOutJob {
                name: format!("matrix_{}", index),
                output_dir: PathBuf::from(format!("/out/matrix_{}", index)),
                action: Box::new(CountingAction {
                    running: Arc::clone(&self.running),
                    peak: Arc::clone(&self.peak),
                    executed: Arc::clone(&self.executed),
                    fail,
                }),
            }
        }
    }

    #[test]
    fn test_cap_is_respected_and_all_jobs_run() {
        let counters = Counters::new();
        let jobs: Vec<FanOutJob> = (0..12).map(|i| counters.job(i, false)).collect();

        let fanout = FanOut::new("cluster", 3).unwrap();
        let report = fanout.run(jobs).unwrap();

        assert_eq!(report.completed.len(), 12);
        assert_eq!(report.completed[0], "matrix_0");
        assert!(report.failed.is_empty());
        assert_eq!(counters.executed.load(Ordering::SeqCst), 12);
        assert!(counters.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(counters.running.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_skips_queued_jobs() {
        let counters = Counters::new();
        let mut jobs = vec![counters.job(0, true)];
        jobs.extend((1..5).map(|i| counters.job(i, false)));

        let fanout = FanOut::new("cluster", 1).unwrap();
        let err = fanout.run(jobs).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::StageFailed { stage, code }) => {
                assert_eq!(stage, "cluster:matrix_0");
                assert_eq!(*code, Some(9));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(counters.executed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_cap_is_usage_error() {
        assert!(matches!(FanOut::new("cluster", 0), Err(Error::Usage { .. })));
    }

    #[test]
    fn test_shared_output_dir_rejected() {
        let counters = Counters::new();
        let mut a = counters.job(0, false);
        let b = counters.job(1, false);
        a.output_dir = b.output_dir.clone();

        let err = FanOut::new("cluster", 2).unwrap().run(vec![a, b]).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::OverlappingOutputs { .. })));
        assert_eq!(counters.executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_jobs() {
        let report = FanOut::new("cluster", 4).unwrap().run(Vec::new()).unwrap();
        assert!(report.completed.is_empty());
    }
}
