use log::info;

use crate::pipeline::DEFAULT_MAX_CONCURRENT;
use crate::runtime::Error;

/// Number of fan-out jobs allowed to run at once. Unlike a thread count,
/// this is not derived from the core count: each job is a separate process
/// that may itself be multithreaded
pub fn determine_job_count(requested: Option<usize>) -> Result<usize, Error> {
    match requested {
        Some(0) => Err(Error::usage("Cannot run fewer than one job at a time")),
        Some(n) => Ok(n),
        None => {
            info!("Using the default of {} concurrent jobs", DEFAULT_MAX_CONCURRENT);
            Ok(DEFAULT_MAX_CONCURRENT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_count() {
        assert_eq!(determine_job_count(None).unwrap(), 16);
        assert_eq!(determine_job_count(Some(3)).unwrap(), 3);
        assert!(matches!(determine_job_count(Some(0)), Err(Error::Usage { .. })));
    }
}
