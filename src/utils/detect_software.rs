use log::debug;
use log::info;
use std::process::Command;

use crate::runtime::Error;

fn check_program(program: &str, probe_arg: &str) -> anyhow::Result<()> {
    debug!("Checking for {}", program);
    if let Ok(_output) = Command::new(program).arg(probe_arg).output() {
        info!("Found {}", program);
        Ok(())
    } else {
        Err(Error::utility_not_executable(program).into())
    }
}

pub fn check_bedtools() -> anyhow::Result<()> {
    check_program("bedtools", "--version")
}

pub fn check_conda() -> anyhow::Result<()> {
    check_program("conda", "--version")
}

pub fn check_rscript() -> anyhow::Result<()> {
    check_program("Rscript", "--version")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_reported() {
        let res = check_program("peakflow-no-such-program", "--version");
        assert!(res.is_err());
    }
}
