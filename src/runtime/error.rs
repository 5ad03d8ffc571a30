use std::path::{Path, PathBuf};

use thiserror::Error;

/// Process exit code for bad arguments or an inconsistent pipeline definition
pub const EXIT_USAGE: u8 = 1;
/// Process exit code for a required input that is absent or empty
pub const EXIT_MISSING_DATA: u8 = 2;
/// Process exit code for an external tool or stage that failed
pub const EXIT_STAGE_FAILURE: u8 = 3;
/// Process exit code for anything else (I/O problems, malformed data)
pub const EXIT_RUNTIME_FAILURE: u8 = 4;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid usage: {msg}")]
    Usage { msg: String },

    #[error("Required input at {:?} not found.", path)]
    FileNotFound { path: PathBuf },

    #[error("Required input at {:?} is empty.", path)]
    FileEmpty { path: PathBuf },

    #[error("File at {:?} is invalid{}.", path, Error::format_msg_as_detail(msg))]
    FileNotValid { path: PathBuf, msg: Option<String> },

    #[error("Stage '{}' failed{}", stage, Error::format_code_as_detail(code))]
    StageFailed { stage: String, code: Option<i32> },

    #[error("Stage '{}' failed: {}", stage, msg)]
    StageError { stage: String, msg: String },

    #[error("Stage '{}' finished but did not produce {:?}", stage, path)]
    OutputMissing { stage: String, path: PathBuf },

    #[error("Stages '{}' and '{}' both write to {:?}", first, second, path)]
    OverlappingOutputs {
        first: String,
        second: String,
        path: PathBuf,
    },

    #[error(
        "Failed trying to execute utility '{utility}'. Make sure it is in your $PATH and you have execution permissions."
    )]
    UtilityNotExecutable { utility: String },

    #[error("Failed parsing {}{}", context, Error::format_msg_as_detail(msg))]
    ParseError { context: String, msg: Option<String> },
}

impl Error {
    #[cold]
    pub fn usage<M: Into<String>>(msg: M) -> Self {
        Error::Usage { msg: msg.into() }
    }

    #[cold]
    pub fn file_not_found<P: AsRef<Path>>(path: P) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cold]
    pub fn file_empty<P: AsRef<Path>>(path: P) -> Self {
        Error::FileEmpty {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cold]
    pub fn file_not_valid<P: AsRef<Path>, M: Into<String>>(path: P, msg: Option<M>) -> Self {
        Error::FileNotValid {
            path: path.as_ref().to_path_buf(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn stage_failed<S: Into<String>>(stage: S, code: Option<i32>) -> Self {
        Error::StageFailed {
            stage: stage.into(),
            code,
        }
    }

    #[cold]
    pub fn stage_error<S: Into<String>>(stage: S, err: &anyhow::Error) -> Self {
        Error::StageError {
            stage: stage.into(),
            msg: format!("{:#}", err),
        }
    }

    #[cold]
    pub fn output_missing<S: Into<String>, P: AsRef<Path>>(stage: S, path: P) -> Self {
        Error::OutputMissing {
            stage: stage.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cold]
    pub fn utility_not_executable<U: Into<String>>(utility: U) -> Self {
        Error::UtilityNotExecutable {
            utility: utility.into(),
        }
    }

    #[cold]
    pub fn parse_error<C: Into<String>, M: Into<String>>(context: C, msg: Option<M>) -> Self {
        Error::ParseError {
            context: context.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    /// Missing-data conditions are kept apart from argument errors so that
    /// callers can tell "fix your command line" from "produce the input first"
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage { .. } | Error::OverlappingOutputs { .. } => EXIT_USAGE,
            Error::FileNotFound { .. } | Error::FileEmpty { .. } => EXIT_MISSING_DATA,
            Error::StageFailed { .. }
            | Error::StageError { .. }
            | Error::OutputMissing { .. }
            | Error::UtilityNotExecutable { .. } => EXIT_STAGE_FAILURE,
            Error::FileNotValid { .. } | Error::ParseError { .. } => EXIT_RUNTIME_FAILURE,
        }
    }

    pub fn format_msg_as_detail(msg: &Option<String>) -> String {
        match msg {
            Some(m) => format!(" ({})", m),
            None => String::new(),
        }
    }

    pub fn format_code_as_detail(code: &Option<i32>) -> String {
        match code {
            Some(c) => format!(" with exit code {}", c),
            None => " (terminated by signal)".to_string(),
        }
    }
}

/// Map any error surfacing from a command to the process exit code
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(e) => e.exit_code(),
        None => EXIT_RUNTIME_FAILURE,
    }
}

/// Check that a required input exists and holds something: a file with at
/// least one byte, or a directory with at least one entry
pub fn require_nonempty<P: AsRef<Path>>(path: P) -> Result<(), Error> {
    let path = path.as_ref();
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return Err(Error::file_not_found(path)),
    };

    let is_empty = if meta.is_dir() {
        match std::fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => return Err(Error::file_not_found(path)),
        }
    } else {
        meta.len() == 0
    };

    if is_empty {
        Err(Error::file_empty(path))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_keep_classes_apart() {
        assert_eq!(Error::usage("x").exit_code(), EXIT_USAGE);
        assert_eq!(Error::file_not_found("a").exit_code(), EXIT_MISSING_DATA);
        assert_eq!(Error::file_empty("a").exit_code(), EXIT_MISSING_DATA);
        assert_eq!(Error::stage_failed("s", Some(1)).exit_code(), EXIT_STAGE_FAILURE);
        assert_ne!(EXIT_USAGE, EXIT_MISSING_DATA);
    }

    #[test]
    fn test_exit_code_through_anyhow() {
        let err: anyhow::Error = Error::file_empty("peaks.txt").into();
        assert_eq!(exit_code_for(&err), EXIT_MISSING_DATA);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), EXIT_RUNTIME_FAILURE);
    }

    #[test]
    fn test_stage_failed_message() {
        let e = Error::stage_failed("intersect", Some(7));
        assert_eq!(e.to_string(), "Stage 'intersect' failed with exit code 7");
    }

    #[test]
    fn test_require_nonempty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.txt");
        assert!(matches!(require_nonempty(&missing), Err(Error::FileNotFound { .. })));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(require_nonempty(&empty), Err(Error::FileEmpty { .. })));

        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        assert!(matches!(require_nonempty(&sub), Err(Error::FileEmpty { .. })));

        std::fs::write(sub.join("a.txt"), "x").unwrap();
        assert!(require_nonempty(&sub).is_ok());
        assert!(require_nonempty(sub.join("a.txt")).is_ok());
    }
}
