use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use log::{debug, info, warn};

use crate::runtime::Error;
use crate::utils::command_to_string;

use super::ToolEnv;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    /// Non-zero exit; None if the process was killed by a signal
    Failed { code: Option<i32> },
}

/// The work done by one stage or one fan-out job
pub trait StageAction: Send + Sync {
    /// One-line description for logs and dry runs
    fn describe(&self) -> String;

    fn execute(&self) -> anyhow::Result<StageStatus>;
}

///////////////////////////////
/// An external tool or script, run as a subprocess
#[derive(Clone, Debug)]
pub struct ExternalCommand {
    program: OsString,
    args: Vec<OsString>,
    env: ToolEnv,
    current_dir: Option<PathBuf>,
    stdout_to: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new<S: AsRef<OsStr>>(program: S) -> ExternalCommand {
        ExternalCommand {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env: ToolEnv::Inherit,
            current_dir: None,
            stdout_to: None,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_os_string());
        }
        self
    }

    pub fn env(mut self, env: ToolEnv) -> Self {
        self.env = env;
        self
    }

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Tools like bedtools write their result to stdout
    pub fn stdout_to<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.stdout_to = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = self.env.command(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl StageAction for ExternalCommand {
    fn describe(&self) -> String {
        let cmd = command_to_string(&self.to_command());
        match &self.stdout_to {
            Some(path) => format!("{} > {}", cmd, path.display()),
            None => cmd,
        }
    }

    fn execute(&self) -> anyhow::Result<StageStatus> {
        let mut cmd = self.to_command();
        match &self.stdout_to {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }
        cmd.stderr(Stdio::piped());

        debug!("Running {}", self.describe());
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied) => {
                return Err(Error::utility_not_executable(cmd.get_program().to_string_lossy()).into());
            }
            Err(e) => return Err(e.into()),
        };

        //Long-running tools report progress as they go; pass it on line by line
        let program = self.program.to_string_lossy().to_string();
        let stdout_thread = child.stdout.take().map(|stdout| {
            let program = program.clone();
            std::thread::spawn(move || forward_lines(stdout, |line| debug!("{}: {}", program, line)))
        });
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, |line| info!("{}: {}", program, line));
        }
        if let Some(handle) = stdout_thread {
            let _ = handle.join();
        }

        let status = child.wait()?;
        if status.success() {
            Ok(StageStatus::Success)
        } else {
            warn!("{} exited with {}", program, status);
            //Do not leave a truncated result around for the next run to trip over
            if let Some(path) = &self.stdout_to {
                let _ = std::fs::remove_file(path);
            }
            Ok(StageStatus::Failed { code: status.code() })
        }
    }
}

/// Hand each line of a child's output to `log_line`. Output need not be UTF-8
fn forward_lines<R: Read, F: Fn(&str)>(stream: R, log_line: F) {
    let mut reader = BufReader::new(stream);
    let mut buf: Vec<u8> = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                log_line(line.trim_end_matches(['\n', '\r']));
            }
        }
    }
}

///////////////////////////////
/// A step implemented in this crate
pub struct Builtin {
    description: String,
    func: Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>,
}

impl Builtin {
    pub fn new<S, F>(description: S, func: F) -> Builtin
    where
        S: Into<String>,
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Builtin {
            description: description.into(),
            func: Box::new(func),
        }
    }
}

impl StageAction for Builtin {
    fn describe(&self) -> String {
        format!("(builtin) {}", self.description)
    }

    fn execute(&self) -> anyhow::Result<StageStatus> {
        (self.func)()?;
        Ok(StageStatus::Success)
    }
}

///////////////////////////////
/// One named step with the files it needs and the files it promises
pub struct Stage {
    pub name: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub action: Box<dyn StageAction>,
}

impl Stage {
    pub fn new<S: Into<String>, A: StageAction + 'static>(name: S, action: A) -> Stage {
        Stage {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            action: Box::new(action),
        }
    }

    pub fn input<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.inputs.extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    pub fn output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.outputs.push(path.as_ref().to_path_buf());
        self
    }

    pub fn outputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.outputs.extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_success_and_failure() {
        let ok = ExternalCommand::new("sh").arg("-c").arg("exit 0");
        assert_eq!(ok.execute().unwrap(), StageStatus::Success);

        let fail = ExternalCommand::new("sh").arg("-c").arg("echo oops >&2; exit 5");
        assert_eq!(fail.execute().unwrap(), StageStatus::Failed { code: Some(5) });
    }

    #[test]
    fn test_external_stdout_capture() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let cmd = ExternalCommand::new("sh")
            .args(["-c", "printf 'chr1\\t1\\t2\\n'"])
            .stdout_to(&out);
        assert_eq!(cmd.execute().unwrap(), StageStatus::Success);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "chr1\t1\t2\n");
        assert!(cmd.describe().ends_with(&format!("> {}", out.display())));
    }

    #[test]
    fn test_failed_capture_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let cmd = ExternalCommand::new("sh")
            .args(["-c", "echo partial; exit 1"])
            .stdout_to(&out);
        assert_eq!(cmd.execute().unwrap(), StageStatus::Failed { code: Some(1) });
        assert!(!out.exists());
    }

    #[test]
    fn test_forward_lines() {
        let collected = std::sync::Mutex::new(Vec::new());
        forward_lines(&b"iteration 1\r\niteration 2\n\xffdone"[..], |line| {
            collected.lock().unwrap().push(line.to_string())
        });
        assert_eq!(
            collected.into_inner().unwrap(),
            vec!["iteration 1", "iteration 2", "\u{fffd}done"]
        );
    }

    #[test]
    fn test_large_output_does_not_block() {
        let cmd = ExternalCommand::new("sh").args(["-c", "seq 1 200000; seq 1 200000 >&2; exit 0"]);
        assert_eq!(cmd.execute().unwrap(), StageStatus::Success);
    }

    #[test]
    fn test_missing_program() {
        let cmd = ExternalCommand::new("peakflow-no-such-tool");
        let err = cmd.execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UtilityNotExecutable { .. })
        ));
    }

    #[test]
    fn test_builtin() {
        let b = Builtin::new("noop", || Ok(()));
        assert_eq!(b.execute().unwrap(), StageStatus::Success);
        assert_eq!(b.describe(), "(builtin) noop");

        let b = Builtin::new("broken", || anyhow::bail!("nope"));
        assert!(b.execute().is_err());
    }
}
