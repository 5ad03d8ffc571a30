use std::ffi::OsStr;
use std::process::Command;

/// Where an external tool is run from. Each stage names its environment
/// explicitly instead of relying on whatever the calling shell activated
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolEnv {
    /// Use the tool from the current $PATH
    Inherit,
    /// Run the tool inside a named conda environment
    Conda { env_name: String },
}

impl ToolEnv {
    pub fn from_name(name: &Option<String>) -> ToolEnv {
        match name {
            Some(env_name) if !env_name.is_empty() => ToolEnv::Conda {
                env_name: env_name.clone(),
            },
            _ => ToolEnv::Inherit,
        }
    }

    /// Build the process that runs `program` in this environment
    pub fn command<S: AsRef<OsStr>>(&self, program: S) -> Command {
        match self {
            ToolEnv::Inherit => Command::new(program),
            ToolEnv::Conda { env_name } => {
                let mut cmd = Command::new("conda");
                cmd.arg("run")
                    .arg("-n")
                    .arg(env_name)
                    .arg("--no-capture-output")
                    .arg(program);
                cmd
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::command_to_string;

    #[test]
    fn test_inherit() {
        let cmd = ToolEnv::Inherit.command("bedtools");
        assert_eq!(command_to_string(&cmd), "bedtools");
    }

    #[test]
    fn test_conda_wraps_program() {
        let env = ToolEnv::from_name(&Some("scopen".to_string()));
        let mut cmd = env.command("scopen");
        cmd.arg("--help");
        assert_eq!(
            command_to_string(&cmd),
            "conda run -n scopen --no-capture-output scopen --help"
        );
    }

    #[test]
    fn test_empty_name_inherits() {
        assert_eq!(ToolEnv::from_name(&Some(String::new())), ToolEnv::Inherit);
        assert_eq!(ToolEnv::from_name(&None), ToolEnv::Inherit);
    }
}
