mod fanout;
mod runner;
mod stage;
mod toolenv;

pub use fanout::FanOut;
pub use fanout::FanOutJob;
pub use fanout::FanOutReport;
pub use fanout::DEFAULT_MAX_CONCURRENT;

pub use runner::Pipeline;
pub use runner::PipelineReport;

pub use stage::Builtin;
pub use stage::ExternalCommand;
pub use stage::Stage;
pub use stage::StageAction;
pub use stage::StageStatus;

pub use toolenv::ToolEnv;
