pub mod job;
pub mod postprocess;
pub mod process;
pub mod queue;

pub use job::JobReport;
pub use queue::DownloadState;
