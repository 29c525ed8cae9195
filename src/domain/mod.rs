pub mod error;
pub mod model;
pub mod platform;

pub use error::{AppError, TaskFailure};
pub use model::{ImageTask, ProgressState, RunEvent, RunOutcome, StatusIndicator, StatusTone, TaskOutcome};
pub use platform::PlatformClass;
