pub mod download_coordinator;
pub mod pipeline;
pub mod save;

pub use download_coordinator::{DownloadCoordinator, RunSettings};
