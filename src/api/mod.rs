pub mod client;
mod models;

pub use client::{PageClient, Result};
pub use models::{FetchConfig, ImageRef};
