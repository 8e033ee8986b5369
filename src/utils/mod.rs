pub mod config;
pub mod file_helpers;

pub use config::*;
pub use file_helpers::*;
