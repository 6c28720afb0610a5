//! CLI command implementations.

pub mod common;
pub mod delete;
pub mod jobs;
pub mod quota;
pub mod result;
pub mod run;
pub mod status;
pub mod version;
