//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod flatfile;
pub mod http;
pub mod media;
pub mod telemetry;
