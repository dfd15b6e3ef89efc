//! Application services layer.

pub mod articles;
pub mod auth;
pub mod chrome;
pub mod error;
pub mod render;
pub mod repos;
pub mod site;
