//! A small personal blog: article list, markdown posts, and an operator
//! publishing flow keyed by date-based article ids.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
