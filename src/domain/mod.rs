//! Domain layer types and invariants.

pub mod accounts;
pub mod article_id;
pub mod articles;
pub mod entities;
pub mod error;
