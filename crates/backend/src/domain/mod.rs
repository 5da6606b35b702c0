//! Domain types - core business entities
//!
//! Words and their scores, plus the configuration that drives a run. These
//! types are independent of the actor engine and of persistence.

pub mod config;
pub mod word;
