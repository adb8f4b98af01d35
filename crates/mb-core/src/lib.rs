//! Core domain + control logic for the mention bot.
//!
//! This crate is intentionally transport-agnostic. The remote feed (Twitter today)
//! lives behind the [`feed::port::FeedPort`] trait implemented in adapter crates.

pub mod catalog;
pub mod config;
pub mod control;
pub mod domain;
pub mod errors;
pub mod failure;
pub mod feed;
pub mod logging;
pub mod report;
pub mod selector;

pub use errors::{Error, Result};
