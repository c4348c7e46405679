//! Quest - natural-language questions answered from a SQL Server database.
//!
//! This library exposes the core modules for use in integration tests.

pub mod audit;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod sql;
