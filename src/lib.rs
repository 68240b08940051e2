//! Track the time spent on a handful of named tasks. Every start/stop cycle
//! of a task produces a record; finished records are kept in a store and can
//! be evaluated over a period of days.

pub mod cli;
pub mod db;
pub mod error;
pub mod interface;
pub mod logging;
pub mod manager;
pub mod record;
pub mod store;
pub mod task;

pub use error::{Error, Result};
