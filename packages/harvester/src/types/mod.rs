//! Data types shared across the harvester.

pub mod category;
pub mod config;
pub mod outcome;
pub mod payload;
pub mod record;
pub mod signal;
