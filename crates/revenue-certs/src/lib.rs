//! Certificate request workflow for the revenue department.
//!
//! Applications move through human-gated review stages under a static role/edge table.
//! Final approval synthesizes a signed, write-once certificate that the public
//! verification surface serves back by number.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
