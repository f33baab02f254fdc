//! `uocc-cli`: the UOCC survey sync job.
//!
//! The binary (`uocc-skid`) is a thin shell over [`skid::run`]; everything it
//! does is reachable from here so the stages can be driven against in-memory
//! sheets and mock services.

pub mod error;
pub mod exit_codes;
pub mod locations;
pub mod logging;
pub mod skid;
pub mod summary;

pub use error::SkidError;
pub use logging::RunLog;
pub use skid::{cleanup, connect, run, Skid};
pub use summary::{DistrictOutcome, DistrictResult, RunSummary};
