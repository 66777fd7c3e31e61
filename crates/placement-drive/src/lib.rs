//! Placement-drive round progression engine.
//!
//! Drives are recruiting cycles run by one company; each drive is split into sequential
//! rounds and every approved applicant carries a progress record that the selection
//! processor advances round by round until the student is placed or rejected.

pub mod config;
pub mod drives;
pub mod error;
pub mod telemetry;
