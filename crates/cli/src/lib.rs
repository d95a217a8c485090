//! vmtest CLI
//!
//! Runs test scripts against VMs, lists available test cases and
//! executes whole suites with an HTML overview.

pub mod commands;
pub mod logging;
pub mod output;
pub mod report;
pub mod suite;
pub mod testcase;
pub mod timelapse;
