//! External process execution
//!
//! Every external tool (dump, restore, cipher, catalog shell) is started
//! through a [`ProcessRunner`], which bounds the run with a hard timeout and
//! returns combined output. Tests substitute a scripted runner.

mod command;
mod runner;

pub use command::CommandLine;
pub use runner::{FailureCause, ProcessFailure, ProcessRunner, SystemRunner};
