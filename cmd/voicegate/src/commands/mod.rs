//! CLI commands module.

mod config;
mod enroll;
mod labels;
mod test;
mod util;

pub use config::ConfigCommand;
pub use enroll::EnrollCommand;
pub use labels::LabelsCommand;
pub use test::TestCommand;

pub(crate) use util::*;
