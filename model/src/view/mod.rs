pub mod deploy;
pub mod deployment;
pub mod registry;
