pub mod deployment;
pub mod function;
pub mod worker;
