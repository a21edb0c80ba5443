pub mod env;
pub mod err;
pub mod reqwest_helper;
pub mod retry;
