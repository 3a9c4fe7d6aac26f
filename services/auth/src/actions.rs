//! Account actions
//!
//! Passwords travel only to the record store; they are never logged nor
//! echoed back in validation failures.

pub mod account;
pub mod profile;
