//! # profile-auth CLI
//!
//! Thin command-line consumer of the `profile-auth` service, used to drive
//! sign-up, sign-in, sign-out and token retrieval by hand against either
//! provider.

pub mod cli;
pub mod error;
pub mod output;

pub use error::*;
