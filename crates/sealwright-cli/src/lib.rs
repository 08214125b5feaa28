//! Sealwright command-line front end.
//!
//! Commands are plain functions over a [`sealwright_lock::PasswordManager`];
//! the binary wires them to a [`dialog::TerminalDialog`] on stdin/stderr.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod dialog;
pub mod error;

pub use dialog::TerminalDialog;
pub use error::CliError;
