//! Language Server Protocol front end.
//!
//! [`server`] owns the connection and the open documents; [`convert`] maps
//! core results onto `lsp-types` values.

pub mod convert;
pub mod server;

pub use server::{ServerResult, run, serve};
