//! Static file server with content hash `ETag`s and conditional requests
//!
//! Exposes the request pipeline and its collaborators for the binary and the
//! integration tests.

pub mod cli;
pub mod config;
pub mod consts;
pub mod error;
pub mod http;
pub mod middlewares;
pub mod utils;
