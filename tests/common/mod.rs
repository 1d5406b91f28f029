//! Integration test common infrastructure.
//!
//! Provides a stand-in identity provider and utilities for spawning
//! dropoffd instances against it.

#![allow(dead_code)]

pub mod idp;
pub mod server;

#[allow(unused_imports)]
pub use idp::Idp;
#[allow(unused_imports)]
pub use server::TestServer;
