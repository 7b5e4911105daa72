//! Core types, collaborator traits, and the attendance decision logic for Pew.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! storage backend (`pew-store-sqlite`), the recognition service client
//! (`pew-compreface`), and the HTTP layer (`pew-api`) all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod attendance;
pub mod clock;
pub mod error;
pub mod image;
pub mod member;
pub mod photo;
pub mod pipeline;
pub mod recognition;
pub mod registration;
pub mod removal;
pub mod store;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;
