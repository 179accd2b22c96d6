//! Core types and trait definitions for the gradebook result engine.
//!
//! Holds the pure pipeline (aggregation, grading, ranking), the compiled
//! result document and its approval workflow, and the collaborator traits the
//! engine reads through. Free of HTTP and database dependencies.

// Native `async fn` in traits; the `Send` bounds are spelled out explicitly.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod error;
pub mod etag;
pub mod grading;
pub mod rank;
pub mod rating;
pub mod result;
pub mod school;
pub mod score;
pub mod store;
pub mod term;
pub mod workflow;

pub use error::{Error, Result};
