//! # Engine Module
//!
//! The boundary between structure datasets and a NEP model evaluator.
//!
//! ## Overview
//!
//! The evaluator itself is external. This module owns the two sides of the
//! contract: encoding a batch of structures into the flat buffers an
//! evaluator consumes, and reshaping the flat buffers it returns into
//! per-structure energies, per-atom forces, virials and fixed-width
//! per-structure vectors.
//!
//! ## Architecture
//!
//! - **Batch encoding** ([`batch`]) - [`batch::BatchRequest`], calculation modes and the
//!   [`batch::BatchBackend`] capability an evaluator implements
//! - **Aggregation** ([`calculator`]) - [`calculator::NepCalculator`], which submits batches and
//!   validates and reshapes the replies
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events for long operations
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! A backend may run the model in-process or forward the request to a
//! worker process; nothing here depends on which.

pub mod batch;
pub mod calculator;
pub mod error;
pub mod progress;
