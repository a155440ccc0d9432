//! # NepKit Core Library
//!
//! Structure model, periodic geometry and dataset codecs for training sets of
//! neuroevolution potentials (NEP) and similar machine-learned interatomic
//! potentials.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Owned, cloneable [`Structure`](core::models::structure::Structure)
//!   values, the periodic table, geometry algorithms and the extended-XYZ and
//!   `.npy` dataset formats. Everything here is synchronous and deterministic.
//!
//! - **[`engine`]: The Model Boundary.** Encodes batches of structures for an
//!   external NEP evaluator and turns its flat replies back into energies,
//!   forces, virials and per-structure vectors. Also provides progress reporting.
//!
//! - **[`workflows`]: The Public API.** Complete dataset procedures such as
//!   geometry screening, configured from TOML.
//!
//! ## Features
//!
//! - `parallel` (default) - distance rows, frame parsing and screening run on rayon.
//!
//! The library emits `tracing` events but never installs a subscriber.

pub mod core;
pub mod engine;
pub mod workflows;
