//! # Workflows Module
//!
//! High-level procedures that combine the geometry engine and the engine
//! layer into complete dataset operations.
//!
//! ## Architecture
//!
//! - **Screening Workflow** ([`screen`]) - Flags frames with unphysical contacts and reports
//!   bond and cluster statistics for every frame
//! - **Configuration** ([`config`]) - TOML-backed thresholds with defaults, validation and a builder

pub mod config;
pub mod screen;
