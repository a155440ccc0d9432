//! # Core Models Module
//!
//! The in-memory representation of an atomic configuration and its metadata.
//!
//! ## Key Components
//!
//! - [`structure`] - The [`structure::Structure`] entity: cell, species, positions and derived quantities
//! - [`properties`] - Per-atom column schema (`name:kind:count`) and typed column storage
//! - [`fields`] - Frame-level fields such as energy, virial, stress, `pbc` and `config_type`
//!
//! ## Usage
//!
//! ```ignore
//! use nepkit::core::models::structure::Structure;
//! use nalgebra::{Matrix3, Vector3};
//!
//! let lattice = Matrix3::from_diagonal(&Vector3::new(10.0, 10.0, 10.0));
//! let mut water = Structure::new(
//!     Some(lattice),
//!     vec!["O".into(), "H".into(), "H".into()],
//!     vec![Vector3::zeros(), Vector3::new(0.96, 0.0, 0.0), Vector3::new(-0.24, 0.93, 0.0)],
//! )?;
//! water.fields.energy = Some(-14.2);
//! assert_eq!(water.formula(), "O1H2");
//! ```

pub mod fields;
pub mod properties;
pub mod structure;
