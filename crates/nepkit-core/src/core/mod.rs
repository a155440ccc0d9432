//! # Core Module
//!
//! The data model, geometry algorithms and file formats for atomic-structure
//! datasets used to train and evaluate machine-learned interatomic potentials.
//!
//! ## Architecture
//!
//! - **Periodic Table** ([`elements`]) - Symbols, atomic numbers and covalent radii
//! - **Structure Representation** ([`models`]) - Frames with cell, species, positions,
//!   per-atom columns and frame-level fields
//! - **Geometry** ([`geometry`]) - Minimum-image distances, bonds, clusters, unwrapping and supercells
//! - **File I/O** ([`io`]) - Extended-XYZ text files and columnar `.npy` dataset directories
//!
//! ## Conventions
//!
//! - Lattices are 3×3 matrices whose rows are the lattice vectors `a`, `b`, `c`.
//! - Lengths are in Å, energies in eV, angles in degrees.
//! - Fractional and Cartesian coordinates are related by `r = Lᵀ·s`.

pub mod elements;
pub mod geometry;
pub mod io;
pub mod models;
