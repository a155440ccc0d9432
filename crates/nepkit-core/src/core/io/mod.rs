//! Provides input/output for atomic-structure datasets.
//!
//! Two on-disk layouts are supported: the extended-XYZ text format, where
//! every frame carries a self-describing header line, and the columnar
//! `type.raw` + `set.*/*.npy` dataset directories. Multi-frame text files
//! share the [`traits::StructureFile`] interface; dataset directories are
//! handled by the free functions in [`npy`].

pub mod npy;
pub mod traits;
pub mod xyz;
