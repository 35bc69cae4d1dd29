//! # hiercad I/O
//!
//! CIF output for hiercad designs. Repeated fragments are compiled once into
//! CIF subroutines and called wherever the call transform allows it.

pub mod cif;
pub mod settings;

pub use cif::{compile, CifError, CifSummary, CifWriter, Subject};
pub use settings::CifSettings;
