//! # Printer Module
//!
//! Printer hardware constants, label geometry and unit conversion.
//!
//! ## Modules
//!
//! - [`config`]: Printer specifications, [`LabelSpec`], mm→pixel conversion

pub mod config;

pub use config::{LabelSpec, PrinterConfig, mm_to_offset, mm_to_pixels};
