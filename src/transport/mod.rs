//! # Printer Transport Layer
//!
//! Getting labels out of the process and onto a printer.
//!
//! ## Available Transports
//!
//! - [`spooler`]: printer discovery and raw command jobs (CUPS `lp`, or a device node)
//! - [`page`]: page devices for raster jobs (PNG directory, spooled PNG job)
//! - [`raster`]: image placement and best-effort page-per-label transmission

pub mod page;
pub mod raster;
pub mod spooler;

pub use page::{DirectoryPageDevice, PageDevice, SpoolPageDevice};
pub use raster::{JobReport, PageOutcome, Placement, transmit};
pub use spooler::{PrinterTarget, resolve_printer, send_raw};
