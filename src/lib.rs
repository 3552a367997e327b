//! # Seatlabel - Exam Seat Label Printing
//!
//! Seatlabel prints Code 128 seat labels for exam candidates on thermal
//! label printers (Xprinter XP-365B and other TSPL printers). It provides:
//!
//! - **Label rendering**: barcode glyph, fit-and-rotate onto the label canvas, caption
//! - **Grid preview**: all labels of a batch on one sheet
//! - **Printer commands**: TSPL scripts, barcode drawn by the printer firmware
//! - **Raster printing**: page-per-label jobs with scale snapping and centering
//! - **Exam records**: semesters, dates, modules and seat assignments
//!
//! ## Quick Start
//!
//! ```
//! use seatlabel::{
//!     printer::LabelSpec,
//!     protocol::tspl,
//!     render::{CaptionFont, LabelComposer},
//! };
//!
//! // 60 x 40 mm label at 203 DPI
//! let spec = LabelSpec::new(60.0, 40.0, 203)?;
//! let composer = LabelComposer::new(spec, CaptionFont::builtin());
//!
//! let label = composer.compose("ABC123")?;
//! assert_eq!((label.width(), label.height()), (480, 320));
//!
//! // Same label as printer commands
//! let lines = tspl::label_block("ABC123", "Hall A");
//! assert_eq!(lines[0], r#"BARCODE 30,30,"128",100,1,0,2,2,"ABC123""#);
//!
//! # Ok::<(), seatlabel::error::LabelError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`render`] | Barcode glyphs, label composer, grid preview, PNG export |
//! | [`protocol`] | TSPL command builders |
//! | [`transport`] | Spooler, page devices, raster transmitter |
//! | [`output`] | Preview and command outputs for record batches |
//! | [`printing`] | Print jobs from settings |
//! | [`records`] | Exam record queries |
//! | [`session`] | Operator session and print status |
//! | [`task`] | Background tasks with completion channel |
//! | [`server`] | HTTP API |
//! | [`config`] | Settings file |
//! | [`printer`] | Printer and label geometry |
//! | [`error`] | Error types |

pub mod config;
pub mod error;
pub mod output;
pub mod printer;
pub mod printing;
pub mod protocol;
pub mod records;
pub mod render;
pub mod server;
pub mod session;
pub mod task;
pub mod transport;

// Re-exports for convenience
pub use config::Settings;
pub use error::LabelError;
pub use printer::{LabelSpec, PrinterConfig};
