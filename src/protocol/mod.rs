//! # Printer Protocols
//!
//! Command languages understood by label printers.
//!
//! ## Modules
//!
//! - [`tspl`]: TSPL text commands (SIZE, GAP, BARCODE, TEXT, PRINT...)
//!
//! ## Example
//!
//! ```
//! use seatlabel::config::MissingBarcodePolicy;
//! use seatlabel::protocol::tspl::{self, MediaSize};
//! use seatlabel::records::StudentRecord;
//!
//! let student = StudentRecord {
//!     student_id: "S1".into(),
//!     barcode: Some("X1".into()),
//!     venue_name: "Hall A".into(),
//!     ..Default::default()
//! };
//!
//! let script = tspl::emit(&[student], &MediaSize::default(), MissingBarcodePolicy::Skip);
//! assert_eq!(script.lines.len(), 8);
//! ```

pub mod tspl;
