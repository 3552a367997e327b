//! # Rendering Module
//!
//! Software rendering of labels for preview and raster printing.
//!
//! ## Modules
//!
//! - [`barcode`]: Code 128 encoding and bare glyph drawing
//! - [`font`]: Caption font (TrueType with bitmap fallback)
//! - [`label`]: Single-label composition
//! - [`grid`]: Four-column preview sheet
//! - [`export`]: DPI-tagged PNG output
//!
//! ## Usage Example
//!
//! ```
//! use seatlabel::printer::LabelSpec;
//! use seatlabel::render::{compose_grid, CaptionFont, LabelComposer};
//!
//! let spec = LabelSpec::new(60.0, 40.0, 203)?;
//! let composer = LabelComposer::new(spec, CaptionFont::builtin());
//!
//! let label = composer.compose("ABC123")?;
//! assert_eq!(label.image.dimensions(), (480, 320));
//!
//! let sheet = compose_grid(&[label.image]).unwrap();
//! assert_eq!(sheet.width(), 4 * 480 + 5 * 10);
//! # Ok::<(), seatlabel::LabelError>(())
//! ```

pub mod barcode;
pub mod export;
pub mod font;
pub mod grid;
pub mod label;

pub use export::save_png;
pub use font::CaptionFont;
pub use grid::compose_grid;
pub use label::{GlyphPlacement, LabelComposer, RenderedLabel};
