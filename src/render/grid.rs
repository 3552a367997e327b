//! Preview grid of rendered labels.
//!
//! Labels are laid out four per row on a light gray sheet so their white
//! edges stay visible:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ 10 ┌────┐ 10 ┌────┐ 10 ┌────┐ 10 ┌────┐ 10│
//! │    │ 1  │    │ 2  │    │ 3  │    │ 4  │   │
//! │    └────┘    └────┘    └────┘    └────┘   │
//! │    ┌────┐                                 │
//! │    │ 5  │                                 │
//! └──────────────────────────────────────────┘
//! ```

use image::{Rgb, RgbImage, imageops};
use tracing::info;

/// Labels per row.
pub const GRID_COLUMNS: u32 = 4;
/// Gap around and between cells, in pixels.
pub const GRID_SPACING: u32 = 10;
/// Sheet background.
pub const GRID_BACKGROUND: Rgb<u8> = Rgb([240, 240, 240]);

/// Arrange labels into a single preview image.
///
/// The first label's size sets the cell size for the whole grid; all labels
/// of one run share a spec. Returns `None` when there is nothing to show.
pub fn compose_grid(labels: &[RgbImage]) -> Option<RgbImage> {
    let first = labels.first()?;
    let (cell_w, cell_h) = first.dimensions();

    let count = labels.len() as u32;
    let rows = count.div_ceil(GRID_COLUMNS);

    let (grid_w, grid_h) = grid_size(cell_w, cell_h, rows);
    let mut grid = RgbImage::from_pixel(grid_w, grid_h, GRID_BACKGROUND);

    for (i, label) in labels.iter().enumerate() {
        let row = i as u32 / GRID_COLUMNS;
        let col = i as u32 % GRID_COLUMNS;

        let x = GRID_SPACING + col * (cell_w + GRID_SPACING);
        let y = GRID_SPACING + row * (cell_h + GRID_SPACING);

        imageops::replace(&mut grid, label, x as i64, y as i64);
    }

    info!(
        "Created preview grid: {} labels in {} row(s) x {} column(s)",
        count, rows, GRID_COLUMNS
    );
    Some(grid)
}

/// Sheet size for `rows` rows of `cell_w` × `cell_h` cells.
pub fn grid_size(cell_w: u32, cell_h: u32, rows: u32) -> (u32, u32) {
    (
        cell_w * GRID_COLUMNS + GRID_SPACING * (GRID_COLUMNS + 1),
        cell_h * rows + GRID_SPACING * (rows + 1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_empty_grid_is_none() {
        assert!(compose_grid(&[]).is_none());
    }

    #[test]
    fn test_single_row() {
        let grid = compose_grid(&[label(48, 32), label(48, 32)]).unwrap();
        assert_eq!(grid.dimensions(), (4 * 48 + 5 * 10, 32 + 2 * 10));
    }

    #[test]
    fn test_rows_round_up() {
        let labels: Vec<_> = (0..5).map(|_| label(48, 32)).collect();
        let grid = compose_grid(&labels).unwrap();
        assert_eq!(grid.dimensions(), (242, 2 * 32 + 3 * 10));
    }

    #[test]
    fn test_cells_and_background() {
        let grid = compose_grid(&[label(20, 20)]).unwrap();
        assert_eq!(*grid.get_pixel(0, 0), GRID_BACKGROUND);
        assert_eq!(*grid.get_pixel(10, 10), Rgb([255, 255, 255]));
        assert_eq!(*grid.get_pixel(29, 29), Rgb([255, 255, 255]));
        assert_eq!(*grid.get_pixel(30, 30), GRID_BACKGROUND);
        // Empty columns stay background
        assert_eq!(*grid.get_pixel(45, 15), GRID_BACKGROUND);
    }

    #[test]
    fn test_fifth_label_wraps() {
        let mut labels: Vec<_> = (0..4).map(|_| label(20, 20)).collect();
        labels.push(RgbImage::from_pixel(20, 20, Rgb([0, 0, 0])));
        let grid = compose_grid(&labels).unwrap();
        assert_eq!(*grid.get_pixel(10, 40), Rgb([0, 0, 0]));
    }
}
