use crate::pipeline::cursor::ScanAxis;
use crate::shared::Overlay;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::Frame;

const HALF_BLOCK: &str = "▀";
const POINT: &str = "●";
const SCAN_COLOR: Color = Color::Yellow;
const POINT_COLOR: Color = Color::LightRed;

// nearest pixel for a cell (or half cell) along one dimension
fn to_pixel(cell: u32, cells: u32, pixels: u32) -> u32 {
    if cells == 0 || pixels == 0 {
        return 0;
    }
    ((cell as u64 * pixels as u64 / cells as u64) as u32).min(pixels - 1)
}

fn to_cell(pixel: u32, pixels: u32, cells: u32) -> u32 {
    if cells == 0 || pixels == 0 {
        return 0;
    }
    ((pixel as u64 * cells as u64 / pixels as u64) as u32).min(cells - 1)
}

fn rgb(p: [u8; 4]) -> Color {
    // premultiply against black so transparent areas read as background
    let a = p[3] as u16;
    let f = |c: u8| ((c as u16 * a) / 255) as u8;
    Color::Rgb(f(p[0]), f(p[1]), f(p[2]))
}

// each cell shows two pixel rows: the top as fg of a half block, the bottom as bg
pub fn draw_frame(frame: &mut Frame, area: Rect, overlay: &Overlay) {
    let Some(img) = overlay.frame.as_ref() else {
        return;
    };
    let (iw, ih) = img.dimensions();
    let (cols, rows) = (area.width as u32, area.height as u32);
    let buf = frame.buffer_mut();

    for cy in 0..rows {
        let top = to_pixel(cy * 2, rows * 2, ih);
        let bottom = to_pixel(cy * 2 + 1, rows * 2, ih);
        for cx in 0..cols {
            let px = to_pixel(cx, cols, iw);
            let pos = (area.x + cx as u16, area.y + cy as u16);
            if let Some(cell) = buf.cell_mut(pos) {
                cell.set_symbol(HALF_BLOCK)
                    .set_fg(rgb(img.get_pixel(px, top).0))
                    .set_bg(rgb(img.get_pixel(px, bottom).0));
            }
        }
    }

    // scan line
    match overlay.axis {
        Some(ScanAxis::Horizontal) => {
            let cx = to_cell(overlay.scan, iw, cols);
            for cy in 0..rows {
                if let Some(cell) = buf.cell_mut((area.x + cx as u16, area.y + cy as u16)) {
                    cell.set_fg(SCAN_COLOR);
                }
            }
        }
        Some(ScanAxis::Vertical) => {
            let cy = to_cell(overlay.scan, ih, rows);
            for cx in 0..cols {
                if let Some(cell) = buf.cell_mut((area.x + cx as u16, area.y + cy as u16)) {
                    cell.set_fg(SCAN_COLOR);
                }
            }
        }
        None => {}
    }

    for &(x, y) in &overlay.points {
        let pos = (area.x + to_cell(x, iw, cols) as u16, area.y + to_cell(y, ih, rows) as u16);
        if let Some(cell) = buf.cell_mut(pos) {
            cell.set_symbol(POINT).set_fg(POINT_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_pixel_mapping_stays_in_bounds() {
        assert_eq!(to_pixel(0, 10, 100), 0);
        assert_eq!(to_pixel(9, 10, 100), 90);
        assert_eq!(to_pixel(19, 20, 7), 6);
        assert_eq!(to_cell(99, 100, 10), 9);
        assert_eq!(to_cell(500, 100, 10), 9);
        assert_eq!(to_pixel(3, 0, 100), 0);
        assert_eq!(to_cell(3, 100, 0), 0);
    }

    #[test]
    fn transparent_pixels_go_dark() {
        assert_eq!(rgb([255, 128, 0, 255]), Color::Rgb(255, 128, 0));
        assert_eq!(rgb([255, 255, 255, 0]), Color::Rgb(0, 0, 0));
    }
}
