mod ascii;
mod halfblock;

pub use ascii::AsciiRenderer;
pub use halfblock::HalfBlockRenderer;

use crate::raster::Frame;
use std::io::Write;

/// One terminal repaint: the frame is resampled onto the visual area, the HUD
/// fills the rows below it.
pub struct Screen<'a> {
    pub term_cols: u16,
    pub visual_rows: u16,
    pub frame: &'a Frame,
    pub hud: &'a str,
    pub hud_rows: u16,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn name(&self) -> &'static str;
    fn render(&mut self, screen: &Screen<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Nearest-neighbour lookup of grid cell `(gx, gy)` on a `grid_w` x `grid_h`
/// grid stretched over the whole frame.
pub(crate) fn sample_grid(frame: &Frame, grid_w: usize, grid_h: usize, gx: usize, gy: usize) -> [u8; 3] {
    let x = (gx * frame.width() / grid_w.max(1)).min(frame.width() - 1);
    let y = (gy * frame.height() / grid_h.max(1)).min(frame.height() - 1);
    frame.pixel(x, y)
}

/// Starts a repaint. Returns `None` (and writes nothing) when there is no
/// visual area to paint.
pub(crate) fn begin_paint(screen: &Screen<'_>, out: &mut dyn Write) -> anyhow::Result<Option<(usize, usize)>> {
    let cols = screen.term_cols as usize;
    let rows = screen.visual_rows as usize;
    if cols == 0 || rows == 0 {
        return Ok(None);
    }
    if screen.sync_updates {
        out.write_all(b"\x1b[?2026h")?;
    }
    // Home, reset, and disable autowrap (DECAWM) so painting the last column
    // does not push the cursor onto the next line.
    out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
    Ok(Some((cols, rows)))
}

pub(crate) fn end_paint(screen: &Screen<'_>, cols: usize, rows: usize, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut hud_lines = screen.hud.lines();
    for i in 0..(screen.hud_rows as usize) {
        write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", rows + i + 1)?;
        if let Some(line) = hud_lines.next() {
            let clipped: String = line.chars().take(cols).collect();
            write!(out, "{clipped}")?;
        }
    }

    out.write_all(b"\x1b[?7h")?;
    if screen.sync_updates {
        out.write_all(b"\x1b[?2026l")?;
    }
    out.flush()?;
    Ok(())
}

pub(crate) fn write_fg(out: &mut dyn Write, [r, g, b]: [u8; 3]) -> std::io::Result<()> {
    write!(out, "\x1b[38;2;{r};{g};{b}m")
}

pub(crate) fn write_bg(out: &mut dyn Write, [r, g, b]: [u8; 3]) -> std::io::Result<()> {
    write!(out, "\x1b[48;2;{r};{g};{b}m")
}
