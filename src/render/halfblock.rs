use crate::render::{Renderer, Screen, begin_paint, end_paint, sample_grid, write_bg, write_fg};
use std::io::Write;

/// Two pixels per cell: the upper half block takes the top pixel as
/// foreground and the bottom pixel as background.
pub struct HalfBlockRenderer {
    last_fg: Option<[u8; 3]>,
    last_bg: Option<[u8; 3]>,
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }
}

impl Default for HalfBlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for HalfBlockRenderer {
    fn name(&self) -> &'static str {
        "halfblock"
    }

    fn render(&mut self, screen: &Screen<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((cols, rows)) = begin_paint(screen, out)? else {
            return Ok(());
        };
        self.last_fg = None;
        self.last_bg = None;

        const HALF_BLOCK: char = '\u{2580}';
        let grid_h = rows * 2;

        for row in 0..rows {
            for x in 0..cols {
                let top = sample_grid(screen.frame, cols, grid_h, x, row * 2);
                let bottom = sample_grid(screen.frame, cols, grid_h, x, row * 2 + 1);

                if self.last_fg != Some(top) {
                    write_fg(out, top)?;
                    self.last_fg = Some(top);
                }
                if self.last_bg != Some(bottom) {
                    write_bg(out, bottom)?;
                    self.last_bg = Some(bottom);
                }
                write!(out, "{HALF_BLOCK}")?;
            }
            out.write_all(b"\r\n")?;
        }

        end_paint(screen, cols, rows, out)
    }
}
