use crate::raster::luma;
use crate::render::{Renderer, Screen, begin_paint, end_paint, sample_grid, write_fg};
use std::io::Write;

pub struct AsciiRenderer {
    last_fg: Option<[u8; 3]>,
}

impl AsciiRenderer {
    pub fn new() -> Self {
        Self { last_fg: None }
    }
}

impl Default for AsciiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for AsciiRenderer {
    fn name(&self) -> &'static str {
        "ascii"
    }

    fn render(&mut self, screen: &Screen<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((cols, rows)) = begin_paint(screen, out)? else {
            return Ok(());
        };
        self.last_fg = None;

        // Dark -> bright.
        const RAMP: &[u8] = b" .,:;irsXA253hMHGS#9B&@";

        for y in 0..rows {
            for x in 0..cols {
                let rgb = sample_grid(screen.frame, cols, rows, x, y);
                let l = luma(rgb[0], rgb[1], rgb[2]) as usize;
                let ch = RAMP[l * (RAMP.len() - 1) / 255];

                if self.last_fg != Some(rgb) {
                    write_fg(out, rgb)?;
                    self.last_fg = Some(rgb);
                }
                out.write_all(&[ch])?;
            }
            out.write_all(b"\r\n")?;
        }

        end_paint(screen, cols, rows, out)
    }
}
