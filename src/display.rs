use crate::memory::{DISPLAY_HEIGHT, DISPLAY_SIZE, DISPLAY_WIDTH};
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Display is used by the interpreter to put the framebuffer on a screen. It
/// should abstract the implementation details, so a variety of kinds of
/// screen would work.
///
/// The interpreter calls `present` at most once per step, and only when
/// pixels changed. `data` is packed one bit per pixel, MSB leftmost, rows of
/// `width / 8` bytes.
pub trait Display {
    fn present(&mut self, width: usize, height: usize, data: &[u8]) -> Result<(), io::Error>;
}

impl<D: Display + ?Sized> Display for &mut D {
    fn present(&mut self, width: usize, height: usize, data: &[u8]) -> Result<(), io::Error> {
        (**self).present(width, height, data)
    }
}

// store useful metadata about the terminal
struct Resolution(usize, usize);

impl Resolution {
    fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn byte_count(&self) -> usize {
        self.pixel_count() / 8
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// (x, y) canvas coords of every pixel that is `lit`
    fn bitplane_from_data<'a>(
        &self,
        data: &'a [u8],
        lit: bool,
    ) -> impl std::iter::Iterator<Item = (f64, f64)> + 'a {
        let mut count = self.pixel_count();
        let w = self.0;
        std::iter::from_fn(move || {
            while count > 0 {
                count -= 1;
                let bit = 1 & (data[count / 8] >> (7 - count % 8));
                if (bit == 1) == lit {
                    return Some((
                        (count % w) as f64,        // x
                        -1.0 * (count / w) as f64, // y
                    ));
                }
            }
            None
        })
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl MonoTermDisplay {
    pub fn new() -> Result<MonoTermDisplay, io::Error> {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(MonoTermDisplay { terminal })
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
    }
}

impl Display for MonoTermDisplay {
    fn present(&mut self, width: usize, height: usize, data: &[u8]) -> Result<(), io::Error> {
        let resolution = Resolution(width, height);
        if data.len() != resolution.byte_count() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{}x{} display needs {} bytes, got {}",
                    width,
                    height,
                    resolution.byte_count(),
                    data.len()
                ),
            ));
        }

        // for now this assumes a 1:1 ratio between terminal cells, chip8
        // pixels and the internal TUI canvas
        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + width as u16, 2 + height as u16);

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &resolution.bitplane_from_data(data, false).collect::<Vec<_>>(),
                        color: Color::Black,
                    });
                    ctx.draw(&Points {
                        coords: &resolution.bitplane_from_data(data, true).collect::<Vec<_>>(),
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

/// keeps the last frame instead of drawing it; for tests and `--headless`
#[derive(Debug)]
pub struct HeadlessDisplay {
    frames: usize,
    last: Vec<u8>,
}

impl Default for HeadlessDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        HeadlessDisplay {
            frames: 0,
            last: vec![0; DISPLAY_SIZE],
        }
    }

    /// how many times the interpreter presented
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn last_frame(&self) -> &[u8] {
        &self.last
    }
}

impl Display for HeadlessDisplay {
    fn present(&mut self, _width: usize, _height: usize, data: &[u8]) -> Result<(), io::Error> {
        self.frames += 1;
        self.last.clear();
        self.last.extend_from_slice(data);
        Ok(())
    }
}

/// a 64x32 framebuffer as text, `#` for lit pixels, one line per row
pub fn render_text(data: &[u8]) -> String {
    let resolution = Resolution(DISPLAY_WIDTH, DISPLAY_HEIGHT);
    let mut rows = vec![vec![' '; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
    for (x, y) in resolution.bitplane_from_data(data, true) {
        rows[(-y) as usize][x as usize] = '#';
    }
    rows.into_iter()
        .map(|row| row.into_iter().collect::<String>().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Resolution tests
    #[test]
    fn test_pixel_count() {
        let r = Resolution(64, 32);
        assert_eq!(r.pixel_count(), 2048)
    }

    #[test]
    fn test_byte_count() {
        let r = Resolution(64, 32);
        assert_eq!(r.byte_count(), 256)
    }

    #[test]
    fn test_bounds() {
        let r = Resolution(64, 32);
        assert_eq!(r.x_bounds(), [0.0, 63.0]);
        assert_eq!(r.y_bounds(), [-31.0, 0.0]);
    }

    #[test]
    fn test_bitplane_splits_pixels() {
        let r = Resolution(64, 32);
        let mut data = [0u8; 256];
        data[0] = 0x80;
        data[9] = 0x01; // x = 15, y = 1
        let mut lit = r.bitplane_from_data(&data, true).collect::<Vec<_>>();
        lit.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(lit, vec![(0.0, 0.0), (15.0, -1.0)]);
        assert_eq!(r.bitplane_from_data(&data, false).count(), 2046);
    }

    #[test]
    fn test_headless_keeps_last_frame() -> Result<(), io::Error> {
        let mut d = HeadlessDisplay::new();
        d.present(64, 32, &[0xff; 256])?;
        d.present(64, 32, &[0x0f; 256])?;
        assert_eq!(d.frames(), 2);
        assert_eq!(d.last_frame()[255], 0x0f);
        Ok(())
    }

    #[test]
    fn test_render_text() {
        let mut data = [0u8; 256];
        data[0] = 0xa0;
        data[8] = 0x40;
        let text = render_text(&data);
        let lines = text.split('\n').collect::<Vec<_>>();
        assert_eq!(lines.len(), 32);
        assert_eq!(lines[0], "# #");
        assert_eq!(lines[1], " #");
        assert_eq!(lines[2], "");
    }
}
