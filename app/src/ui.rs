use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use melodify_player::renderer::RollFrame;
use melodify_player::roll::KeyboardLayout;
use melodify_ports::types::Micros;
use std::io::Write;

/// "#RRGGBB" to a terminal color; anything else falls back to white.
pub fn parse_hex_color(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#');
    // The string comes from user-editable config; byte indexing below
    // needs every position to be a char boundary.
    if hex.len() != 6 || !hex.is_ascii() {
        return Color::White;
    }
    match (
        u8::from_str_radix(&hex[0..2], 16),
        u8::from_str_radix(&hex[2..4], 16),
        u8::from_str_radix(&hex[4..6], 16),
    ) {
        (Ok(r), Ok(g), Ok(b)) => Color::Rgb { r, g, b },
        _ => Color::White,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Cell {
    Empty,
    Block,
    Sounding,
}

pub struct TermUi {
    cols: u16,
    rows: u16,
    block_color: Color,
    press_color: Color,
}

impl TermUi {
    pub fn new(cols: u16, rows: u16, block_color: &str, press_color: &str) -> Self {
        Self {
            cols,
            rows,
            block_color: parse_hex_color(block_color),
            press_color: parse_hex_color(press_color),
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Rows available to the falling-note area: everything above the
    /// keyboard line and the status line.
    pub fn view_height(&self) -> f32 {
        f32::from(self.rows.saturating_sub(2).max(1))
    }

    pub fn draw(
        &self,
        out: &mut impl Write,
        layout: &KeyboardLayout,
        frame: &RollFrame,
        status: &str,
    ) -> Result<()> {
        let view_rows = self.rows.saturating_sub(2).max(1) as usize;
        let cols = self.cols.max(1) as usize;

        let mut grid = vec![Cell::Empty; view_rows * cols];
        for block in &frame.blocks {
            // A block sitting exactly on the keyboard line (playhead at its
            // end) or past the terminal edge has no cells to paint.
            let x0 = block.x.round() as usize;
            if x0 >= cols {
                continue;
            }
            let x1 = ((block.x + block.width).round() as usize).clamp(x0 + 1, cols);
            let y0 = block.top.floor().max(0.0) as usize;
            if y0 >= view_rows {
                continue;
            }
            let y1 = (block.bottom.ceil() as usize).clamp(y0 + 1, view_rows);
            let cell = if block.sounding {
                Cell::Sounding
            } else {
                Cell::Block
            };
            for y in y0..y1 {
                for x in x0..x1.min(cols) {
                    grid[y * cols + x] = cell;
                }
            }
        }

        queue!(out, Clear(ClearType::All))?;
        for y in 0..view_rows {
            queue!(out, MoveTo(0, y as u16))?;
            let mut current = Cell::Empty;
            let mut run = String::new();
            for x in 0..cols {
                let cell = grid[y * cols + x];
                if cell != current {
                    self.flush_run(out, current, &mut run)?;
                    current = cell;
                }
                run.push(match cell {
                    Cell::Empty => ' ',
                    Cell::Block | Cell::Sounding => '█',
                });
            }
            self.flush_run(out, current, &mut run)?;
        }

        self.draw_keyboard(out, layout, frame, view_rows as u16)?;

        queue!(
            out,
            MoveTo(0, self.rows.saturating_sub(1)),
            Clear(ClearType::CurrentLine),
            Print(status)
        )?;
        out.flush()?;
        Ok(())
    }

    fn flush_run(&self, out: &mut impl Write, cell: Cell, run: &mut String) -> Result<()> {
        if run.is_empty() {
            return Ok(());
        }
        match cell {
            Cell::Empty => queue!(out, ResetColor, Print(run.as_str()))?,
            Cell::Block => queue!(out, SetForegroundColor(self.block_color), Print(run.as_str()))?,
            Cell::Sounding => queue!(out, SetForegroundColor(self.press_color), Print(run.as_str()))?,
        }
        run.clear();
        Ok(())
    }

    fn draw_keyboard(
        &self,
        out: &mut impl Write,
        layout: &KeyboardLayout,
        frame: &RollFrame,
        row: u16,
    ) -> Result<()> {
        let cols = self.cols.max(1) as usize;
        let sounding: Vec<u8> = frame
            .blocks
            .iter()
            .filter(|block| block.sounding)
            .map(|block| block.key)
            .collect();

        // White columns first, black keys drawn over them.
        let mut line = vec![('▄', Color::Grey); cols];
        for slot in layout.slots() {
            let x0 = slot.x.round() as usize;
            if x0 >= cols {
                continue;
            }
            let x1 = ((slot.x + slot.width).round() as usize).clamp(x0 + 1, cols);
            let color = if sounding.contains(&slot.key) {
                self.press_color
            } else if slot.is_black {
                Color::DarkGrey
            } else {
                Color::Grey
            };
            if slot.is_black || color == self.press_color {
                for x in x0..x1.min(cols) {
                    line[x] = ('▄', color);
                }
            }
        }

        queue!(out, MoveTo(0, row))?;
        for (glyph, color) in line {
            queue!(out, SetForegroundColor(color), Print(glyph))?;
        }
        queue!(out, ResetColor)?;
        Ok(())
    }
}

pub fn format_timestamp(us: Micros) -> String {
    let total_seconds = (us / 1_000_000).max(0);
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

pub fn progress_bar(current: Micros, total: Micros, width: usize) -> String {
    let filled = if total > 0 {
        ((current as f64 / total as f64) * width as f64).round() as usize
    } else {
        0
    };
    let filled = filled.min(width);
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"=".repeat(filled));
    bar.push_str(&" ".repeat(width - filled));
    bar.push(']');
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use melodify_player::roll::visible_blocks;
    use melodify_score::NoteEvent;

    fn note(key: u8, start_us: Micros, duration_us: Micros) -> NoteEvent {
        NoteEvent {
            key,
            velocity: 100,
            start_us,
            duration_us,
            track: 0,
        }
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(
            parse_hex_color("#957DAD"),
            Color::Rgb {
                r: 0x95,
                g: 0x7D,
                b: 0xAD
            }
        );
        assert_eq!(parse_hex_color("garbage"), Color::White);
    }

    #[test]
    fn non_ascii_hex_strings_fall_back_without_panicking() {
        // Six bytes but not six chars; byte slicing would split a char.
        assert_eq!(parse_hex_color("#霞霞"), Color::White);
        assert_eq!(parse_hex_color("#ééé"), Color::White);
    }

    #[test]
    fn draw_survives_a_block_ending_exactly_at_the_playhead() {
        let term = TermUi::new(80, 24, "#957DAD", "#84E3F0");
        let layout = KeyboardLayout::new(80.0);
        let score = vec![note(60, 0, 1_000_000)];

        // Playhead clamped to the end of the piece: the last block sits
        // right on the keyboard line with zero visible height.
        let blocks = visible_blocks(&layout, &score, 1_000_000, 2_000_000, term.view_height());
        let frame = RollFrame {
            playhead_us: 1_000_000,
            blocks,
        };

        let mut out = Vec::new();
        term.draw(&mut out, &layout, &frame, "status").unwrap();
    }

    #[test]
    fn draw_clips_blocks_past_a_narrow_terminal() {
        let term = TermUi::new(10, 5, "#957DAD", "#84E3F0");
        // Layout wider than the terminal: high keys land past the edge.
        let layout = KeyboardLayout::new(120.0);
        let score = vec![note(108, 0, 500_000), note(21, 0, 500_000)];

        let blocks = visible_blocks(&layout, &score, 100_000, 2_000_000, term.view_height());
        let frame = RollFrame {
            playhead_us: 100_000,
            blocks,
        };

        let mut out = Vec::new();
        term.draw(&mut out, &layout, &frame, "status").unwrap();
    }

    #[test]
    fn timestamps_render_as_minutes_and_seconds() {
        assert_eq!(format_timestamp(0), "00:00");
        assert_eq!(format_timestamp(83_000_000), "01:23");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0, 100, 4), "[    ]");
        assert_eq!(progress_bar(50, 100, 4), "[==  ]");
        assert_eq!(progress_bar(100, 100, 4), "[====]");
        assert_eq!(progress_bar(0, 0, 2), "[  ]");
    }
}
