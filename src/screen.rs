//! Per-process terminal emulation.
//!
//! Each managed process owns a `Screen`: a vte-driven model of what the child
//! has drawn, covering cursor motion, erase, SGR styling, and scrollback. The
//! parser is held across writes, so escape sequences split between PTY reads
//! parse the same as contiguous ones. Replies to capability queries (DA, DSR,
//! CPR, XTWINOPS) are queued on the screen and drained by the manager.
//!
//! Lines are not wrapped at the reported width when written; they grow up to
//! `MAX_LINE_WIDTH` cells and wrapping/truncation happens at render time.
//! This keeps absolutely-positioned content intact when the host terminal is
//! later resized narrower.

use std::collections::VecDeque;

use ratatui::style::{Color, Modifier, Style};
use vte::{Params, Perform};

/// Scrollback cap; oldest lines are evicted first.
pub const MAX_SCROLLBACK: usize = 10_000;
/// Hard cap on cells per line, to bound memory under runaway cursor moves.
pub const MAX_LINE_WIDTH: usize = 2_000;

/// One styled character cell. Every Unicode scalar occupies a single cell;
/// double-width glyphs are not given extra columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub c: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            c: ' ',
            style: Style::default(),
        }
    }
}

/// One buffer line; length is unbounded at write time up to `MAX_LINE_WIDTH`.
#[derive(Debug, Clone, Default)]
pub struct Line {
    pub cells: Vec<Cell>,
}

/// Screen/scrollback model plus the persistent escape-sequence parser.
pub struct Screen {
    state: ScreenState,
    parser: vte::Parser,
}

struct ScreenState {
    lines: VecDeque<Line>,
    cursor_row: usize,
    cursor_col: usize,
    /// Dimensions advertised to the child; used for query replies and for
    /// clamping absolute cursor rows.
    cols: usize,
    rows: usize,
    current_style: Style,
    saved_cursor: Option<(usize, usize)>,
    pending_responses: Vec<Vec<u8>>,
    /// Lines dropped off the front of `lines` since the last `write()` call.
    evicted: usize,
}

impl Screen {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            state: ScreenState::new(cols, rows),
            parser: vte::Parser::new(),
        }
    }

    /// Updates the dimensions reported to the child. Buffer content is left
    /// untouched; display adapts at render time.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.state.cols = cols;
        self.state.rows = rows;
    }

    /// Feeds raw child output through the parser.
    ///
    /// Returns the number of scrollback lines evicted during this call so the
    /// caller can shift any scroll offset it holds for this screen.
    pub fn write(&mut self, data: &[u8]) -> usize {
        for byte in data {
            self.parser.advance(&mut self.state, *byte);
        }
        std::mem::take(&mut self.state.evicted)
    }

    pub fn lines(&self) -> &VecDeque<Line> {
        &self.state.lines
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.state.cursor_row, self.state.cursor_col)
    }

    /// Queued replies to capability queries, cleared on return. The manager
    /// writes these back into the PTY.
    pub fn take_pending_responses(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.pending_responses)
    }

    /// Buffer lines excluding trailing empties, never less than 1. The empty
    /// cursor line left behind by a final newline is not content.
    pub fn content_line_count(&self) -> usize {
        self.trimmed_len().max(1)
    }

    /// Number of visible rows needed to display the buffer at the given
    /// width. In wrap mode each line contributes one row per `viewport_cols`
    /// chunk (one row when empty); otherwise one row per content line.
    pub fn display_line_count(&self, viewport_cols: usize, wrap: bool) -> usize {
        let content = self.trimmed_len();
        if wrap && viewport_cols > 0 {
            self.state
                .lines
                .iter()
                .take(content)
                .map(|line| {
                    if line.cells.is_empty() {
                        1
                    } else {
                        line.cells.len().div_ceil(viewport_cols)
                    }
                })
                .sum::<usize>()
                .max(1)
        } else {
            content.max(1)
        }
    }

    fn trimmed_len(&self) -> usize {
        let mut count = self.state.lines.len();
        while count > 0 && self.state.lines[count - 1].cells.is_empty() {
            count -= 1;
        }
        count
    }
}

impl ScreenState {
    fn new(cols: usize, rows: usize) -> Self {
        let mut lines = VecDeque::new();
        lines.push_back(Line::default());
        Self {
            lines,
            cursor_row: 0,
            cursor_col: 0,
            cols,
            rows,
            current_style: Style::default(),
            saved_cursor: None,
            pending_responses: Vec::new(),
            evicted: 0,
        }
    }

    fn ensure_row(&mut self, row: usize) {
        while self.lines.len() <= row {
            self.lines.push_back(Line::default());
        }
        while self.lines.len() > MAX_SCROLLBACK {
            self.lines.pop_front();
            self.evicted += 1;
            self.cursor_row = self.cursor_row.saturating_sub(1);
            if let Some((row, col)) = self.saved_cursor {
                self.saved_cursor = Some((row.saturating_sub(1), col));
            }
        }
    }

    fn ensure_col(&mut self, col: usize) {
        self.ensure_row(self.cursor_row);
        let line = &mut self.lines[self.cursor_row];
        while line.cells.len() <= col {
            line.cells.push(Cell::default());
        }
    }

    fn newline(&mut self) {
        self.cursor_row += 1;
        self.cursor_col = 0;
        self.ensure_row(self.cursor_row);
    }

    fn put_char(&mut self, c: char) {
        let col = self.cursor_col.min(MAX_LINE_WIDTH - 1);
        self.ensure_col(col);
        self.lines[self.cursor_row].cells[col] = Cell {
            c,
            style: self.current_style,
        };
        // No wrap at the reported width: the column advances freely up to the
        // hard cap and the renderer decides how to present overlong lines.
        self.cursor_col = (col + 1).min(MAX_LINE_WIDTH);
    }

    fn clear_line_from(&mut self, col: usize) {
        self.ensure_row(self.cursor_row);
        let line = &mut self.lines[self.cursor_row];
        if col < line.cells.len() {
            line.cells.truncate(col);
        }
    }

    fn clear_screen_from_cursor(&mut self) {
        self.clear_line_from(self.cursor_col);
        while self.lines.len() > self.cursor_row + 1 {
            self.lines.pop_back();
        }
    }

    fn clear_screen_to_cursor(&mut self) {
        self.ensure_row(self.cursor_row);
        for row in 0..self.cursor_row {
            self.lines[row].cells.clear();
        }
        let line = &mut self.lines[self.cursor_row];
        for col in 0..=self.cursor_col {
            if col < line.cells.len() {
                line.cells[col] = Cell::default();
            }
        }
    }

    fn clear_screen(&mut self) {
        self.lines.clear();
        self.lines.push_back(Line::default());
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    fn parse_sgr(&mut self, params: &Params) {
        let params: Vec<u16> = params.iter().flat_map(|p| p.iter().copied()).collect();
        if params.is_empty() {
            self.current_style = Style::default();
            return;
        }

        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => self.current_style = Style::default(),
                1 => self.current_style = self.current_style.add_modifier(Modifier::BOLD),
                2 => self.current_style = self.current_style.add_modifier(Modifier::DIM),
                3 => self.current_style = self.current_style.add_modifier(Modifier::ITALIC),
                4 => self.current_style = self.current_style.add_modifier(Modifier::UNDERLINED),
                5 | 6 => self.current_style = self.current_style.add_modifier(Modifier::SLOW_BLINK),
                7 => self.current_style = self.current_style.add_modifier(Modifier::REVERSED),
                8 => self.current_style = self.current_style.add_modifier(Modifier::HIDDEN),
                9 => self.current_style = self.current_style.add_modifier(Modifier::CROSSED_OUT),
                22 => {
                    self.current_style = self
                        .current_style
                        .remove_modifier(Modifier::BOLD | Modifier::DIM)
                }
                23 => self.current_style = self.current_style.remove_modifier(Modifier::ITALIC),
                24 => self.current_style = self.current_style.remove_modifier(Modifier::UNDERLINED),
                25 => self.current_style = self.current_style.remove_modifier(Modifier::SLOW_BLINK),
                27 => self.current_style = self.current_style.remove_modifier(Modifier::REVERSED),
                28 => self.current_style = self.current_style.remove_modifier(Modifier::HIDDEN),
                29 => {
                    self.current_style = self.current_style.remove_modifier(Modifier::CROSSED_OUT)
                }
                30..=37 => {
                    self.current_style = self.current_style.fg(ansi_color(params[i] - 30));
                }
                38 => {
                    if i + 2 < params.len() && params[i + 1] == 5 {
                        self.current_style =
                            self.current_style.fg(Color::Indexed(params[i + 2] as u8));
                        i += 2;
                    } else if i + 4 < params.len() && params[i + 1] == 2 {
                        self.current_style = self.current_style.fg(Color::Rgb(
                            params[i + 2] as u8,
                            params[i + 3] as u8,
                            params[i + 4] as u8,
                        ));
                        i += 4;
                    }
                }
                39 => self.current_style = self.current_style.fg(Color::Reset),
                40..=47 => {
                    self.current_style = self.current_style.bg(ansi_color(params[i] - 40));
                }
                48 => {
                    if i + 2 < params.len() && params[i + 1] == 5 {
                        self.current_style =
                            self.current_style.bg(Color::Indexed(params[i + 2] as u8));
                        i += 2;
                    } else if i + 4 < params.len() && params[i + 1] == 2 {
                        self.current_style = self.current_style.bg(Color::Rgb(
                            params[i + 2] as u8,
                            params[i + 3] as u8,
                            params[i + 4] as u8,
                        ));
                        i += 4;
                    }
                }
                49 => self.current_style = self.current_style.bg(Color::Reset),
                90..=97 => {
                    self.current_style = self.current_style.fg(bright_ansi_color(params[i] - 90));
                }
                100..=107 => {
                    self.current_style = self.current_style.bg(bright_ansi_color(params[i] - 100));
                }
                _ => {}
            }
            i += 1;
        }
    }
}

fn ansi_color(n: u16) -> Color {
    match n {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        _ => Color::White,
    }
}

fn bright_ansi_color(n: u16) -> Color {
    match n {
        0 => Color::DarkGray,
        1 => Color::LightRed,
        2 => Color::LightGreen,
        3 => Color::LightYellow,
        4 => Color::LightBlue,
        5 => Color::LightMagenta,
        6 => Color::LightCyan,
        _ => Color::White,
    }
}

impl Perform for ScreenState {
    fn print(&mut self, c: char) {
        self.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // BS: move left, no delete
            0x08 => {
                if self.cursor_col > 0 {
                    self.cursor_col -= 1;
                }
            }
            // HT: advance to the next multiple of 8
            0x09 => {
                let next_tab = (self.cursor_col + 8) & !7;
                self.cursor_col = next_tab.min(MAX_LINE_WIDTH - 1);
            }
            // LF, VT, FF
            0x0A | 0x0B | 0x0C => self.newline(),
            // CR
            0x0D => self.cursor_col = 0,
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}
    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}
    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let params_vec: Vec<u16> = params.iter().flat_map(|p| p.iter().copied()).collect();
        let get_param = |i: usize, default: u16| -> u16 {
            params_vec
                .get(i)
                .copied()
                .filter(|&v| v != 0)
                .unwrap_or(default)
        };
        // Private-marker sequences (CSI ? …, CSI > …) are consumed and ignored.
        if !intermediates.is_empty() {
            return;
        }

        match action {
            // CUU
            'A' => {
                let n = get_param(0, 1) as usize;
                self.cursor_row = self.cursor_row.saturating_sub(n);
            }
            // CUD
            'B' => {
                let n = get_param(0, 1) as usize;
                self.cursor_row += n;
                self.ensure_row(self.cursor_row);
            }
            // CUF
            'C' => {
                let n = get_param(0, 1) as usize;
                self.cursor_col = (self.cursor_col + n).min(MAX_LINE_WIDTH - 1);
            }
            // CUB
            'D' => {
                let n = get_param(0, 1) as usize;
                self.cursor_col = self.cursor_col.saturating_sub(n);
            }
            // CNL
            'E' => {
                let n = get_param(0, 1) as usize;
                self.cursor_row += n;
                self.cursor_col = 0;
                self.ensure_row(self.cursor_row);
            }
            // CPL
            'F' => {
                let n = get_param(0, 1) as usize;
                self.cursor_row = self.cursor_row.saturating_sub(n);
                self.cursor_col = 0;
            }
            // CHA: 1-indexed absolute column
            'G' => {
                let col = get_param(0, 1).saturating_sub(1) as usize;
                self.cursor_col = col.min(MAX_LINE_WIDTH - 1);
            }
            // CUP: 1-indexed row;col, row clamped to the reported height
            'H' | 'f' => {
                let row = get_param(0, 1).saturating_sub(1) as usize;
                let col = get_param(1, 1).saturating_sub(1) as usize;
                self.cursor_row = row.min(self.rows.saturating_sub(1));
                self.cursor_col = col.min(MAX_LINE_WIDTH - 1);
                self.ensure_row(self.cursor_row);
            }
            // ED
            'J' => match get_param(0, 0) {
                0 => self.clear_screen_from_cursor(),
                1 => self.clear_screen_to_cursor(),
                2 | 3 => self.clear_screen(),
                _ => {}
            },
            // EL
            'K' => match get_param(0, 0) {
                0 => self.clear_line_from(self.cursor_col),
                1 => {
                    self.ensure_row(self.cursor_row);
                    let line = &mut self.lines[self.cursor_row];
                    for col in 0..=self.cursor_col {
                        if col < line.cells.len() {
                            line.cells[col] = Cell::default();
                        }
                    }
                }
                2 => {
                    self.ensure_row(self.cursor_row);
                    self.lines[self.cursor_row].cells.clear();
                }
                _ => {}
            },
            // SGR
            'm' => self.parse_sgr(params),
            // Save / restore cursor
            's' => self.saved_cursor = Some((self.cursor_row, self.cursor_col)),
            'u' => {
                if let Some((row, col)) = self.saved_cursor {
                    self.cursor_row = row;
                    self.cursor_col = col;
                    self.ensure_row(self.cursor_row);
                }
            }
            // DA: identify as VT100 with advanced video option. Full-screen
            // children (glow, lazygit) block on this reply at startup.
            'c' => {
                if params_vec.first().copied().unwrap_or(0) == 0 {
                    self.pending_responses.push(b"\x1b[?1;2c".to_vec());
                }
            }
            // DSR / CPR
            'n' => match get_param(0, 0) {
                5 => self.pending_responses.push(b"\x1b[0n".to_vec()),
                6 => {
                    let reply = format!("\x1b[{};{}R", self.cursor_row + 1, self.cursor_col + 1);
                    self.pending_responses.push(reply.into_bytes());
                }
                _ => {}
            },
            // XTWINOPS: report text-area size in characters
            't' => {
                if get_param(0, 0) == 18 {
                    let reply = format!("\x1b[8;{};{}t", self.rows, self.cols);
                    self.pending_responses.push(reply.into_bytes());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> Screen {
        Screen::new(80, 24)
    }

    fn row_text(screen: &Screen, row: usize) -> String {
        screen.lines()[row].cells.iter().map(|c| c.c).collect()
    }

    fn all_text(screen: &Screen) -> Vec<String> {
        (0..screen.lines().len())
            .map(|row| row_text(screen, row))
            .collect()
    }

    #[test]
    fn plain_text_and_newlines() {
        let mut s = screen();
        s.write(b"hello\r\nworld");
        assert_eq!(row_text(&s, 0), "hello");
        assert_eq!(row_text(&s, 1), "world");
        assert_eq!(s.cursor(), (1, 5));
    }

    #[test]
    fn carriage_return_overwrites_from_column_zero() {
        let mut s = screen();
        s.write(b"abcdef\rXY");
        assert_eq!(row_text(&s, 0), "XYcdef");
    }

    #[test]
    fn backspace_moves_without_deleting() {
        let mut s = screen();
        s.write(b"ab\x08X");
        assert_eq!(row_text(&s, 0), "aX");
    }

    #[test]
    fn tab_advances_to_next_multiple_of_eight() {
        let mut s = screen();
        s.write(b"ab\tX");
        assert_eq!(s.lines()[0].cells[8].c, 'X');
        s.write(b"\rY\t\tZ");
        assert_eq!(s.lines()[0].cells[16].c, 'Z');
    }

    #[test]
    fn escape_split_across_writes_parses_identically() {
        let mut split = screen();
        split.write(b"\x1b");
        split.write(b"[31mX");

        let mut joined = screen();
        joined.write(b"\x1b[31mX");

        assert_eq!(row_text(&split, 0), "X");
        assert_eq!(row_text(&joined, 0), "X");
        assert_eq!(split.lines()[0].cells[0].style.fg, Some(Color::Red));
        assert_eq!(joined.lines()[0].cells[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn chunked_writes_match_contiguous_write() {
        let input: &[u8] = b"a\x1b[1;32mbold green\x1b[0m\r\nplain \x1b[38;5;200mx\x1b[m";
        let mut contiguous = screen();
        contiguous.write(input);
        let mut chunked = screen();
        for chunk in input.chunks(3) {
            chunked.write(chunk);
        }
        assert_eq!(all_text(&contiguous), all_text(&chunked));
        assert_eq!(contiguous.cursor(), chunked.cursor());
    }

    #[test]
    fn sgr_modifiers_and_resets() {
        let mut s = screen();
        s.write(b"\x1b[1;4mX\x1b[22;24mY");
        let bold = s.lines()[0].cells[0].style;
        assert!(bold.add_modifier.contains(Modifier::BOLD));
        assert!(bold.add_modifier.contains(Modifier::UNDERLINED));
        let plain = s.lines()[0].cells[1].style;
        assert!(!plain.add_modifier.contains(Modifier::BOLD));
        assert!(!plain.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn sgr_indexed_and_truecolor() {
        let mut s = screen();
        s.write(b"\x1b[38;5;42ma\x1b[48;2;1;2;3mb");
        assert_eq!(s.lines()[0].cells[0].style.fg, Some(Color::Indexed(42)));
        assert_eq!(s.lines()[0].cells[1].style.bg, Some(Color::Rgb(1, 2, 3)));
    }

    #[test]
    fn cursor_positioning_is_one_indexed_and_clamped() {
        let mut s = screen();
        s.write(b"\x1b[2;5HX");
        assert_eq!(s.lines()[1].cells[4].c, 'X');
        // Row clamps to the reported height, column to the hard line cap.
        s.write(b"\x1b[999;9999HY");
        let (row, _) = s.cursor();
        assert_eq!(row, 23);
        assert_eq!(s.lines()[23].cells[MAX_LINE_WIDTH - 1].c, 'Y');
    }

    #[test]
    fn cha_sets_absolute_column() {
        let mut s = screen();
        s.write(b"abcdef\x1b[2GX");
        assert_eq!(row_text(&s, 0), "aXcdef");
    }

    #[test]
    fn relative_cursor_moves_use_default_one() {
        let mut s = screen();
        s.write(b"ab\r\ncd\x1b[A\x1b[DX");
        // Up one row, back one col from (1,2) -> (0,1)
        assert_eq!(row_text(&s, 0), "aX");
    }

    #[test]
    fn erase_line_variants() {
        let mut s = screen();
        s.write(b"abcdef\x1b[3G\x1b[0K");
        assert_eq!(row_text(&s, 0), "ab");

        let mut s = screen();
        s.write(b"abcdef\x1b[3G\x1b[1K");
        assert_eq!(row_text(&s, 0), "   def");

        let mut s = screen();
        s.write(b"abcdef\x1b[2K");
        assert_eq!(row_text(&s, 0), "");
    }

    #[test]
    fn erase_display_variants() {
        let mut s = screen();
        s.write(b"one\r\ntwo\r\nthree\x1b[2;2H\x1b[0J");
        assert_eq!(row_text(&s, 0), "one");
        assert_eq!(row_text(&s, 1), "t");
        assert_eq!(s.lines().len(), 2);

        let mut s = screen();
        s.write(b"one\r\ntwo\r\nthree\x1b[2;2H\x1b[1J");
        assert_eq!(row_text(&s, 0), "");
        assert_eq!(row_text(&s, 1), "  o");
        assert_eq!(row_text(&s, 2), "three");

        let mut s = screen();
        s.write(b"one\r\ntwo\x1b[2J");
        assert_eq!(s.lines().len(), 1);
        assert_eq!(row_text(&s, 0), "");
        assert_eq!(s.cursor(), (0, 0));
    }

    #[test]
    fn device_attributes_query_is_answered() {
        let mut s = screen();
        s.write(b"\x1b[c\x1b[0c");
        let replies = s.take_pending_responses();
        assert_eq!(replies, vec![b"\x1b[?1;2c".to_vec(), b"\x1b[?1;2c".to_vec()]);
        assert!(s.take_pending_responses().is_empty());
    }

    #[test]
    fn cursor_position_report() {
        let mut s = screen();
        s.write(b"ab\x1b[6n");
        assert_eq!(s.take_pending_responses(), vec![b"\x1b[1;3R".to_vec()]);
    }

    #[test]
    fn device_status_report() {
        let mut s = screen();
        s.write(b"\x1b[5n");
        assert_eq!(s.take_pending_responses(), vec![b"\x1b[0n".to_vec()]);
    }

    #[test]
    fn window_size_report() {
        let mut s = Screen::new(120, 40);
        s.write(b"\x1b[18t");
        assert_eq!(s.take_pending_responses(), vec![b"\x1b[8;40;120t".to_vec()]);
    }

    #[test]
    fn unknown_sequences_never_leak_glyphs() {
        let mut s = screen();
        s.write(b"a\x1b[?25l\x1b[12;34;56~\x1b]0;title\x07b");
        assert_eq!(row_text(&s, 0), "ab");
    }

    #[test]
    fn no_wrap_at_reported_width() {
        let mut s = Screen::new(10, 4);
        let data: Vec<u8> = std::iter::repeat(b'x').take(25).collect();
        s.write(&data);
        assert_eq!(s.lines().len(), 1);
        assert_eq!(s.lines()[0].cells.len(), 25);
    }

    #[test]
    fn line_width_is_hard_capped() {
        let mut s = screen();
        let data: Vec<u8> = std::iter::repeat(b'y').take(MAX_LINE_WIDTH + 100).collect();
        s.write(&data);
        assert_eq!(s.lines()[0].cells.len(), MAX_LINE_WIDTH);
        // Column moves via CUF are capped too.
        s.write(b"\x1b[9999Cz");
        assert_eq!(s.lines()[0].cells.len(), MAX_LINE_WIDTH);
    }

    #[test]
    fn scrollback_evicts_from_front_and_reports_count() {
        let mut s = screen();
        let mut evicted = 0;
        for i in 0..MAX_SCROLLBACK + 5 {
            evicted += s.write(format!("line{}\n", i).as_bytes());
        }
        assert_eq!(s.lines().len(), MAX_SCROLLBACK);
        assert_eq!(evicted, 6);
        assert_eq!(row_text(&s, 0), "line6");
        let (row, _) = s.cursor();
        assert!(row < MAX_SCROLLBACK);
    }

    #[test]
    fn display_line_count_ignores_trailing_empties() {
        let mut s = screen();
        assert_eq!(s.display_line_count(80, false), 1);
        s.write(b"one\r\ntwo\r\n\r\n\r\n");
        assert_eq!(s.display_line_count(80, false), 2);
        assert_eq!(s.content_line_count(), 2);
    }

    #[test]
    fn display_line_count_wraps_by_viewport_width() {
        let mut s = screen();
        let data: Vec<u8> = std::iter::repeat(b'x').take(25).collect();
        s.write(&data);
        s.write(b"\r\n\r\nshort");
        // 25 cells at width 10 -> 3 rows, one empty line -> 1, "short" -> 1.
        assert_eq!(s.display_line_count(10, true), 5);
        assert_eq!(s.display_line_count(10, false), 3);
    }

    #[test]
    fn save_and_restore_cursor() {
        let mut s = screen();
        s.write(b"abc\x1b[sxyz\x1b[uX");
        assert_eq!(row_text(&s, 0), "abcXyz");
    }

    #[test]
    fn utf8_spans_write_boundaries() {
        let mut s = screen();
        let text = "héllo→".as_bytes();
        // Split inside the two-byte é so the decoder must buffer.
        s.write(&text[..2]);
        s.write(&text[2..]);
        assert_eq!(row_text(&s, 0), "héllo→");
    }
}
