//! Terminal stand-ins for the LCD and the buttons.
//!
//! The display keeps a small model of the LCD regions (background colour
//! plus one text run each) and renders it with ratatui on `present()`.
//! Horizontal positions are in display dots; one terminal cell is
//! `DOTS_PER_CELL` dots wide.

use std::collections::HashMap;
use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::crossterm::execute;
use ratatui::crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::Rect;
use ratatui::style::{Color as TermColor, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use crate::error::DeviceError;
use crate::hal::{ButtonLevels, Color, Display, InputPanel, PowerKeySample, Region};

/// Width of the M5StickC LCD in landscape.
pub const DISPLAY_WIDTH_DOTS: i32 = 240;
const DOTS_PER_CELL: i32 = 4;
const COLUMNS: u16 = (DISPLAY_WIDTH_DOTS / DOTS_PER_CELL) as u16;
const ROWS: u16 = 8;

/// Samples a key press reads as "held" so the debouncer sees a full
/// press and release.
const HELD_SAMPLES: u8 = 4;
const KEY_POLL: Duration = Duration::from_millis(50);

fn term_color(color: Color) -> TermColor {
    match color {
        Color::Black => TermColor::Black,
        Color::White => TermColor::White,
        Color::Orange => TermColor::Rgb(0xff, 0xa5, 0x00),
        Color::Cyan => TermColor::Cyan,
        Color::Red => TermColor::Red,
        Color::Green => TermColor::Green,
        Color::Magenta => TermColor::Magenta,
        Color::DarkGrey => TermColor::DarkGray,
    }
}

fn row(region: Region) -> u16 {
    match region {
        Region::Station => 0,
        Region::Status => 1,
        Region::Song => 3,
        Region::Footer => ROWS - 1,
        Region::Line(n) => u16::from(n).min(ROWS - 1),
    }
}

fn text_width_dots(text: &str) -> i32 {
    text.chars()
        .map(|c| c.width().unwrap_or(0) as i32 * DOTS_PER_CELL)
        .sum()
}

/// Cut `text` to what is visible when it starts at dot `x`.
/// Returns the starting column and the visible part.
fn visible(x: i32, text: &str) -> (u16, String) {
    let mut column = x.div_euclid(DOTS_PER_CELL);
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0) as i32;
        if column >= 0 && column + w <= i32::from(COLUMNS) {
            out.push(c);
        } else if column >= i32::from(COLUMNS) {
            break;
        }
        column += w;
    }
    let start = x.div_euclid(DOTS_PER_CELL).max(0);
    (start.min(i32::from(COLUMNS)) as u16, out)
}

#[derive(Debug, Clone)]
struct RegionModel {
    background: Color,
    text: Option<(i32, String, Color)>,
}

pub struct TerminalDisplay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    title: String,
    regions: HashMap<Region, RegionModel>,
}

impl TerminalDisplay {
    /// Takes over the terminal until dropped.
    pub fn enter(title: &str) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        debug!("terminal display entered");
        Ok(Self {
            terminal,
            title: title.to_string(),
            regions: HashMap::new(),
        })
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

impl Display for TerminalDisplay {
    fn width(&self) -> i32 {
        DISPLAY_WIDTH_DOTS
    }

    fn text_width(&self, text: &str) -> i32 {
        text_width_dots(text)
    }

    fn clear(&mut self) {
        self.regions.clear();
    }

    fn fill(&mut self, region: Region, color: Color) {
        self.regions.insert(
            region,
            RegionModel {
                background: color,
                text: None,
            },
        );
    }

    fn draw_text(&mut self, region: Region, x: i32, text: &str, color: Color) {
        let model = self.regions.entry(region).or_insert(RegionModel {
            background: Color::Black,
            text: None,
        });
        model.text = Some((x, text.to_string(), color));
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        let regions = &self.regions;
        let title = self.title.as_str();
        self.terminal
            .draw(|frame| {
                let outer = Rect::new(0, 0, COLUMNS + 2, ROWS + 2).intersection(frame.area());
                let block = Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", title));
                let inner = block.inner(outer);
                frame.render_widget(block, outer);

                for (region, model) in regions {
                    let y = inner.y + row(*region);
                    if y >= inner.y + inner.height {
                        continue;
                    }
                    let line_area = Rect::new(inner.x, y, inner.width, 1);
                    let bg = term_color(model.background);
                    frame.render_widget(Block::default().style(Style::default().bg(bg)), line_area);

                    if let Some((x, text, color)) = &model.text {
                        let (column, shown) = visible(*x, text);
                        if column >= inner.width {
                            continue;
                        }
                        let area = Rect::new(inner.x + column, y, inner.width - column, 1);
                        let style = Style::default().fg(term_color(*color)).bg(bg);
                        frame.render_widget(Paragraph::new(Line::styled(shown, style)), area);
                    }
                }
            })
            .map(|_| ())
            .map_err(|e| DeviceError::Display(e.to_string()))
    }
}

#[derive(Debug, Default)]
struct KeyState {
    primary: u8,
    secondary: u8,
    mode: u8,
    power: bool,
    power_long: bool,
    quit: bool,
}

impl KeyState {
    fn apply(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Char('a') => self.primary = HELD_SAMPLES,
            KeyCode::Char('b') => self.secondary = HELD_SAMPLES,
            KeyCode::Char('m') => self.mode = HELD_SAMPLES,
            KeyCode::Char('p') => self.power = true,
            KeyCode::Char('l') => self.power_long = true,
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => self.quit = true,
            _ => {}
        }
    }
}

fn held(counter: &mut u8) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}

/// Keyboard-driven button panel: `a` primary, `b` secondary, `m` mode,
/// `p` / `l` power key short / long press, `q` quit.
pub struct KeyPanel {
    state: Arc<Mutex<KeyState>>,
    stop: Arc<AtomicBool>,
}

impl KeyPanel {
    pub fn spawn() -> anyhow::Result<Self> {
        let state = Arc::new(Mutex::new(KeyState::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let reader_state = Arc::clone(&state);
        let reader_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("keys".to_string())
            .spawn(move || {
                while !reader_stop.load(Ordering::Relaxed) {
                    match event::poll(KEY_POLL) {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => {
                            warn!("keys: poll failed: {}", e);
                            return;
                        }
                    }
                    match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                            if let Ok(mut s) = reader_state.lock() {
                                s.apply(key.code, key.modifiers);
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("keys: read failed: {}", e);
                            return;
                        }
                    }
                }
            })?;
        Ok(Self { state, stop })
    }

    fn with_state<R: Default>(&self, f: impl FnOnce(&mut KeyState) -> R) -> R {
        match self.state.lock() {
            Ok(mut s) => f(&mut s),
            Err(_) => R::default(),
        }
    }
}

impl Drop for KeyPanel {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl InputPanel for KeyPanel {
    fn buttons(&mut self) -> ButtonLevels {
        self.with_state(|s| ButtonLevels {
            primary: held(&mut s.primary),
            secondary: held(&mut s.secondary),
            mode: held(&mut s.mode),
        })
    }

    fn power_key(&mut self) -> PowerKeySample {
        self.with_state(|s| PowerKeySample {
            pressed: std::mem::take(&mut s.power),
            long_pressed: std::mem::take(&mut s.power_long),
        })
    }

    fn shutdown_requested(&mut self) -> bool {
        self.with_state(|s| s.quit)
    }
}
