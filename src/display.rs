//! Where frames go: a window-like sink that can show a frame and report keys.

use crate::raster::Frame;
use crate::render::{Renderer, Screen};
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{ExecutableCommand, cursor, terminal};
use std::io::{BufWriter, Stdout, Write};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Esc,
    /// Ctrl-C while the terminal is in raw mode.
    Interrupt,
    Other,
}

impl Key {
    pub fn is_quit(self) -> bool {
        matches!(self, Key::Char('q' | 'Q') | Key::Esc | Key::Interrupt)
    }
}

pub trait Display {
    fn create_window(&mut self, name: &str) -> anyhow::Result<()>;
    fn show(&mut self, name: &str, frame: &Frame) -> anyhow::Result<()>;
    /// Waits at most `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>>;
    fn destroy_all_windows(&mut self) -> anyhow::Result<()>;
    /// One line of status text shown alongside the next frame, if supported.
    fn set_status(&mut self, _status: &str) {}
}

/// Raw mode and the alternate screen, restored on drop.
struct TerminalSession {
    out: BufWriter<Stdout>,
}

impl TerminalSession {
    fn open(title: &str) -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Construct first so Drop restores the terminal if a later step fails.
        let mut session = Self {
            out: BufWriter::new(std::io::stdout()),
        };
        let out = session.out.get_mut();
        out.execute(terminal::EnterAlternateScreen)
            .context("enter alternate screen")?;
        out.execute(terminal::Clear(terminal::ClearType::All))
            .context("clear screen")?;
        out.execute(cursor::Hide).context("hide cursor")?;
        out.execute(terminal::SetTitle(title))
            .context("set terminal title")?;
        Ok(session)
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
        let out = self.out.get_mut();
        // Undo sync output, autowrap and colour modes a renderer may have left on.
        let _ = out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = out.flush();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
    }
}

/// The terminal as a single window.
pub struct TerminalDisplay {
    renderer: Box<dyn Renderer>,
    session: Option<TerminalSession>,
    window: String,
    status: String,
    sync_updates: bool,
}

impl TerminalDisplay {
    pub fn new(renderer: Box<dyn Renderer>, sync_updates: bool) -> Self {
        Self {
            renderer,
            session: None,
            window: String::new(),
            status: String::new(),
            sync_updates,
        }
    }
}

impl Display for TerminalDisplay {
    fn create_window(&mut self, name: &str) -> anyhow::Result<()> {
        let (cols, rows) = terminal::size().context("get terminal size")?;
        if cols < 4 || rows < 2 {
            anyhow::bail!("terminal too small (need at least 4x2, got {cols}x{rows})");
        }
        self.session = Some(TerminalSession::open(name)?);
        self.window = name.to_string();
        log::info!("window '{name}' on {cols}x{rows} terminal, renderer={}", self.renderer.name());
        Ok(())
    }

    fn show(&mut self, name: &str, frame: &Frame) -> anyhow::Result<()> {
        let Some(session) = self.session.as_mut() else {
            anyhow::bail!("window '{name}' was not created");
        };
        if name != self.window {
            anyhow::bail!("unknown window '{name}'");
        }

        let (cols, rows) = terminal::size().context("get terminal size")?;
        let hud_rows = u16::from(rows >= 2 && !self.status.is_empty());
        let screen = Screen {
            term_cols: cols,
            visual_rows: rows.saturating_sub(hud_rows),
            frame,
            hud: &self.status,
            hud_rows,
            sync_updates: self.sync_updates,
        };
        self.renderer.render(&screen, &mut session.out)
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(k) if k.kind != KeyEventKind::Release => {
                let key = match k.code {
                    KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
                    KeyCode::Char(c) => Key::Char(c),
                    KeyCode::Esc => Key::Esc,
                    _ => Key::Other,
                };
                Ok(Some(key))
            }
            _ => Ok(None),
        }
    }

    fn destroy_all_windows(&mut self) -> anyhow::Result<()> {
        self.session = None;
        self.window.clear();
        Ok(())
    }

    fn set_status(&mut self, status: &str) {
        self.status.clear();
        self.status.push_str(status);
    }
}
