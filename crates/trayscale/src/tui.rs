//! Terminal lifecycle for the window.
//!
//! [`Screen::open`] puts the terminal in raw mode on the alternate screen
//! and returns a guard that puts it back when dropped. The panic hook from
//! [`install_hooks`] does the same for panics, and [`restore`] is there for
//! the abort path.

use std::io::{self, Stdout, stdout};

use color_eyre::eyre::Result;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Frame, Terminal, backend::CrosstermBackend};
use tracing::debug;

/// The window's terminal while it is in raw mode.
pub struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Screen {
    pub fn open() -> Result<Self> {
        match Self::enter() {
            Ok(screen) => Ok(screen),
            Err(e) => {
                restore();
                Err(e.into())
            }
        }
    }

    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen, cursor::Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> Result<()> {
        self.terminal.draw(render)?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        restore();
        debug!("terminal restored");
    }
}

/// Best-effort terminal restoration. Safe to call more than once.
pub fn restore() {
    let _ = execute!(stdout(), cursor::Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
}

/// Install the color-eyre report hook and a panic hook that restores the
/// terminal before printing. Call before [`Screen::open`].
pub fn install_hooks() -> Result<()> {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .into_hooks();
    eyre_hook.install()?;

    let panic_hook = panic_hook.into_panic_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore();
        panic_hook(info);
    }));
    Ok(())
}
