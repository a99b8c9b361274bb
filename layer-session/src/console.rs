//! Terminal output and input helpers.
//!
//! Everything the generator prints goes through [`Console`], so the
//! `--no-clear` / `--no-pause` switches are honoured in one place.

use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::{cursor, execute, terminal};

use crate::remedy::Failure;

#[derive(Clone, Copy, Debug)]
pub struct Console {
    clear: bool,
    pause: bool,
}

impl Console {
    pub fn new(clear: bool, pause: bool) -> Self {
        Self { clear, pause }
    }

    pub fn clear(&self) {
        if !self.clear { return; }
        let mut out = io::stdout();
        // Ignored: a terminal that cannot clear just scrolls.
        let _ = execute!(out, terminal::Clear(terminal::ClearType::All), cursor::MoveTo(0, 0));
    }

    pub fn banner(&self) {
        self.clear();
        println!();
        println!("{}", "  ┌──────────────────────────────────────────────────┐".green().bold());
        println!("{}", "  │          layer-session · string generator        │".green().bold());
        println!("{}", "  └──────────────────────────────────────────────────┘".green().bold());
        println!("{}", "  Log in once, copy the session string, reuse it everywhere.".dim());
        println!();
    }

    pub fn step(&self, n: u8, title: &str) {
        println!("\n{}", format!("━━━ Step {n}: {title}").cyan().bold());
    }

    pub fn ok(&self, msg: impl std::fmt::Display) {
        println!("  {}  {msg}", "✓".green().bold());
    }

    pub fn info(&self, msg: impl std::fmt::Display) {
        println!("  {}  {}", "ℹ".blue().bold(), msg.to_string().dim());
    }

    pub fn warn(&self, msg: impl std::fmt::Display) {
        println!("  {}  {}", "!".yellow().bold(), msg.to_string().yellow().bold());
    }

    /// Dimmed free-standing line.
    pub fn note(&self, msg: impl std::fmt::Display) {
        println!("  {}", msg.to_string().dim());
    }

    /// Print a failure and its remediation.
    pub fn fail(&self, failure: &Failure) {
        println!("\n  {}  {}", "✗  ERROR:".red().bold(), failure.message);
        if let Some(fix) = &failure.fix {
            println!("\n  {}\n", "→  WHAT TO DO:".yellow().bold());
            for line in fix.trim().lines() {
                println!("     {line}");
            }
        }
        println!();
    }

    pub fn cancelled(&self) {
        println!("\n\n  {}\n", "Cancelled.".yellow().bold());
    }

    /// Ask for one line of input.
    pub async fn prompt(&self, label: &str) -> io::Result<String> {
        let label = format!("  {} ", label.yellow().bold());
        let line = blocking(move || read_line(&label)).await?;
        Ok(line.trim().to_string())
    }

    /// Ask for a secret without echoing it.
    ///
    /// Falls back to a visible prompt when stdin is not a terminal (piped
    /// input, some IDE consoles). Surrounding whitespace is kept. Ctrl-C
    /// restores the terminal and ends the program as a cancellation.
    pub async fn secret(&self, label: &str) -> io::Result<String> {
        let label = format!("  {} ", label.yellow().bold());
        let read = if io::stdin().is_terminal() {
            blocking(move || read_hidden(&label)).await
        } else {
            blocking(move || read_line(&label)).await
        };
        match read {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                self.cancelled();
                std::process::exit(0);
            }
            other => other,
        }
    }

    /// Wait for Enter, unless pausing is disabled.
    pub async fn pause(&self, msg: &str) -> io::Result<()> {
        if !self.pause { return Ok(()); }
        let label = format!("\n  {}", msg.dim());
        blocking(move || read_line(&label)).await.map(drop)
    }
}

/// Whether stdin is attached to an interactive terminal.
pub fn interactive() -> bool {
    io::stdin().is_terminal()
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(io::Error::other)?
}

/// Result of feeding one key to the hidden-input buffer.
#[derive(Debug, PartialEq, Eq)]
enum Key {
    Continue,
    Submit,
    Cancel,
}

fn apply_key(buf: &mut String, key: &KeyEvent) -> Key {
    if key.kind == KeyEventKind::Release {
        return Key::Continue;
    }
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Key::Cancel
        }
        KeyCode::Enter => Key::Submit,
        KeyCode::Backspace => {
            buf.pop();
            Key::Continue
        }
        KeyCode::Char(c) => {
            buf.push(c);
            Key::Continue
        }
        _ => Key::Continue,
    }
}

/// Print `label` and read keys in raw mode until Enter. Nothing is echoed.
///
/// Raw mode is always switched off again before returning; Ctrl-C comes
/// back as [`io::ErrorKind::Interrupted`].
fn read_hidden(label: &str) -> io::Result<String> {
    let mut out = io::stdout();
    write!(out, "{label}")?;
    out.flush()?;

    terminal::enable_raw_mode()?;
    let mut buf = String::new();
    let outcome = loop {
        match event::read() {
            Ok(Event::Key(key)) => match apply_key(&mut buf, &key) {
                Key::Continue => {}
                done          => break Ok(done),
            },
            Ok(_)  => {}
            Err(e) => break Err(e),
        }
    };
    terminal::disable_raw_mode()?;
    println!();

    match outcome? {
        Key::Cancel => Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled")),
        _           => Ok(buf),
    }
}

/// Print `label` and read one line, without the trailing newline.
fn read_line(label: &str) -> io::Result<String> {
    let mut out = io::stdout();
    write!(out, "{label}")?;
    out.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn feed(keys: &[KeyEvent]) -> (String, Key) {
        let mut buf = String::new();
        for key in keys {
            match apply_key(&mut buf, key) {
                Key::Continue => {}
                done          => return (buf, done),
            }
        }
        (buf, Key::Continue)
    }

    #[test]
    fn typed_password_is_collected_until_enter() {
        let (buf, end) = feed(&[
            press(KeyCode::Char(' ')),
            press(KeyCode::Char('p')),
            press(KeyCode::Char('w')),
            press(KeyCode::Char('x')),
            press(KeyCode::Backspace),
            press(KeyCode::Enter),
            press(KeyCode::Char('z')),
        ]);
        assert_eq!(end, Key::Submit);
        assert_eq!(buf, " pw");
    }

    #[test]
    fn ctrl_c_cancels_instead_of_typing() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let (buf, end) = feed(&[press(KeyCode::Char('a')), ctrl_c]);
        assert_eq!(end, Key::Cancel);
        assert_eq!(buf, "a");

        let (buf, end) = feed(&[press(KeyCode::Char('c')), press(KeyCode::Enter)]);
        assert_eq!(end, Key::Submit);
        assert_eq!(buf, "c");
    }

    #[test]
    fn key_releases_and_navigation_are_ignored() {
        let mut release = press(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        let (buf, end) = feed(&[release, press(KeyCode::Left), press(KeyCode::Backspace)]);
        assert_eq!(end, Key::Continue);
        assert!(buf.is_empty());
    }
}
