//! Console: stdout/stderr sinks plus the line-editor hooks used to bracket
//! asynchronous output (`save_line` before, `redraw_prompt` after).
//!
//! There is no line editor here; in interactive mode "save" clears the
//! current terminal line and "redraw" prints the prompt again.

use std::io::{self, Write};
#[cfg(test)]
use std::sync::{Arc, Mutex};

pub const PROMPT: &str = "connmanctl> ";

pub struct Console {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    prompt: Option<&'static str>,
}

impl Console {
    /// Plain stdout/stderr; `interactive` enables the prompt hooks.
    pub fn stdio(interactive: bool) -> Self {
        Self {
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
            prompt: interactive.then_some(PROMPT),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.prompt.is_some()
    }

    /// Write raw text to stdout.
    pub fn write(&mut self, text: impl AsRef<str>) {
        let _ = self.out.write_all(text.as_ref().as_bytes());
    }

    /// Write one line to stdout.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}", text.as_ref());
    }

    /// Write one line to stderr.
    pub fn error(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.err, "{}", text.as_ref());
    }

    /// Hide the partially typed input line before asynchronous output.
    pub fn save_line(&mut self) {
        if self.prompt.is_some() {
            let _ = self.out.write_all(b"\r\x1b[K");
        }
    }

    /// Show the prompt again after asynchronous output.
    pub fn redraw_prompt(&mut self) {
        if let Some(prompt) = self.prompt {
            let _ = self.out.write_all(prompt.as_bytes());
        }
        self.flush();
    }

    pub fn flush(&mut self) {
        let _ = self.out.flush();
        let _ = self.err.flush();
    }
}

/// Shared in-memory buffer; lets tests read what a `Console` wrote.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct Captured {
    out: Arc<Mutex<Vec<u8>>>,
    err: Arc<Mutex<Vec<u8>>>,
}

#[cfg(test)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut inner) => inner.write(buf),
            Err(_) => Err(io::Error::other("capture buffer poisoned")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl Captured {
    fn read(buf: &Arc<Mutex<Vec<u8>>>) -> String {
        buf.lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    pub fn stdout(&self) -> String {
        Self::read(&self.out)
    }

    pub fn stderr(&self) -> String {
        Self::read(&self.err)
    }
}

#[cfg(test)]
impl Console {
    /// Non-interactive console writing into memory.
    pub fn capture() -> (Self, Captured) {
        Self::capture_with_prompt(None)
    }

    /// Capturing console that also emits the prompt hooks.
    pub fn capture_interactive() -> (Self, Captured) {
        Self::capture_with_prompt(Some(PROMPT))
    }

    fn capture_with_prompt(prompt: Option<&'static str>) -> (Self, Captured) {
        let captured = Captured::default();
        let console = Self {
            out: Box::new(SharedBuf(captured.out.clone())),
            err: Box::new(SharedBuf(captured.err.clone())),
            prompt,
        };
        (console, captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_separates_streams() {
        let (mut c, cap) = Console::capture();
        c.line("hello");
        c.error("oops");
        assert_eq!(cap.stdout(), "hello\n");
        assert_eq!(cap.stderr(), "oops\n");
    }

    #[test]
    fn hooks_are_silent_when_not_interactive() {
        let (mut c, cap) = Console::capture();
        c.save_line();
        c.redraw_prompt();
        assert_eq!(cap.stdout(), "");
    }

    #[test]
    fn hooks_bracket_output_when_interactive() {
        let (mut c, cap) = Console::capture_interactive();
        c.save_line();
        c.line("event");
        c.redraw_prompt();
        assert_eq!(cap.stdout(), "\r\x1b[Kevent\nconnmanctl> ");
    }
}
