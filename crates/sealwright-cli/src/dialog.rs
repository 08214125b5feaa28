//! Terminal password prompt.

use std::io::{BufRead, Write};

use sealwright_lock::{DialogController, PasswordBuffer};
use zeroize::Zeroizing;

/// Password dialog over a line-oriented reader and a prompt writer.
///
/// End of input cancels the dialog. Confirmation mismatches re-prompt
/// without consuming an attempt.
pub struct TerminalDialog<R: BufRead, W: Write> {
    input: R,
    prompt: W,
    buffer: PasswordBuffer,
    source: String,
    need_confirm: bool,
}

impl<R: BufRead, W: Write> TerminalDialog<R, W> {
    /// Prompt on `prompt`, read answers from `input`.
    pub fn new(input: R, prompt: W) -> Self {
        Self {
            input,
            prompt,
            buffer: PasswordBuffer::new(),
            source: String::new(),
            need_confirm: false,
        }
    }

    fn ask(&mut self, label: &str) -> Option<Zeroizing<String>> {
        if write!(self.prompt, "{label}").and_then(|()| self.prompt.flush()).is_err() {
            return None;
        }

        let mut line = Zeroizing::new(String::new());
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Some(line)
            },
        }
    }

    fn say(&mut self, message: &str) {
        if writeln!(self.prompt, "{message}").is_err() {
            tracing::debug!("prompt output closed");
        }
    }
}

impl<R: BufRead, W: Write> DialogController for TerminalDialog<R, W> {
    fn create_dialog(&mut self, source: &str, need_confirm: bool) {
        self.source = source.to_string();
        self.need_confirm = need_confirm;
    }

    fn show_dialog(&mut self) -> bool {
        let label = format!("Password for {}: ", self.source);
        loop {
            let Some(first) = self.ask(&label) else {
                return false;
            };

            if self.need_confirm {
                let Some(second) = self.ask("Confirm password: ") else {
                    return false;
                };
                if first != second {
                    self.say("Passwords do not match.");
                    continue;
                }
            }

            self.buffer.set(first.as_bytes());
            return true;
        }
    }

    fn password(&mut self) -> &mut PasswordBuffer {
        &mut self.buffer
    }

    fn report_bad_password(&mut self) {
        self.say("Incorrect password.");
    }

    fn release_dialog(&mut self) {
        self.buffer.wipe();
        self.source.clear();
        self.need_confirm = false;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn dialog(input: &str) -> TerminalDialog<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalDialog::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn reads_one_line() {
        let mut d = dialog("hunter2\n");
        d.create_dialog("vault", false);

        assert!(d.show_dialog());
        assert_eq!(d.password().as_bytes(), b"hunter2");
        assert_eq!(String::from_utf8_lossy(&d.prompt), "Password for vault: ");
    }

    #[test]
    fn strips_carriage_return() {
        let mut d = dialog("hunter2\r\n");
        d.create_dialog("vault", false);

        assert!(d.show_dialog());
        assert_eq!(d.password().as_bytes(), b"hunter2");
    }

    #[test]
    fn end_of_input_cancels() {
        let mut d = dialog("");
        d.create_dialog("vault", false);
        assert!(!d.show_dialog());
    }

    #[test]
    fn confirmation_mismatch_reprompts() {
        let mut d = dialog("one\ntwo\nthree\nthree\n");
        d.create_dialog("vault", true);

        assert!(d.show_dialog());
        assert_eq!(d.password().as_bytes(), b"three");
        assert!(String::from_utf8_lossy(&d.prompt).contains("Passwords do not match."));
    }

    #[test]
    fn release_wipes_buffer() {
        let mut d = dialog("hunter2\n");
        d.create_dialog("vault", false);
        d.show_dialog();
        d.release_dialog();

        assert!(d.password().is_wiped());
    }
}
