//! Line-oriented terminal prompter

use std::io::{BufRead, BufReader, IsTerminal, Stdin, Stdout, Write};
use std::sync::Mutex;

use mfa_auth::{Error, Prompter, Result};

/// Prompter reading answers line by line from `input` and writing questions
/// to `output`. End of input is a prompt error.
pub struct TerminalPrompter<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
    /// Read passwords from the controlling terminal with echo disabled.
    hide_passwords: bool,
}

impl TerminalPrompter<BufReader<Stdin>, Stdout> {
    /// Piped stdin keeps the line reader for passwords too.
    pub fn stdio() -> Self {
        let stdin = std::io::stdin();
        let hide_passwords = stdin.is_terminal();
        Self {
            hide_passwords,
            ..Self::new(BufReader::new(stdin), std::io::stdout())
        }
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
            hide_passwords: false,
        }
    }

    fn write(&self, text: &str) -> Result<()> {
        let mut output = self
            .output
            .lock()
            .map_err(|_| Error::Prompt("output lock poisoned".into()))?;
        output
            .write_all(text.as_bytes())
            .and_then(|()| output.flush())
            .map_err(|e| Error::Io(format!("writing prompt: {e}")))
    }

    fn ask(&self, message: &str) -> Result<String> {
        self.write(&format!("? {message}: "))?;

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .map_err(|_| Error::Prompt("input lock poisoned".into()))?
            .read_line(&mut line)
            .map_err(|e| Error::Io(format!("reading answer: {e}")))?;
        if read == 0 {
            return Err(Error::Prompt("input closed".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_owned())
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output.into_inner().unwrap()
    }
}

impl<R, W> Prompter for TerminalPrompter<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn input(&self, message: &str) -> Result<String> {
        self.ask(message)
    }

    fn password(&self, message: &str) -> Result<String> {
        if !self.hide_passwords {
            return self.ask(message);
        }
        rpassword::prompt_password(format!("? {message}: "))
            .map_err(|e| Error::Io(format!("reading password: {e}")))
    }

    /// Accepts either the 1-based number or the exact choice text.
    fn select(&self, message: &str, choices: &[&str]) -> Result<usize> {
        let mut menu = format!("? {message}\n");
        for (i, choice) in choices.iter().enumerate() {
            menu.push_str(&format!("  {}) {choice}\n", i + 1));
        }
        self.write(&menu)?;

        loop {
            let answer = self.ask("Answer")?;
            let answer = answer.trim();
            let picked = match answer.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => Some(n - 1),
                _ => choices.iter().position(|c| c.eq_ignore_ascii_case(answer)),
            };
            match picked {
                Some(index) => return Ok(index),
                None => self.show("Invalid input, please try again."),
            }
        }
    }

    fn show(&self, message: &str) {
        // Nothing sensible to do if the terminal is gone.
        let _ = self.write(&format!("{message}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> TerminalPrompter<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(prompter: TerminalPrompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(prompter.into_output()).unwrap()
    }

    #[test]
    fn input_strips_line_endings() {
        let p = prompter("alice\r\nsecret\n");
        assert_eq!(p.input("Please enter your username").unwrap(), "alice");
        assert_eq!(p.password("Please enter your password").unwrap(), "secret");
        assert!(output(p).contains("? Please enter your username: "));
    }

    #[test]
    fn piped_password_uses_line_reader() {
        let p = prompter("hunter2\n");
        assert!(!p.hide_passwords);
        assert_eq!(p.password("Please enter your password").unwrap(), "hunter2");
        assert!(output(p).contains("? Please enter your password: "));
    }

    #[test]
    fn piped_password_end_of_input_is_prompt_error() {
        let p = prompter("");
        assert!(matches!(
            p.password("Please enter your password"),
            Err(Error::Prompt(_))
        ));
    }

    #[test]
    fn end_of_input_is_prompt_error() {
        let p = prompter("");
        assert!(matches!(p.input("anything"), Err(Error::Prompt(_))));
    }

    #[test]
    fn select_accepts_number_or_name() {
        let p = prompter("2\nsms\n");
        let choices = ["otp", "oob"];
        assert_eq!(p.select("Type", &choices).unwrap(), 1);

        let channels = ["auth0", "sms", "email"];
        assert_eq!(p.select("Channel", &channels).unwrap(), 1);

        let out = output(p);
        assert!(out.contains("  1) otp\n  2) oob\n"));
    }

    #[test]
    fn select_reprompts_on_bad_answer() {
        let p = prompter("7\nfoo\n1\n");
        assert_eq!(p.select("Type", &["otp", "oob"]).unwrap(), 0);
        assert_eq!(
            output(p).matches("Invalid input, please try again.").count(),
            2
        );
    }

    #[test]
    fn input_validated_uses_terminal_reprompt() {
        let p = prompter("\n  \nexample.auth0.com\n");
        let answer = p
            .input_validated("Please enter your Auth0 Domain", &mfa_auth::prompt::non_empty)
            .unwrap();
        assert_eq!(answer, "example.auth0.com");
    }
}
