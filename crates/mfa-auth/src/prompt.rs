//! Interactive prompt provider
//!
//! The flows never touch stdin/stdout directly. The binary supplies a terminal
//! implementation; tests supply a scripted one.

use common::Secret;

use crate::error::Result;

/// Operator interaction used by the grant and association flows.
///
/// Methods take `&self` so a prompter can be shared by the repeated attempts of
/// a polling loop.
pub trait Prompter: Send + Sync {
    /// Ask for a line of text.
    fn input(&self, message: &str) -> Result<String>;

    /// Ask for a secret. Implementations should avoid echoing when they can.
    fn password(&self, message: &str) -> Result<String>;

    /// Ask the operator to pick one of `choices`; returns its index.
    fn select(&self, message: &str, choices: &[&str]) -> Result<usize>;

    /// Display information the operator needs to act on.
    fn show(&self, message: &str);

    /// Ask until `validate` accepts the answer.
    fn input_validated(&self, message: &str, validate: &dyn Fn(&str) -> bool) -> Result<String> {
        loop {
            let answer = self.input(message)?;
            if validate(&answer) {
                return Ok(answer);
            }
            self.show("Invalid input, please try again.");
        }
    }
}

/// Username and password for one password grant attempt.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

/// Ask for a username and a password, both non-empty.
pub fn credentials(prompter: &dyn Prompter) -> Result<Credentials> {
    let username = prompter.input_validated("Please enter your username", &non_empty)?;
    let password = loop {
        let password = prompter.password("Please enter your password")?;
        if !password.is_empty() {
            break password;
        }
        prompter.show("Invalid input, please try again.");
    };
    Ok(Credentials::new(username, password))
}

/// Ask for a one-time or binding code.
pub fn code(prompter: &dyn Prompter) -> Result<String> {
    prompter.input("Please enter code")
}

pub fn non_empty(input: &str) -> bool {
    !input.trim().is_empty()
}
