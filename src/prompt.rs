//! Operator interaction.
//!
//! The pipeline never reads the terminal itself; it asks an [`Operator`].
//! [`ConsoleOperator`] is the interactive implementation, tests script
//! their own.

use std::io::{BufRead, StdinLock, Stdout, Write};

use tracing::warn;

use crate::error::{DetachError, Result};

/// Answer to a yes/no(/spam) question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
    Spam,
}

impl Choice {
    /// Key the operator types for this choice.
    pub fn key(self) -> char {
        match self {
            Self::Yes => 'y',
            Self::No => 'n',
            Self::Spam => 's',
        }
    }

    /// Option list as shown in a prompt, the default upper-cased: `Y/n/s`.
    pub fn render(options: &[Choice]) -> String {
        options
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i == 0 {
                    c.key().to_ascii_uppercase().to_string()
                } else {
                    c.key().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Whoever makes the decisions during a run.
pub trait Operator {
    /// Show informational text.
    fn notify(&mut self, text: &str);

    /// Ask a question; the first option is the default.
    fn choose(&mut self, prompt: &str, options: &[Choice]) -> Result<Choice>;

    /// Ask for the operator-chosen part of the attachment directory name.
    fn suffix(&mut self, prompt: &str) -> Result<String>;
}

/// Operator on a line-based console.
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl ConsoleOperator<StdinLock<'static>, Stdout> {
    /// Operator on the process' standard input and output.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the output sink, mostly for inspecting it in tests.
    pub fn into_output(self) -> W {
        self.output
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self
            .output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
        {
            warn!(error = %e, "Could not write to the console");
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|_| DetachError::Prompt)?;
        if read == 0 {
            return Err(DetachError::Prompt);
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn notify(&mut self, text: &str) {
        self.write(text);
        if !text.ends_with('\n') {
            self.write("\n");
        }
    }

    fn choose(&mut self, prompt: &str, options: &[Choice]) -> Result<Choice> {
        let Some(&default) = options.first() else {
            return Err(DetachError::Prompt);
        };
        let question = format!("{prompt} [{}] ", Choice::render(options));

        loop {
            self.write(&question);
            let answer = self.read_line()?;
            if answer.is_empty() {
                return Ok(default);
            }
            let picked = options.iter().copied().find(|c| {
                answer.len() == 1 && answer.eq_ignore_ascii_case(&c.key().to_string())
            });
            match picked {
                Some(choice) => return Ok(choice),
                None => self.write("Incorrect choice\n"),
            }
        }
    }

    fn suffix(&mut self, prompt: &str) -> Result<String> {
        self.write(prompt);
        self.read_line()
    }
}
