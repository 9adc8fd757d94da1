use std::io::{self, BufRead, Write};

use crate::adapter::Prompt;

/// The human in the loop during manual challenge resolution.
pub trait Operator {
    fn notify(&mut self, message: &str);

    /// `Ok(None)` when no answer can be obtained (closed input).
    fn ask(&mut self, prompt: &Prompt) -> io::Result<Option<String>>;
}

/// Prompts on the controlling terminal. Masked prompts do not echo.
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn ask(&mut self, prompt: &Prompt) -> io::Result<Option<String>> {
        let label = format!("{}: ", prompt.label);
        if prompt.masked {
            return match rpassword::prompt_password(label) {
                Ok(answer) => Ok(Some(answer.trim().to_string())),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
                Err(e) => Err(e),
            };
        }

        let mut stderr = io::stderr();
        write!(stderr, "{label}")?;
        stderr.flush()?;
        read_answer(&mut io::stdin().lock())
    }
}

pub(crate) fn read_answer(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
