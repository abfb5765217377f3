// file: src/ui/mod.rs
// version: 1.2.0
// guid: 9d04b7f6-2c81-4a5e-bd30-61e9f7a2c853

//! Interactive prompts and user-facing status lines.
//!
//! Prompts live behind the [`Prompter`] trait so command handlers can be
//! driven by a scripted implementation in tests. Status lines are distinct
//! from tracing output: tracing carries diagnostics, these carry the
//! conversation with the operator.

use std::io::{self, BufRead, Write};

use colored::Colorize;

use crate::{DvmError, Result};

/// Outcome of a prompt: either an answer or the user backing out.
/// Backing out is not an error; commands treat it as a clean abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer<T> {
    Value(T),
    Aborted,
}

impl<T> Answer<T> {
    pub fn aborted(&self) -> bool {
        matches!(self, Answer::Aborted)
    }
}

/// Interactive input source for command handlers.
pub trait Prompter: Send + Sync {
    /// Free-form text input with an optional default.
    fn input(&self, message: &str, default: Option<&str>) -> Result<Answer<String>>;

    /// Password input without echo.
    fn password(&self, message: &str) -> Result<Answer<String>>;

    /// Yes/no confirmation.
    fn confirm(&self, message: &str, default: bool) -> Result<Answer<bool>>;

    /// Pick one of the given choices; returns the index.
    fn select(&self, message: &str, choices: &[String]) -> Result<Answer<usize>>;

    /// Pick any subset of the given choices (label, preselected).
    fn multi_select(&self, message: &str, choices: &[(String, bool)]) -> Result<Answer<Vec<usize>>>;
}

/// Prompter reading from stdin and writing to stdout.
pub struct Console;

impl Console {
    fn read_line(&self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            // EOF
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

impl Prompter for Console {
    fn input(&self, message: &str, default: Option<&str>) -> Result<Answer<String>> {
        match default {
            Some(d) => print!("{} [{}]: ", message.bold(), d.cyan()),
            None => print!("{}: ", message.bold()),
        }
        io::stdout().flush()?;

        let line = match self.read_line()? {
            Some(line) => line,
            None => return Ok(Answer::Aborted),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return match default {
                Some(d) => Ok(Answer::Value(d.to_string())),
                None => Ok(Answer::Value(String::new())),
            };
        }
        Ok(Answer::Value(trimmed.to_string()))
    }

    fn password(&self, message: &str) -> Result<Answer<String>> {
        print!("{}: ", message.bold());
        io::stdout().flush()?;
        let secret = read_password_no_echo()?;
        println!();
        match secret {
            Some(s) => Ok(Answer::Value(s)),
            None => Ok(Answer::Aborted),
        }
    }

    fn confirm(&self, message: &str, default: bool) -> Result<Answer<bool>> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            print!("{} [{}]: ", message.bold(), hint);
            io::stdout().flush()?;
            let line = match self.read_line()? {
                Some(line) => line,
                None => return Ok(Answer::Aborted),
            };
            match line.trim().to_lowercase().as_str() {
                "" => return Ok(Answer::Value(default)),
                "y" | "yes" | "j" | "ja" => return Ok(Answer::Value(true)),
                "n" | "no" | "nein" => return Ok(Answer::Value(false)),
                _ => println!("{}", "Please answer y or n.".yellow()),
            }
        }
    }

    fn select(&self, message: &str, choices: &[String]) -> Result<Answer<usize>> {
        if choices.is_empty() {
            return Err(DvmError::validation("select called with no choices"));
        }
        println!("{}", message.bold());
        for (i, choice) in choices.iter().enumerate() {
            println!("  {}) {}", (i + 1).to_string().cyan(), choice);
        }
        loop {
            print!("Choice [1-{}]: ", choices.len());
            io::stdout().flush()?;
            let line = match self.read_line()? {
                Some(line) => line,
                None => return Ok(Answer::Aborted),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Ok(Answer::Aborted);
            }
            match trimmed.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => return Ok(Answer::Value(n - 1)),
                _ => println!("{}", "Invalid selection.".yellow()),
            }
        }
    }

    fn multi_select(&self, message: &str, choices: &[(String, bool)]) -> Result<Answer<Vec<usize>>> {
        println!("{}", message.bold());
        for (i, (label, checked)) in choices.iter().enumerate() {
            let mark = if *checked { "x" } else { " " };
            println!("  {}) [{}] {}", (i + 1).to_string().cyan(), mark, label);
        }
        let preselected: Vec<String> = choices
            .iter()
            .enumerate()
            .filter(|(_, (_, checked))| *checked)
            .map(|(i, _)| (i + 1).to_string())
            .collect();
        print!(
            "Numbers, comma-separated [{}]: ",
            preselected.join(",")
        );
        io::stdout().flush()?;

        let line = match self.read_line()? {
            Some(line) => line,
            None => return Ok(Answer::Aborted),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            let defaults = choices
                .iter()
                .enumerate()
                .filter(|(_, (_, checked))| *checked)
                .map(|(i, _)| i)
                .collect();
            return Ok(Answer::Value(defaults));
        }

        let mut picked = Vec::new();
        for part in trimmed.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => {
                    if !picked.contains(&(n - 1)) {
                        picked.push(n - 1);
                    }
                }
                _ => {
                    return Err(DvmError::validation(format!(
                        "invalid selection '{}'",
                        part
                    )))
                }
            }
        }
        Ok(Answer::Value(picked))
    }
}

/// Read a line from the terminal with echo disabled.
fn read_password_no_echo() -> Result<Option<String>> {
    use crossterm::event::{self, Event, KeyCode, KeyModifiers};
    use crossterm::terminal;
    use std::io::IsTerminal;

    // Fall back to a plain read when stdin is not a terminal (pipes,
    // redirected input): there is no echo to suppress.
    if !io::stdin().is_terminal() {
        return read_password_plain(io::stdin().lock());
    }

    terminal::enable_raw_mode().map_err(|e| DvmError::system(format!("raw mode: {}", e)))?;
    let mut secret = String::new();
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) => match key.code {
                KeyCode::Enter => break Ok(Some(secret.clone())),
                KeyCode::Esc => break Ok(None),
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    break Ok(None);
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            },
            Ok(_) => {}
            Err(e) => break Err(DvmError::system(format!("terminal read: {}", e))),
        }
    };
    terminal::disable_raw_mode().map_err(|e| DvmError::system(format!("raw mode: {}", e)))?;
    result
}

/// Plain password read for non-terminal stdin. EOF maps to an abort.
fn read_password_plain(mut reader: impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Informational step line.
pub fn status(message: &str) {
    println!("{} {}", "→".blue().bold(), message);
}

/// Step completed.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Step failed.
pub fn failure(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Non-fatal notice.
pub fn warn(message: &str) {
    println!("{} {}", "!".yellow().bold(), message.yellow());
}

/// Section header for a command.
pub fn header(title: &str) {
    println!("\n{}", title.yellow().bold());
}

/// Abort notice used when the user backs out of a prompt.
pub fn aborted() {
    println!("{}", "Aborted.".yellow());
}

/// Unwrap a prompt answer, returning cleanly from the surrounding command
/// handler when the user backs out.
#[macro_export]
macro_rules! ask {
    ($answer:expr) => {
        match $answer? {
            $crate::ui::Answer::Value(value) => value,
            $crate::ui::Answer::Aborted => {
                $crate::ui::aborted();
                return Ok(());
            }
        }
    };
}


#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedPrompter};
    use super::*;

    #[test]
    fn test_scripted_prompter_order() {
        let prompter = ScriptedPrompter::new(vec![
            Scripted::Input("/mnt/data".into()),
            Scripted::Confirm(true),
            Scripted::Select(0),
        ]);

        assert_eq!(
            prompter.input("mountpoint", None).unwrap(),
            Answer::Value("/mnt/data".to_string())
        );
        assert_eq!(prompter.confirm("sure?", false).unwrap(), Answer::Value(true));
        assert_eq!(
            prompter.select("fs", &["ext4".into(), "xfs".into()]).unwrap(),
            Answer::Value(0)
        );

        // No more scripted answers: further prompts are an error.
        assert!(prompter.confirm("again?", false).is_err());
    }

    #[test]
    fn test_scripted_input_falls_back_to_default() {
        let prompter = ScriptedPrompter::new(vec![Scripted::Input(String::new())]);
        assert_eq!(
            prompter.input("mountpoint", Some("/mnt/volumes")).unwrap(),
            Answer::Value("/mnt/volumes".to_string())
        );
    }

    #[test]
    fn test_abort_flows_through() {
        let prompter = ScriptedPrompter::new(vec![Scripted::Abort]);
        assert!(prompter.input("anything", None).unwrap().aborted());
    }

    #[test]
    fn test_password_plain_read() {
        let secret = read_password_plain(io::Cursor::new("s3cret\n")).unwrap();
        assert_eq!(secret, Some("s3cret".to_string()));

        // EOF without input means the user backed out.
        assert_eq!(read_password_plain(io::Cursor::new("")).unwrap(), None);
    }
}
