//! Prompted line input.
//!
//! The session and the allocator never read stdin directly; they go through
//! a [`Prompter`] so that tests can drive them with scripted answers.

use std::io::{self, BufRead, Write};

/// Provider of prompted input lines.
pub trait Prompter {
    /// Display `prompt` and read one line, without the trailing newline.
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] when the input is exhausted.
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;
}

/// Prompter reading from stdin and writing prompts to stdout.
pub struct StdPrompter;

impl Prompter for StdPrompter {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        Ok(line)
    }
}

/// Ask for a value until the operator provides a parsable one.
///
/// Empty input takes the default, if there is one, with an echoed
/// confirmation; unparsable input prints `Invalid value` and asks again.
pub fn ask_value<T, F>(
    prompter: &mut dyn Prompter,
    prompt: &str,
    default: Option<T>,
    mut parse: F,
) -> io::Result<T>
where
    T: std::fmt::Display + Copy,
    F: FnMut(&str) -> Option<T>,
{
    loop {
        let line = prompter.read_line(prompt)?;
        let line = line.trim();
        if line.is_empty() {
            if let Some(default) = default {
                println!("Using default value {default}");
                return Ok(default);
            }
            continue;
        }
        match parse(line) {
            Some(value) => return Ok(value),
            None => println!("Invalid value"),
        }
    }
}

/// Ask for a partition number.
pub fn ask_partition(prompter: &mut dyn Prompter, last: u32) -> io::Result<u32> {
    ask_value(
        prompter,
        &format!("Partition number (1-{last}): "),
        None,
        |input| input.parse::<u32>().ok(),
    )
}

/// Prompter replaying a fixed script of answers.
#[cfg(test)]
pub struct ScriptedPrompter {
    lines: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            lines: lines.into_iter().map(str::to_owned).collect(),
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, _prompt: &str) -> io::Result<String> {
        self.lines
            .pop_front()
            .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_ask_value_default_and_reprompt() {
        let mut prompter = ScriptedPrompter::new(["", "x", "42"]);
        let value = ask_value(&mut prompter, "? ", Some(7u64), |s| s.parse().ok()).unwrap();
        assert_eq!(value, 7);
        // Without a default, invalid input keeps asking.
        let value = ask_value(&mut prompter, "? ", None, |s| s.parse::<u64>().ok()).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    pub fn test_exhausted_script_reports_eof() {
        let mut prompter = ScriptedPrompter::new([]);
        let error = ask_value(&mut prompter, "? ", None, |s| s.parse::<u64>().ok()).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }
}
