use crate::report::Report;
use cpick_core::{MovieRecord, ResolutionChoice};
use cpick_engine::{PickError, ResolutionPrompt};
use std::io::{BufRead, Write};

/// Asks on a terminal what to do with a leftover selection, until the answer parses.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
    report: Report,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W, report: Report) -> Self {
        Self {
            input,
            output,
            report,
        }
    }

    fn ask(&mut self, leftover: &MovieRecord) -> std::io::Result<ResolutionChoice> {
        writeln!(self.output, "Still selected from last time:")?;
        writeln!(self.output, "  {}", self.report.render(leftover))?;
        loop {
            write!(self.output, "[w]atched, [u]nselect or [a]bort? ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(ResolutionChoice::Abort);
            }
            match line.parse::<ResolutionChoice>() {
                Ok(choice) => return Ok(choice),
                Err(_) => writeln!(self.output, "Please answer w, u or a.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> ResolutionPrompt for TerminalPrompt<R, W> {
    fn resolve(&mut self, leftover: &MovieRecord) -> Result<ResolutionChoice, PickError> {
        self.ask(leftover)
            .map_err(|err| PickError::Prompt(err.to_string()))
    }
}
