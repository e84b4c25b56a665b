//! Console print coordinator for synchronization progress

use console::style;
use hashgen_files::{ProgressSink, SyncEvent};
use std::io::{self, Write};

/// Prints progress events, grouping consecutive events of one category
/// under a single heading
pub struct ConsoleProgress<W: Write = io::Stdout> {
    out: W,
    quiet: bool,
    last_category: Option<&'static str>,
}

impl ConsoleProgress<io::Stdout> {
    /// Print to standard output
    pub fn stdout(quiet: bool) -> Self {
        Self::new(io::stdout(), quiet)
    }
}

impl<W: Write> ConsoleProgress<W> {
    /// Print to `out`; `quiet` suppresses all output
    pub fn new(out: W, quiet: bool) -> Self {
        Self {
            out,
            quiet,
            last_category: None,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, event: &SyncEvent) -> io::Result<()> {
        let category = event.category();
        if self.last_category != Some(category) {
            if self.last_category.is_some() {
                writeln!(self.out)?;
            }
            self.last_category = Some(category);
        }

        match event {
            SyncEvent::RemovingOrphans { count } => {
                writeln!(self.out, "{} ({count})", style(category).bold())
            }
            SyncEvent::Hashing { name } => {
                writeln!(self.out, "{} {name}", style(category).bold())
            }
        }
    }
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn on_event(&mut self, event: SyncEvent) {
        if self.quiet {
            return;
        }
        if let Err(e) = self.print(&event) {
            tracing::debug!(error = %e, "Failed to print progress");
        }
    }
}
