use scrub_core::StatusReporter;
use std::io::{self, Write};

/// Terminal output: messages on stdout, progress and status on stderr
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    show_progress: bool,
}

impl ConsoleReporter {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl StatusReporter for ConsoleReporter {
    fn message(&self, text: &str) {
        println!("{text}");
    }

    fn progress(&self, label: &str, current: usize, total: usize) {
        if !self.show_progress || total == 0 {
            return;
        }

        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r{}: {}/{}", label, current.min(total), total);
        if current >= total {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }

    fn status_bar_message(&self, text: &str) {
        if self.show_progress {
            eprintln!("[{text}]");
        }
    }
}
