//! Progress bars and a log writer that prints above them.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

const IMPORT_TEMPLATE: &str =
    "{prefix:>10} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} [{elapsed_precise}, eta {eta}]";

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Progress display for one collection import; a no-op when hidden
pub struct ImportProgress {
    bar: Option<ProgressBar>,
    handled: AtomicUsize,
}

impl ImportProgress {
    pub fn new(collection: &str, total: u64, visible: bool) -> Self {
        if !visible {
            return Self::hidden();
        }
        let bar = multi_progress().add(ProgressBar::new(total));
        if let Ok(style) = ProgressStyle::with_template(IMPORT_TEMPLATE) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix(collection.to_string());
        Self {
            bar: Some(bar),
            handled: AtomicUsize::new(0),
        }
    }

    pub fn hidden() -> Self {
        Self {
            bar: None,
            handled: AtomicUsize::new(0),
        }
    }

    /// Move to the next entry and show the running book; returns entries handled so far
    pub fn advance(&self, message: &str) -> usize {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            bar.set_message(message.to_string());
        }
        self.handled.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

/// Makes [`LogWriter`]s so tracing output does not tear the progress bars
#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Line-buffered writer that prints complete lines through the progress display
pub struct LogWriter {
    pending: String,
}

fn emit_line(line: &str) {
    let line = line.trim_end_matches('\r');
    let _ = multi_progress().println(line);
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.pending.find('\n') {
            emit_line(&self.pending[..idx]);
            self.pending.drain(..=idx);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            emit_line(&self.pending);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            pending: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_counts_handled_entries() {
        let progress = ImportProgress::hidden();
        assert_eq!(progress.advance("Book 1"), 1);
        assert_eq!(progress.advance("Book 1"), 2);
        progress.finish("done");
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_log_writer_buffers_partial_lines() {
        let mut writer = LogWriterFactory.make_writer();
        writer.write_all(b"first line\nsecond").unwrap();
        assert_eq!(writer.pending, "second");
        writer.flush().unwrap();
        assert!(writer.pending.is_empty());
    }
}
