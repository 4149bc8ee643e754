//! Line splitting and formatting for the console log writer.
//!
//! The fmt subscriber writes one event as several `write` calls ending in a
//! newline; the browser console wants one call per line, at the severity of
//! the event.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;

/// Plain-text fmt subscriber writing through `writer`. Timestamps are left to
/// the devtools; `SystemTime` is not available on wasm32 anyway.
pub(crate) fn subscriber<W>(writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(Level::INFO)
        .without_time()
        .with_target(false)
        .finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleLevel {
    Log,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub(crate) fn for_level(level: &Level) -> Self {
        if *level == Level::ERROR {
            Self::Error
        } else if *level == Level::WARN {
            Self::Warn
        } else {
            Self::Log
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Buffers `bytes` and returns every line completed by them.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            lines.extend(line_text(&line));
        }
        lines
    }

    /// Returns whatever is left without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        line_text(&rest)
    }
}

fn line_text(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_end();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("capture lock")).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn subscriber_writes_plain_info_lines() {
        let captured = Captured::default();
        tracing::subscriber::with_default(subscriber(captured.clone()), || {
            tracing::info!(attempts = 3, "sidebar patch armed");
            tracing::debug!("observer left unarmed");
        });

        let mut buffer = LineBuffer::default();
        let lines = buffer.push(captured.text().as_bytes());
        assert_eq!(lines.len(), 1, "debug events are filtered: {lines:?}");
        assert!(!lines[0].contains('\u{1b}'), "no escape codes: {:?}", lines[0]);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].ends_with("sidebar patch armed attempts=3"));
        assert!(!lines[0].contains("sidebar_patch_web"));
    }

    #[test]
    fn severities_map_to_console_methods() {
        assert_eq!(ConsoleLevel::for_level(&Level::ERROR), ConsoleLevel::Error);
        assert_eq!(ConsoleLevel::for_level(&Level::WARN), ConsoleLevel::Warn);
        assert_eq!(ConsoleLevel::for_level(&Level::INFO), ConsoleLevel::Log);
        assert_eq!(ConsoleLevel::for_level(&Level::TRACE), ConsoleLevel::Log);
    }

    #[test]
    fn lines_are_emitted_once_complete() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b" WARN sidebar_patch: persistent ").is_empty());
        assert_eq!(
            buffer.push(b"storage denied\n INFO armed"),
            vec![" WARN sidebar_patch: persistent storage denied".to_string()]
        );
        assert_eq!(buffer.finish().as_deref(), Some(" INFO armed"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut buffer = LineBuffer::default();
        assert_eq!(
            buffer.push(b"\n\r\nfirst\n\nsecond\n"),
            vec!["first".to_string(), "second".to_string()]
        );
    }
}
