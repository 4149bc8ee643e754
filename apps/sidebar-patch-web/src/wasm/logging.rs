use std::io;

use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;

use super::*;
use crate::console_lines::{self, ConsoleLevel, LineBuffer};

/// Routes `tracing` output to the browser console.
pub(super) fn install() {
    let installed =
        tracing::subscriber::set_global_default(console_lines::subscriber(ConsoleMakeWriter));
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(ConsoleLevel::Log)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(ConsoleLevel::for_level(meta.level()))
    }
}

struct ConsoleWriter {
    level: ConsoleLevel,
    buffer: LineBuffer,
}

impl ConsoleWriter {
    fn new(level: ConsoleLevel) -> Self {
        Self {
            level,
            buffer: LineBuffer::default(),
        }
    }

    fn emit(&self, line: &str) {
        let line = JsValue::from_str(line);
        match self.level {
            ConsoleLevel::Log => web_sys::console::log_1(&line),
            ConsoleLevel::Warn => web_sys::console::warn_1(&line),
            ConsoleLevel::Error => web_sys::console::error_1(&line),
        }
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        for line in self.buffer.push(bytes) {
            self.emit(&line);
        }
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if let Some(line) = self.buffer.finish() {
            self.emit(&line);
        }
    }
}
