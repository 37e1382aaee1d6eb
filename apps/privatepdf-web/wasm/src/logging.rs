//! Forward `tracing` events to the browser console
//!
//! The core crate reports skipped form fields, broken images and pages that
//! were never rendered through `tracing`. In the browser those events are
//! formatted by `tracing-subscriber` and handed to the matching
//! `console.*` method.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl From<&Level> for ConsoleLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => ConsoleLevel::Error,
            Level::WARN => ConsoleLevel::Warn,
            Level::INFO => ConsoleLevel::Info,
            _ => ConsoleLevel::Debug,
        }
    }
}

type Sink = fn(ConsoleLevel, &str);

fn browser_console(level: ConsoleLevel, line: &str) {
    let message = JsValue::from_str(line);
    match level {
        ConsoleLevel::Error => web_sys::console::error_1(&message),
        ConsoleLevel::Warn => web_sys::console::warn_1(&message),
        ConsoleLevel::Info => web_sys::console::info_1(&message),
        ConsoleLevel::Debug => web_sys::console::debug_1(&message),
    }
}

/// Hands out one [`ConsoleWriter`] per formatted event
#[derive(Clone, Copy)]
pub struct ConsoleMakeWriter {
    sink: Sink,
}

impl Default for ConsoleMakeWriter {
    fn default() -> Self {
        Self { sink: browser_console }
    }
}

/// Buffers one formatted event and emits it as a single console call when
/// dropped
pub struct ConsoleWriter {
    level: ConsoleLevel,
    sink: Sink,
    buffer: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end();
        if !line.is_empty() {
            (self.sink)(self.level, line);
        }
    }
}

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> ConsoleWriter {
        self.writer(ConsoleLevel::Info)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> ConsoleWriter {
        self.writer(ConsoleLevel::from(meta.level()))
    }
}

impl ConsoleMakeWriter {
    fn writer(&self, level: ConsoleLevel) -> ConsoleWriter {
        ConsoleWriter {
            level,
            sink: self.sink,
            buffer: Vec::new(),
        }
    }
}

/// Install the console subscriber. Later calls are no-ops.
pub fn init_console_logging(max_level: Level) {
    // No clock on wasm32-unknown-unknown, so timestamps are left out
    let _ = tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter::default())
        .with_max_level(max_level)
        .with_ansi(false)
        .without_time()
        .try_init();
}
