//! Shared fixtures for scheduler tests.

use rota_config::RotationRecord;
use rota_core::StaticCatalog;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct SharedBufferWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for SharedBufferWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut guard = self.buf.lock().expect("buffer lock poisoned");
        guard.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct SharedMakeWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedMakeWriter {
    type Writer = SharedBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedBufferWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}

/// Run `f` with WARN+ logs captured; returns `f`'s result and the log text.
pub(crate) fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let log_buf = Arc::new(Mutex::new(Vec::new()));
    let make_writer = SharedMakeWriter {
        buf: Arc::clone(&log_buf),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(make_writer)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);

    let logs = String::from_utf8(log_buf.lock().expect("buffer lock poisoned").clone())
        .expect("logs should be valid UTF-8");
    (result, logs)
}

pub(crate) fn record(
    enabled: bool,
    players: u32,
    maps: &[&str],
    next_map: Option<&str>,
) -> RotationRecord {
    RotationRecord {
        enabled,
        players,
        maps: maps.iter().map(|m| m.to_string()).collect(),
        next_map: next_map.map(str::to_string),
    }
}

pub(crate) fn catalog(names: &[&str]) -> StaticCatalog {
    StaticCatalog::from_names(names.iter().copied())
}
