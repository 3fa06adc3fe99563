//! JSON-line logger
//!
//! Each record is written as one self-contained JSON object per line. The
//! sink sits behind a mutex so concurrent records never interleave.

use std::fmt;
use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::Level;

// == Log Record ==
/// One emitted log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub msg: String,
    pub appname: String,
    /// RFC 3339, UTC
    pub time: String,
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

// == Logger ==
/// Formats and delivers log records at or above a minimum level.
///
/// A `Logger` is built once at startup and shared (behind an `Arc`) by every
/// request; per-request correlation is added through [`Logger::scoped`].
pub struct Logger {
    sink: Mutex<Box<dyn Write + Send>>,
    appname: String,
    min_level: Level,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("appname", &self.appname)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Creates a logger writing to `writer`.
    pub fn new<W>(writer: W, appname: impl Into<String>, min_level: Level) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            sink: Mutex::new(Box::new(writer)),
            appname: appname.into(),
            min_level,
        }
    }

    /// Creates a logger writing to standard output.
    pub fn stdout(appname: impl Into<String>, min_level: Level) -> Self {
        Self::new(io::stdout(), appname, min_level)
    }

    /// Whether a record at `level` would be written. `Fatal` always is.
    pub fn enabled(&self, level: Level) -> bool {
        level == Level::Fatal || level >= self.min_level
    }

    /// Logs a message. `args` is only rendered when the level passes the filter.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        self.emit(level, args, None);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warning(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warning, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Fatal, args);
    }

    /// Returns a view of this logger that tags every record with `request_id`.
    pub fn scoped<'a>(&'a self, request_id: &'a str) -> ScopedLogger<'a> {
        ScopedLogger {
            logger: self,
            request_id,
        }
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>, request_id: Option<&str>) {
        if !self.enabled(level) {
            return;
        }

        let record = LogRecord {
            msg: fmt::format(args),
            appname: self.appname.clone(),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: level.as_str().to_string(),
            request_id: request_id.map(str::to_string),
        };

        match serde_json::to_string(&record) {
            Ok(line) => self.write_line(&line),
            Err(err) => {
                let fallback = serde_json::json!({
                    "msg": format!("Error serializing log message: {:?} ({})", record, err),
                    "appname": self.appname,
                });
                self.write_line(&fallback.to_string());
            }
        }
    }

    fn write_line(&self, line: &str) {
        let mut sink = self.sink.lock();
        // Nowhere left to report a failing log sink.
        let _ = writeln!(sink, "{}", line).and_then(|_| sink.flush());
    }
}

// == Scoped Logger ==
/// A borrowed, request-correlated view of a [`Logger`].
#[derive(Debug, Clone, Copy)]
pub struct ScopedLogger<'a> {
    logger: &'a Logger,
    request_id: &'a str,
}

impl ScopedLogger<'_> {
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        self.logger.emit(level, args, Some(self.request_id));
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warning(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warning, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::LogRecord;

    /// In-memory sink that can be inspected after logging.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn records(&self) -> Vec<LogRecord> {
            let data = self.0.lock();
            String::from_utf8_lossy(&data)
                .lines()
                .map(|line| serde_json::from_str(line).expect("log line is JSON"))
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::SharedBuffer;
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn setup(level: Level) -> (SharedBuffer, Logger) {
        let buffer = SharedBuffer::default();
        let logger = Logger::new(buffer.clone(), "logtest", level);
        (buffer, logger)
    }

    #[test]
    fn test_each_level_writes_one_record() {
        let cases = [
            (Level::Debug, "Debug your bugs"),
            (Level::Info, "Info wars"),
            (Level::Warning, "Consider yourself warned"),
            (Level::Error, "Errors are bad"),
            (Level::Fatal, "Fatal attraction"),
        ];

        for (level, msg) in cases {
            let (buffer, logger) = setup(Level::Debug);
            logger.log(level, format_args!("{}", msg));

            let records = buffer.records();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].msg, msg);
            assert_eq!(records[0].level, level.as_str());
            assert_eq!(records[0].appname, "logtest");
            assert!(records[0].request_id.is_none());
        }
    }

    #[test]
    fn test_records_below_minimum_are_dropped() {
        let (buffer, logger) = setup(Level::Info);

        logger.debug(format_args!("hidden {}", 1));
        assert!(buffer.records().is_empty());

        logger.info(format_args!("shown {}", 2));
        logger.error(format_args!("shown {}", 3));

        let records = buffer.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].msg, "shown 2");
        assert_eq!(records[0].level, "INFO");
        assert_eq!(records[1].level, "ERROR");
    }

    #[test]
    fn test_fatal_is_always_emitted() {
        let (buffer, logger) = setup(Level::Fatal);

        logger.error(format_args!("nope"));
        logger.fatal(format_args!("yes"));

        let records = buffer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, "FATAL");
    }

    #[test]
    fn test_suppressed_records_are_not_formatted() {
        struct Panics;
        impl fmt::Display for Panics {
            fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
                panic!("formatted a suppressed record");
            }
        }

        let (buffer, logger) = setup(Level::Error);
        logger.debug(format_args!("{}", Panics));
        logger.scoped("abc").warning(format_args!("{}", Panics));
        assert!(buffer.records().is_empty());
    }

    #[test]
    fn test_scoped_logger_adds_request_id() {
        let (buffer, logger) = setup(Level::Debug);

        logger.scoped("1234").error(format_args!("with id"));
        logger.info(format_args!("without id"));

        let records = buffer.records();
        assert_eq!(records[0].request_id.as_deref(), Some("1234"));
        assert!(records[1].request_id.is_none());
    }

    #[test]
    fn test_time_is_rfc3339_utc() {
        let (buffer, logger) = setup(Level::Debug);
        logger.info(format_args!("tick"));

        let time = &buffer.records()[0].time;
        assert!(time.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(time).is_ok());
    }

    #[test]
    fn test_concurrent_scoped_loggers_do_not_interleave() {
        let buffer = SharedBuffer::default();
        let logger = Arc::new(Logger::new(buffer.clone(), "logtest", Level::Debug));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    let id = format!("req-{}", i);
                    let scoped = logger.scoped(&id);
                    for n in 0..50 {
                        scoped.info(format_args!("message {} from {}", n, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = buffer.records();
        assert_eq!(records.len(), 400);
        for record in records {
            let id = record.request_id.unwrap();
            assert!(record.msg.ends_with(id.trim_start_matches("req-")));
        }
    }
}
