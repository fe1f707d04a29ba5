//! Scoped timing through `tracing`.

use std::time::{Duration, Instant};

use tracing::Level;

const DEFAULT_KEY: &str = "Profiler.Stopwatch";

/// Entry point for stopwatches.
///
/// ```
/// use layercache::Profiler;
///
/// {
///     let _watch = Profiler::stopwatch_debug("load-user");
///     // ... timed work ...
/// } // logs `key=load-user elapsed=...` at debug
/// ```
pub struct Profiler;

impl Profiler {
    /// Start a stopwatch that logs its elapsed time at `level` when dropped.
    /// A blank `key` is replaced with `Profiler.Stopwatch`.
    pub fn stopwatch(level: Level, key: &str) -> Stopwatch {
        let key = if key.trim().is_empty() {
            DEFAULT_KEY.to_string()
        } else {
            key.to_string()
        };
        Stopwatch {
            key,
            level,
            started: Instant::now(),
        }
    }

    pub fn stopwatch_trace(key: &str) -> Stopwatch {
        Self::stopwatch(Level::TRACE, key)
    }

    pub fn stopwatch_debug(key: &str) -> Stopwatch {
        Self::stopwatch(Level::DEBUG, key)
    }

    pub fn stopwatch_info(key: &str) -> Stopwatch {
        Self::stopwatch(Level::INFO, key)
    }
}

/// Running stopwatch; reports on drop.
#[must_use = "the stopwatch reports when dropped; binding it to `_` drops it immediately"]
#[derive(Debug)]
pub struct Stopwatch {
    key: String,
    level: Level,
    started: Instant,
}

impl Stopwatch {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let key = self.key.as_str();
        // Event levels must be constants, hence one call per level.
        if self.level == Level::TRACE {
            tracing::trace!(key = %key, ?elapsed, "stopwatch");
        } else if self.level == Level::DEBUG {
            tracing::debug!(key = %key, ?elapsed, "stopwatch");
        } else if self.level == Level::INFO {
            tracing::info!(key = %key, ?elapsed, "stopwatch");
        } else if self.level == Level::WARN {
            tracing::warn!(key = %key, ?elapsed, "stopwatch");
        } else {
            tracing::error!(key = %key, ?elapsed, "stopwatch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(level: Level, f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_blank_key_uses_default() {
        let watch = Profiler::stopwatch(Level::INFO, "  ");
        assert_eq!(watch.key(), "Profiler.Stopwatch");
        assert_eq!(watch.level(), Level::INFO);
    }

    #[test]
    fn test_logs_on_drop() {
        let output = capture(Level::DEBUG, || {
            let _watch = Profiler::stopwatch_debug("load-user");
            std::thread::sleep(Duration::from_millis(2));
        });

        assert!(output.contains("DEBUG"), "{output}");
        assert!(output.contains("key=load-user"), "{output}");
        assert!(output.contains("elapsed="), "{output}");
    }

    #[test]
    fn test_level_is_respected() {
        let output = capture(Level::INFO, || {
            let _quiet = Profiler::stopwatch_trace("hidden");
        });
        assert!(!output.contains("hidden"), "{output}");

        let output = capture(Level::INFO, || {
            let _loud = Profiler::stopwatch_info("");
        });
        assert!(output.contains("Profiler.Stopwatch"), "{output}");
    }

    #[test]
    fn test_elapsed_grows() {
        let watch = Profiler::stopwatch_info("tick");
        std::thread::sleep(Duration::from_millis(5));
        assert!(watch.elapsed() >= Duration::from_millis(5));
    }
}
