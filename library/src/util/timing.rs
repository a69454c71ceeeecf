use std::borrow::Cow;
use std::time::Instant;

use log::{self, Level};

/// Logs the elapsed time of a scope when dropped.
pub struct ScopedTimer {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
}

impl ScopedTimer {
    pub fn with_level(label: impl Into<Cow<'static, str>>, level: Level) -> Self {
        Self {
            label: label.into(),
            level,
            start: Instant::now(),
        }
    }

    pub fn info(label: impl Into<Cow<'static, str>>) -> Self {
        Self::with_level(label, Level::Info)
    }

    pub fn debug(label: impl Into<Cow<'static, str>>) -> Self {
        Self::with_level(label, Level::Debug)
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if log::log_enabled!(self.level) {
            let micros = self.start.elapsed().as_micros();
            log::log!(self.level, "{} took {} us", self.label, micros);
        }
    }
}

pub fn measure_debug<T, F>(label: impl Into<Cow<'static, str>>, f: F) -> T
where
    F: FnOnce() -> T,
{
    let _timer = ScopedTimer::debug(label);
    f()
}
