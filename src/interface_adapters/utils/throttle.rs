use std::time::{Duration, Instant};

pub const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// Rate limiter for repetitive warnings (at most one line per `LOG_THROTTLE`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogThrottle {
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn should_log(&mut self) -> bool {
        match self.last {
            Some(last) if last.elapsed() < LOG_THROTTLE => false,
            _ => {
                self.last = Some(Instant::now());
                true
            }
        }
    }
}
