pub mod clock;
pub mod throttle;
