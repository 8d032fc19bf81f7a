//! Small self-contained helpers.

pub mod time;

pub use time::Timer;
