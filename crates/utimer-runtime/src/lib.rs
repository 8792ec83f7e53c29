#![doc = "High-resolution microsecond timer hosted on a dedicated spin-wait thread."]

pub mod realtime;
pub mod spin;
pub mod timer;

pub use realtime::*;
pub use spin::*;
pub use timer::*;
