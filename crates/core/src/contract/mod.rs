//! Contract types shared by every layer
//!
//! - [`Version`]: the `(created_at_ns, revision)` pair every mutation produces
//! - [`NanoClock`]: the strictly increasing clock `created_at_ns` is read from

pub mod timestamp;
pub mod version;

pub use timestamp::{wall_clock_ns, NanoClock};
pub use version::Version;
