//! Coordination primitives shared by long-running loops and trade attempts

pub mod cancel;

pub use cancel::{CancelHandle, CancelToken};
