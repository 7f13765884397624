//! Child server process plumbing.
//!
//! Line framing, the [`port::ServerPort`] capability surface, and the
//! process-backed spawner that pumps the child's streams into a merged
//! line channel.

pub mod codec;
pub mod port;
pub mod spawner;
