//! One-shot GPU twist dispatch engine.
//!
//! Uploads an ordered array of 4-component points plus two scalars to a
//! compute-capable device, runs a precompiled SPIR-V kernel once per
//! point, and reads the transformed points back in the same order.
//!
//! [`TwistEngine`] owns the Vulkan instance for its whole lifetime; every
//! dispatch provisions a fresh device and resource set and tears it down
//! completely when the result has been read back. Use
//! [`TwistEngine::twist_points`] for the blocking path or
//! [`TwistEngine::begin_twist`] to overlap CPU work with the GPU and
//! collect the result from the returned [`PendingTwist`].

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod data;
pub mod engine;
pub mod session;

pub use data::{Point, TwistParams};
pub use engine::{TwistEngine, TwistError};
pub use session::PendingTwist;
