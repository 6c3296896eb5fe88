//! Thin RAII wrappers around the Vulkan compute path, built on [`ash`].
//!
//! > **Personal project.** This crate is not intended for general use
//! > and makes no API stability guarantees.
//!
//! # Object hierarchy
//!
//! ```text
//! Instance
//! └── Device
//!     ├── HostVisibleBuffer
//!     ├── DescriptorSetLayout → DescriptorPool → DescriptorSet
//!     ├── PipelineLayout (with DescriptorSetLayout refs)
//!     ├── ShaderModule → EntryPoint → ComputePipeline
//!     ├── CommandPool → OneTimeCommandBuffer
//!     └── Fence
//! ```
//!
//! Each wrapper holds its parent via `Arc` so parents cannot be
//! destroyed while children are alive. There is no graphics or
//! presentation support here; everything is scoped to one-shot compute
//! dispatch.
//!
//! # Naming conventions
//!
//! | prefix  | meaning                                   |
//! |---------|-------------------------------------------|
//! | `raw_*` | accepts or returns a raw `ash::vk` handle |
//! | `ash_*` | returns the `ash` wrapper object          |

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod sync;

pub use ash;
