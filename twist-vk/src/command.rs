//! Command pool and one-shot command buffer wrappers.
//!
//! Dispatch sessions record each command buffer exactly once and
//! submit it exactly once, so buffers are allocated with
//! `ONE_TIME_SUBMIT` semantics and never reset or recycled.

use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::Device;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CreateCommandPoolError {
    #[error("Vulkan error creating command pool: {0}")]
    Vulkan(vk::Result),
}

#[derive(Debug, Error)]
pub enum AllocateCommandBufferError {
    #[error("Vulkan error allocating command buffer: {0}")]
    Vulkan(vk::Result),
}

// ---------------------------------------------------------------------------
// CommandPoolShared — private inner state co-owned by pool and its buffers
// ---------------------------------------------------------------------------

/// Shared ownership of the raw Vulkan pool handle.
///
/// Held via `Arc` by both [`CommandPool`] and every
/// [`OneTimeCommandBuffer`] allocated from it. The Vulkan pool is not
/// destroyed until all of those `Arc` clones are dropped, which prevents a
/// command buffer from holding a handle into a destroyed pool.
struct CommandPoolShared {
    parent: Arc<Device>,
    pool: vk::CommandPool,
}

impl Drop for CommandPoolShared {
    fn drop(&mut self) {
        tracing::debug!("Dropping command pool {:?}", self.pool);
        // SAFETY: pool was created from parent and is being destroyed. This
        // runs only when both CommandPool and every OneTimeCommandBuffer
        // allocated from it have been dropped. vkDestroyCommandPool
        // implicitly frees all allocated command buffers.
        unsafe { self.parent.destroy_raw_command_pool(self.pool) };
    }
}

// ---------------------------------------------------------------------------
// CommandPool
// ---------------------------------------------------------------------------

/// An owned command pool that allocates one-shot primary command buffers.
///
/// The Vulkan spec requires external synchronization for pool-level
/// operations (`vkAllocateCommandBuffers`); callers must not share a
/// `CommandPool` across threads without higher-level synchronization.
///
/// The underlying Vulkan pool is not destroyed until both this wrapper and
/// every [`OneTimeCommandBuffer`] allocated from it are dropped.
pub struct CommandPool {
    shared: Arc<CommandPoolShared>,
}

impl std::fmt::Debug for CommandPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPool")
            .field("pool", &self.shared.pool)
            .finish_non_exhaustive()
    }
}

impl CommandPool {
    /// Create a command pool for the given queue family.
    pub fn new(
        device: &Arc<Device>,
        queue_family: u32,
    ) -> Result<Self, CreateCommandPoolError> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family);

        // SAFETY: create_info uses a valid queue family index for this device.
        let pool = unsafe { device.create_raw_command_pool(&create_info) }
            .map_err(CreateCommandPoolError::Vulkan)?;

        Ok(Self {
            shared: Arc::new(CommandPoolShared {
                parent: Arc::clone(device),
                pool,
            }),
        })
    }

    /// Allocate a single primary command buffer from this pool.
    ///
    /// The returned buffer is in the initial state and must be recorded
    /// exactly once via [`OneTimeCommandBuffer::begin`] /
    /// [`OneTimeCommandBuffer::end`].
    ///
    /// The returned buffer holds a clone of the pool's shared inner `Arc`,
    /// so the underlying Vulkan pool is kept alive until both this pool and
    /// all its buffers are dropped.
    pub fn allocate_command_buffer(
        &self,
    ) -> Result<OneTimeCommandBuffer, AllocateCommandBufferError> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.shared.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        // SAFETY: allocate_info references a valid pool created from
        // parent. Callers keep pool access on a single thread.
        let handle = unsafe {
            self.shared
                .parent
                .allocate_raw_command_buffers(&allocate_info)
        }
        .map(|mut bufs| {
            debug_assert_eq!(bufs.len(), 1);
            bufs.remove(0)
        })
        .map_err(AllocateCommandBufferError::Vulkan)?;

        Ok(OneTimeCommandBuffer {
            _pool: Arc::clone(&self.shared),
            parent: Arc::clone(&self.shared.parent),
            handle,
        })
    }

    pub fn raw_command_pool(&self) -> vk::CommandPool {
        self.shared.pool
    }

    pub fn parent(&self) -> &Arc<Device> {
        &self.shared.parent
    }
}

// ---------------------------------------------------------------------------
// OneTimeCommandBuffer
// ---------------------------------------------------------------------------

/// A primary command buffer allocated from a [`CommandPool`], recorded and
/// submitted at most once.
///
/// All recording operations (`begin`, `end`, the `bind_*` and `dispatch`
/// commands) are `unsafe` — the caller is responsible for correct Vulkan
/// state sequencing.
///
/// The handle is freed implicitly when the pool's shared state is dropped;
/// there is no per-buffer `vkFreeCommandBuffers` call.
pub struct OneTimeCommandBuffer {
    /// Keeps the pool alive until this buffer is dropped.
    _pool: Arc<CommandPoolShared>,
    parent: Arc<Device>,
    handle: vk::CommandBuffer,
}

impl std::fmt::Debug for OneTimeCommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneTimeCommandBuffer")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl OneTimeCommandBuffer {
    /// Begin recording with `ONE_TIME_SUBMIT` semantics.
    ///
    /// # Safety
    /// The buffer must be in the initial state (freshly allocated).
    pub unsafe fn begin(&mut self) -> Result<(), vk::Result> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: Caller guarantees the buffer is in the initial state.
        unsafe {
            self.parent
                .begin_raw_command_buffer(self.handle, &begin_info)
        }
    }

    /// End recording.
    ///
    /// # Safety
    /// The buffer must be in the recording state.
    pub unsafe fn end(&mut self) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees the buffer is in the recording state.
        unsafe { self.parent.end_raw_command_buffer(self.handle) }
    }

    /// Bind a compute pipeline for subsequent dispatch commands.
    ///
    /// # Safety
    /// The buffer must be in the recording state. `pipeline` must be a valid
    /// compute pipeline created from the same device as this buffer.
    pub unsafe fn bind_compute_pipeline(&mut self, pipeline: vk::Pipeline) {
        // SAFETY: Caller guarantees recording state and pipeline validity.
        unsafe {
            self.parent
                .cmd_bind_compute_pipeline(self.handle, pipeline)
        }
    }

    /// Bind descriptor sets at the compute bind point.
    ///
    /// # Safety
    /// The buffer must be in the recording state. `layout` and all sets must
    /// be valid handles created from the same device as this buffer, and the
    /// sets must be compatible with `layout`.
    pub unsafe fn bind_compute_descriptor_sets(
        &mut self,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        // SAFETY: Caller guarantees recording state and handle compatibility.
        unsafe {
            self.parent.cmd_bind_compute_descriptor_sets(
                self.handle,
                layout,
                first_set,
                sets,
            )
        }
    }

    /// Record a compute dispatch.
    ///
    /// # Safety
    /// The buffer must be in the recording state with a compute pipeline
    /// bound and all descriptor sets it statically uses bound and valid.
    pub unsafe fn dispatch(
        &mut self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) {
        // SAFETY: Caller guarantees pipeline and descriptor state validity.
        unsafe {
            self.parent.cmd_dispatch(
                self.handle,
                group_count_x,
                group_count_y,
                group_count_z,
            )
        }
    }

    pub fn raw_command_buffer(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn parent(&self) -> &Arc<Device> {
        &self.parent
    }
}
