//! CPU–GPU synchronisation: [`Fence`].
//!
//! A dispatch session submits once and fence-waits for completion
//! before reading results back; there is no cross-queue work, so no
//! semaphores are needed. Fences are created unsignaled and tracked
//! through a `Ready`/`Submitted` status so misuse (waiting on a fence
//! that was never submitted) is caught at the API level rather than
//! surfacing as a validation error or a hang.

use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::Device;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CreateFenceError {
    #[error("Vulkan error creating fence: {0}")]
    Vulkan(vk::Result),
}

#[derive(Debug, Error)]
pub enum WaitFenceError {
    #[error("Fence wait timed out")]
    Timeout,
    #[error("Vulkan error waiting for fence: {0}")]
    Vulkan(vk::Result),
    #[error("Asked to wait for fence but fence was never marked as submitted")]
    NotSubmitted,
}

#[derive(Debug, Error)]
pub enum MarkSubmittedError {
    #[error(
        "This fence is already marked as submitted but was marked \
         submitted again"
    )]
    AlreadySubmitted,
}

// ---------------------------------------------------------------------------
// Fence
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum FenceStatus {
    Submitted,
    Ready,
}

/// An owned binary fence used for CPU–GPU synchronisation.
///
/// Created unsignaled; [`mark_submitted`](Self::mark_submitted) after
/// handing the raw handle to a queue submission, then
/// [`wait`](Self::wait) to block until the GPU signals it.
pub struct Fence {
    parent: Arc<Device>,
    handle: vk::Fence,
    status: FenceStatus,
}

impl std::fmt::Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence")
            .field("handle", &self.handle)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Fence {
    /// Create an unsignaled fence.
    pub fn new(device: &Arc<Device>) -> Result<Self, CreateFenceError> {
        let create_info = vk::FenceCreateInfo::default();

        // SAFETY: create_info is fully initialised with no borrowed pointers.
        let handle = unsafe { device.create_raw_fence(&create_info) }
            .map_err(CreateFenceError::Vulkan)?;

        Ok(Self {
            parent: Arc::clone(device),
            handle,
            status: FenceStatus::Ready,
        })
    }

    /// Poll whether the fence has been signaled without blocking.
    pub fn wait_nonblocking(&self) -> Result<bool, WaitFenceError> {
        match self.wait(0) {
            Ok(_) => Ok(true),
            Err(WaitFenceError::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Block until the fence is signaled or `timeout_ns` nanoseconds elapse.
    ///
    /// Pass `u64::MAX` to wait indefinitely.
    pub fn wait(&self, timeout_ns: u64) -> Result<(), WaitFenceError> {
        if self.status == FenceStatus::Submitted {
            // SAFETY: handle is a valid fence created from parent.
            unsafe {
                self.parent.wait_for_raw_fences(
                    &[self.handle],
                    true,
                    timeout_ns,
                )
            }
            .map_err(|e| {
                if e == vk::Result::TIMEOUT {
                    WaitFenceError::Timeout
                } else {
                    WaitFenceError::Vulkan(e)
                }
            })
        } else {
            Err(WaitFenceError::NotSubmitted)
        }
    }

    /// This marks the fence as submitted, so that it can properly be waited.
    ///
    /// # Safety
    /// The fence must actually be submitted to some operation that will signal
    /// it when the operation is completed, such as vkQueueSubmit. It is
    /// undefined behavior if this operation is called while the underlying
    /// VkFence is not submitted
    pub unsafe fn mark_submitted(&mut self) -> Result<(), MarkSubmittedError> {
        if self.status == FenceStatus::Ready {
            self.status = FenceStatus::Submitted;
            Ok(())
        } else {
            Err(MarkSubmittedError::AlreadySubmitted)
        }
    }

    pub fn raw_fence(&self) -> vk::Fence {
        self.handle
    }

    pub fn parent(&self) -> &Arc<Device> {
        &self.parent
    }

    /// Is the fence in a submitted state where we can wait on it
    pub fn is_submitted(&self) -> bool {
        self.status == FenceStatus::Submitted
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        tracing::debug!("Dropping fence {:?}", self.handle);
        // SAFETY: handle was created from parent and is being destroyed during
        // teardown. No GPU work may reference this fence.
        unsafe { self.parent.destroy_raw_fence(self.handle) };
    }
}
