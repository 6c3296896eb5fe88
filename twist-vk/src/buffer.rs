//! Host-visible buffer wrapper.
//!
//! [`HostVisibleBuffer`] pairs a `VkBuffer` with its own dedicated
//! `VkDeviceMemory` allocation, selected to be HOST_VISIBLE and
//! HOST_COHERENT so the CPU can read and write it directly with no
//! staging copies or explicit flushes. Creation performs the full
//! query-select-allocate-bind sequence; any failure unwinds the steps
//! already taken, so callers never observe a half-built buffer.
//!
//! Host access goes through [`HostVisibleBuffer::write_bytes`] and
//! [`HostVisibleBuffer::read_bytes`], each of which maps the memory,
//! copies, and unmaps before returning. No mapping outlives a call.

use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::{Device, find_memory_type};

#[derive(Debug, Error)]
pub enum BufferCreationError {
    #[error("Failed to create buffer: {0}")]
    BufferCreation(vk::Result),

    #[error(
        "No memory type satisfies flags {required:?} \
         for buffer type bits {type_bits:#x}"
    )]
    NoCompatibleMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },

    #[error("Failed to allocate buffer memory: {0}")]
    Allocation(vk::Result),

    #[error("Failed to bind buffer memory: {0}")]
    Bind(vk::Result),
}

#[derive(Debug, Error)]
#[error("Failed to map buffer memory: {0}")]
pub struct MapError(pub vk::Result);

/// A buffer backed by a dedicated host-visible, host-coherent memory
/// allocation.
pub struct HostVisibleBuffer {
    parent: Arc<Device>,
    handle: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl std::fmt::Debug for HostVisibleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostVisibleBuffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Drop for HostVisibleBuffer {
    fn drop(&mut self) {
        tracing::debug!("Dropping buffer {:?}", self.handle);
        //SAFETY: The buffer is destroyed before the memory it is bound
        //to is freed, and callers must not drop a buffer that pending
        //GPU work still references.
        unsafe {
            self.parent.destroy_raw_buffer(self.handle);
            self.parent.free_raw_memory(self.memory);
        }
    }
}

impl HostVisibleBuffer {
    /// Create a buffer of `size` bytes with `usage`, bound to fresh
    /// host-visible memory.
    ///
    /// `size` must be non-zero (zero-sized buffers are invalid in
    /// Vulkan); callers dispatching over empty inputs short-circuit
    /// before reaching this point.
    pub fn new(
        device: &Arc<Device>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self, BufferCreationError> {
        debug_assert_ne!(size, 0);
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        // SAFETY: create_info is fully initialised above and references
        // no external objects.
        let handle = unsafe { device.create_raw_buffer(&create_info) }
            .map_err(BufferCreationError::BufferCreation)?;

        // SAFETY: handle was just created from device.
        let requirements =
            unsafe { device.get_raw_buffer_memory_requirements(handle) };

        let required = vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT;
        let Some(memory_type_index) = find_memory_type(
            device.memory_properties(),
            requirements.memory_type_bits,
            required,
        ) else {
            tracing::error!(
                "No memory type satisfies {:?} for buffer type bits {:#x}",
                required,
                requirements.memory_type_bits,
            );
            // SAFETY: handle was created above and never bound or used.
            unsafe { device.destroy_raw_buffer(handle) };
            return Err(BufferCreationError::NoCompatibleMemoryType {
                type_bits: requirements.memory_type_bits,
                required,
            });
        };

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        // SAFETY: memory_type_index came from this device's memory
        // properties and the size is the buffer's own requirement.
        let memory = match unsafe { device.allocate_raw_memory(&allocate_info) }
        {
            Ok(m) => m,
            Err(e) => {
                // SAFETY: handle was created above and never bound or used.
                unsafe { device.destroy_raw_buffer(handle) };
                return Err(BufferCreationError::Allocation(e));
            }
        };

        // SAFETY: handle and memory were both just created from device;
        // the allocation is exactly the buffer's required size.
        if let Err(e) =
            unsafe { device.bind_raw_buffer_memory(handle, memory, 0) }
        {
            // SAFETY: Both handles were created above; the failed bind
            // leaves the buffer unbound so destruction order is free.
            unsafe {
                device.destroy_raw_buffer(handle);
                device.free_raw_memory(memory);
            }
            return Err(BufferCreationError::Bind(e));
        }

        Ok(Self {
            parent: Arc::clone(device),
            handle,
            memory,
            size,
        })
    }

    pub fn raw_buffer(&self) -> vk::Buffer {
        self.handle
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Copy `data` into the buffer starting at byte 0.
    ///
    /// Maps, copies, and unmaps; the memory is host-coherent so no
    /// explicit flush is needed. Panics if `data` exceeds the buffer
    /// size.
    pub fn write_bytes(&self, data: &[u8]) -> Result<(), MapError> {
        assert!(
            data.len() as vk::DeviceSize <= self.size,
            "write of {} bytes exceeds buffer size {}",
            data.len(),
            self.size
        );
        if data.is_empty() {
            return Ok(());
        }
        // SAFETY: memory is a host-visible allocation owned by self and
        // is not currently mapped; the range is within the allocation.
        let ptr = unsafe {
            self.parent.map_raw_memory(
                self.memory,
                0,
                data.len() as vk::DeviceSize,
            )
        }
        .map_err(MapError)?;

        // SAFETY: ptr points to at least data.len() mapped bytes and the
        // mapping does not overlap data.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                ptr.cast::<u8>(),
                data.len(),
            );
            self.parent.unmap_raw_memory(self.memory);
        }
        Ok(())
    }

    /// Copy the buffer's first `out.len()` bytes into `out`.
    ///
    /// Callers must ensure any GPU writes to the buffer have completed
    /// (fence wait) before reading. Panics if `out` exceeds the buffer
    /// size.
    pub fn read_bytes(&self, out: &mut [u8]) -> Result<(), MapError> {
        assert!(
            out.len() as vk::DeviceSize <= self.size,
            "read of {} bytes exceeds buffer size {}",
            out.len(),
            self.size
        );
        if out.is_empty() {
            return Ok(());
        }
        // SAFETY: memory is a host-visible allocation owned by self and
        // is not currently mapped; the range is within the allocation.
        let ptr = unsafe {
            self.parent.map_raw_memory(
                self.memory,
                0,
                out.len() as vk::DeviceSize,
            )
        }
        .map_err(MapError)?;

        // SAFETY: ptr points to at least out.len() mapped bytes and the
        // mapping does not overlap out.
        unsafe {
            std::ptr::copy_nonoverlapping(
                ptr.cast::<u8>(),
                out.as_mut_ptr(),
                out.len(),
            );
            self.parent.unmap_raw_memory(self.memory);
        }
        Ok(())
    }
}
