//! Logical device wrapper ([`Device`]) and compute-capability selection.
//!
//! `Device` wraps a `VkDevice` and centralises all per-device state:
//! the selected physical device, its cached properties and memory
//! properties, plus the compute queue and its family index.
//!
//! Physical device selection uses a priority-based fold: discrete GPUs
//! outrank integrated GPUs, and only devices exposing a usable compute
//! queue family are considered. [`Device::create_compute`] wraps this
//! selection and returns the highest-priority match.
//!
//! Queue-family and memory-type selection are exposed as pure functions
//! ([`find_compute_queue_family`], [`find_memory_type`]) so they can be
//! tested without a live device.
//!
//! All raw Vulkan operations on the device handle are surfaced as
//! `unsafe fn` methods prefixed with `raw_` (e.g. `create_raw_buffer`).
//! Higher-level wrappers in sibling modules call these rather than
//! accessing `ash::Device` directly.

use std::sync::{Arc, Mutex};

use ash::vk;
use thiserror::Error;

use crate::instance::{FetchPhysicalDeviceError, Instance};

/// Select a queue family for compute-only work.
///
/// Transfer and sparse-binding bits are masked out before inspection:
/// they are implied by compute support and must not disqualify a
/// family. The first family that supports compute *without* graphics
/// wins. A device whose only compute support rides on a combined
/// graphics+compute family yields `None` — the caller must treat that
/// as fatal rather than fall back to a graphics queue.
pub fn find_compute_queue_family(
    families: &[vk::QueueFamilyProperties],
) -> Option<u32> {
    let mask = !(vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING);
    families.iter().enumerate().find_map(|(idx, family)| {
        let masked = family.queue_flags & mask;
        if masked.contains(vk::QueueFlags::COMPUTE)
            && !masked.contains(vk::QueueFlags::GRAPHICS)
        {
            Some(idx as u32)
        } else {
            None
        }
    })
}

/// Select a memory type index satisfying `required` among the types
/// allowed by `type_bits`.
///
/// Scans types in ascending index order; the first match wins. The
/// result is a pure function of its inputs — no scoring, no heuristics
/// — so repeated calls with the same arguments always agree.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_properties.memory_types
        [..memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find_map(|(idx, ty)| {
            let allowed = type_bits & (1 << idx) != 0;
            (allowed && ty.property_flags.contains(required))
                .then_some(idx as u32)
        })
}

#[derive(Debug, Error)]
pub enum CreateComputeDeviceError {
    #[error("Host memory exhaustion while creating a compute device")]
    MemoryExhaustion,

    #[error("Unknown Vulkan error while creating a compute device: {0}")]
    UnknownVulkan(vk::Result),

    #[error("No physical device exposes a compute-only queue family")]
    NoComputeQueueFamily,

    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),
}

impl From<FetchPhysicalDeviceError> for CreateComputeDeviceError {
    fn from(value: FetchPhysicalDeviceError) -> Self {
        match value {
            FetchPhysicalDeviceError::MemoryExhaustion => {
                CreateComputeDeviceError::MemoryExhaustion
            }
            FetchPhysicalDeviceError::UnknownVulkan(e) => {
                CreateComputeDeviceError::UnknownVulkan(e)
            }
        }
    }
}

/// A logical Vulkan device holding a single compute queue.
///
/// Wraps an `ash::Device` together with the physical device it was
/// created from, cached device/memory properties, and the compute
/// queue behind a `Mutex` (queue submission requires external
/// synchronization per the Vulkan spec).
///
/// Constructed via [`Device::create_compute`]. Raw Vulkan operations
/// are exposed as `unsafe fn` methods prefixed with `raw_`.
pub struct Device {
    parent: Arc<Instance>,
    handle: ash::Device,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    compute_queue: Mutex<vk::Queue>,
    compute_queue_family: u32,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("handle", &self.handle.handle())
            .field("compute_queue_family", &self.compute_queue_family)
            .finish_non_exhaustive()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        tracing::debug!("Dropping device {:?}", self.handle.handle());
        //SAFETY: All objects derived from this device should be dropped
        //before this device is dropped.
        unsafe { self.handle.destroy_device(None) };
    }
}

impl Device {
    /// Create a logical device on the best compute-capable physical
    /// device.
    ///
    /// Every physical device without a compute-only queue family is
    /// filtered out; survivors are scored by device type (discrete >
    /// integrated > virtual) and the winner gets a logical device with
    /// one queue from its compute family.
    pub fn create_compute(
        instance: &Arc<Instance>,
    ) -> Result<Self, CreateComputeDeviceError> {
        let physical_devices = instance.fetch_raw_physical_devices()?;
        let device_type_priority = |dt: vk::PhysicalDeviceType| -> u32 {
            match dt {
                vk::PhysicalDeviceType::DISCRETE_GPU => 3,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
                vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
                _ => 0,
            }
        };

        struct DeviceCandidate {
            handle: vk::PhysicalDevice,
            props: vk::PhysicalDeviceProperties,
            compute_family: u32,
            score: u32,
        }

        let mut candidates: Vec<DeviceCandidate> = Vec::new();

        for &dev in &physical_devices {
            // SAFETY: dev was derived from instance.
            let props =
                unsafe { instance.get_raw_physical_device_properties(dev) };
            // SAFETY: dev was derived from instance.
            let queue_families = unsafe {
                instance.get_raw_physical_device_queue_family_properties(dev)
            };

            let Some(compute_family) =
                find_compute_queue_family(&queue_families)
            else {
                tracing::debug!(
                    "Skipping {:?}: no compute-only queue family",
                    props.device_name_as_c_str().unwrap_or(c"unknown"),
                );
                continue;
            };

            candidates.push(DeviceCandidate {
                handle: dev,
                props,
                compute_family,
                score: device_type_priority(props.device_type),
            });
        }

        let best = candidates
            .iter()
            .max_by_key(|c| c.score)
            .ok_or_else(|| {
                tracing::error!(
                    "No physical device exposes a compute-only queue family \
                     ({} device(s) enumerated)",
                    physical_devices.len(),
                );
                CreateComputeDeviceError::NoComputeQueueFamily
            })?;

        let physical_device = best.handle;
        let compute_queue_family = best.compute_family;
        // SAFETY: physical_device was selected from this instance.
        let memory_properties = unsafe {
            instance.get_raw_physical_device_memory_properties(physical_device)
        };
        tracing::info!(
            "Selected physical device: {:?} (type: {:?}, \
             compute queue family: {})",
            best.props.device_name_as_c_str().unwrap_or(c"unknown"),
            best.props.device_type,
            compute_queue_family,
        );

        let queue_priorities = [1.0f32];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(compute_queue_family)
            .queue_priorities(&queue_priorities);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info));

        // SAFETY: physical_device was derived from instance;
        // device_create_info is fully initialised above.
        let device = unsafe {
            instance.create_ash_device(physical_device, &device_create_info)
        }
        .map_err(CreateComputeDeviceError::DeviceCreationFailed)?;

        // SAFETY: device was just created with one queue in this family.
        let compute_queue =
            unsafe { device.get_device_queue(compute_queue_family, 0) };

        Ok(Self {
            parent: Arc::clone(instance),
            handle: device,
            physical_device,
            properties: best.props,
            memory_properties,
            compute_queue: Mutex::new(compute_queue),
            compute_queue_family,
        })
    }

    pub fn parent(&self) -> &Arc<Instance> {
        &self.parent
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn compute_queue_family(&self) -> u32 {
        self.compute_queue_family
    }

    pub fn ash_device(&self) -> &ash::Device {
        &self.handle
    }

    pub fn raw_device(&self) -> vk::Device {
        self.handle.handle()
    }

    /// Wait until all submitted work on this device has completed.
    ///
    /// This may block the calling thread and should generally be used for
    /// coarse-grained transitions (shutdown, teardown) rather than hot
    /// per-dispatch paths, which wait on a fence instead.
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        let _span = tracing::debug_span!("device_wait_idle").entered();
        // SAFETY: `self.handle` is a valid logical device for the lifetime of
        // `self`, and this call has no additional pointer preconditions.
        unsafe { self.handle.device_wait_idle() }
    }
}

// Queue submit functionality
impl Device {
    /// Submit work to the compute queue.
    ///
    /// # Safety
    /// All handles in `submits` must be valid and derived from this device.
    /// Command buffers must be in the executable state. Wait semaphores must be
    /// signaled. Signal semaphores must be unsignaled. `fence`, when not null,
    /// must be an unsignaled fence created from this device.
    pub unsafe fn compute_queue_submit(
        &self,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> Result<(), vk::Result> {
        let queue = self
            .compute_queue
            .lock()
            .expect("compute queue lock poisoned");
        // SAFETY: Caller guarantees all handle validity and
        // synchronization state.
        unsafe { self.handle.queue_submit(*queue, submits, fence) }
    }
}

// Buffer and memory functionality
impl Device {
    /// # Safety
    /// `create_info` must be valid and reference only objects derived from
    /// this device. All referenced pointers must remain valid for the
    /// duration of the call.
    pub unsafe fn create_raw_buffer(
        &self,
        create_info: &vk::BufferCreateInfo<'_>,
    ) -> Result<vk::Buffer, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_buffer(create_info, None) }
    }

    /// # Safety
    /// `buffer` must be a valid handle created from this device and not yet
    /// destroyed. No in-flight GPU work may still reference `buffer`.
    pub unsafe fn destroy_raw_buffer(&self, buffer: vk::Buffer) {
        // SAFETY: Caller guarantees buffer provenance and drop ordering.
        unsafe { self.handle.destroy_buffer(buffer, None) };
    }

    /// # Safety
    /// `buffer` must be a valid handle created from this device.
    pub unsafe fn get_raw_buffer_memory_requirements(
        &self,
        buffer: vk::Buffer,
    ) -> vk::MemoryRequirements {
        // SAFETY: Caller guarantees buffer provenance.
        unsafe { self.handle.get_buffer_memory_requirements(buffer) }
    }

    /// # Safety
    /// `allocate_info` must specify a valid memory type index for this
    /// device and a non-zero allocation size.
    pub unsafe fn allocate_raw_memory(
        &self,
        allocate_info: &vk::MemoryAllocateInfo<'_>,
    ) -> Result<vk::DeviceMemory, vk::Result> {
        // SAFETY: Caller guarantees allocate_info validity.
        unsafe { self.handle.allocate_memory(allocate_info, None) }
    }

    /// # Safety
    /// `memory` must be a valid allocation from this device, not mapped, and
    /// no buffer still bound to it may be in use by pending GPU work.
    pub unsafe fn free_raw_memory(&self, memory: vk::DeviceMemory) {
        // SAFETY: Caller guarantees memory provenance and drop ordering.
        unsafe { self.handle.free_memory(memory, None) };
    }

    /// # Safety
    /// `buffer` and `memory` must both be derived from this device; `buffer`
    /// must not already be bound; `offset` + the buffer's memory requirements
    /// must fit inside the allocation.
    pub unsafe fn bind_raw_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees handle provenance and bounds.
        unsafe { self.handle.bind_buffer_memory(buffer, memory, offset) }
    }

    /// Map a region of host-visible memory into the host address space.
    ///
    /// # Safety
    /// `memory` must be a host-visible allocation from this device, not
    /// already mapped, and `offset + size` must be within the allocation.
    pub unsafe fn map_raw_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> Result<*mut std::ffi::c_void, vk::Result> {
        // SAFETY: Caller guarantees memory provenance, mapping state,
        // and bounds.
        unsafe {
            self.handle.map_memory(
                memory,
                offset,
                size,
                vk::MemoryMapFlags::empty(),
            )
        }
    }

    /// # Safety
    /// `memory` must be currently mapped via
    /// [`map_raw_memory`](Self::map_raw_memory), and no live pointer into
    /// the mapping may be used after this call.
    pub unsafe fn unmap_raw_memory(&self, memory: vk::DeviceMemory) {
        // SAFETY: Caller guarantees mapping state.
        unsafe { self.handle.unmap_memory(memory) };
    }
}

// Shader module functionality
impl Device {
    /// # Safety
    /// `create_info` must contain valid SPIR-V code. All referenced pointers
    /// must remain valid for the duration of the call.
    pub unsafe fn create_raw_shader_module(
        &self,
        create_info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> Result<vk::ShaderModule, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_shader_module(create_info, None) }
    }

    /// # Safety
    /// `shader_module` must be a valid handle created from this device and
    /// not yet destroyed. All objects derived from it must be destroyed first.
    pub unsafe fn destroy_raw_shader_module(
        &self,
        shader_module: vk::ShaderModule,
    ) {
        // SAFETY: Caller guarantees shader_module provenance and drop ordering.
        unsafe { self.handle.destroy_shader_module(shader_module, None) };
    }
}

// Descriptor functionality
impl Device {
    /// # Safety
    /// `create_info` must reference valid binding descriptions for the
    /// duration of the call.
    pub unsafe fn create_raw_descriptor_set_layout(
        &self,
        create_info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_descriptor_set_layout(create_info, None) }
    }

    /// # Safety
    /// `layout` must be a valid handle created from this device. No
    /// descriptor pool or pipeline layout still using it may be alive.
    pub unsafe fn destroy_raw_descriptor_set_layout(
        &self,
        layout: vk::DescriptorSetLayout,
    ) {
        // SAFETY: Caller guarantees layout provenance and drop ordering.
        unsafe { self.handle.destroy_descriptor_set_layout(layout, None) };
    }

    /// # Safety
    /// `create_info` must be valid and reference only stack data for the
    /// duration of the call.
    pub unsafe fn create_raw_descriptor_pool(
        &self,
        create_info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_descriptor_pool(create_info, None) }
    }

    /// # Safety
    /// `pool` must be a valid handle created from this device. No in-flight
    /// GPU work may still reference descriptor sets allocated from it.
    pub unsafe fn destroy_raw_descriptor_pool(
        &self,
        pool: vk::DescriptorPool,
    ) {
        // SAFETY: Caller guarantees pool provenance and drop ordering.
        unsafe { self.handle.destroy_descriptor_pool(pool, None) };
    }

    /// # Safety
    /// `alloc_info` must reference a valid pool and valid layouts, all
    /// created from this device. The pool must be externally synchronized.
    pub unsafe fn allocate_raw_descriptor_sets(
        &self,
        alloc_info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        // SAFETY: Caller guarantees alloc_info validity and
        // pool synchronization.
        unsafe { self.handle.allocate_descriptor_sets(alloc_info) }
    }

    /// # Safety
    /// All handles referenced by `writes` and `copies` must be valid and
    /// derived from this device; no referenced descriptor set may be in use
    /// by pending GPU work.
    pub unsafe fn update_raw_descriptor_sets(
        &self,
        writes: &[vk::WriteDescriptorSet<'_>],
        copies: &[vk::CopyDescriptorSet<'_>],
    ) {
        // SAFETY: Caller guarantees handle validity and usage state.
        unsafe { self.handle.update_descriptor_sets(writes, copies) }
    }
}

// Pipeline functionality
impl Device {
    /// # Safety
    /// `create_info` must be a valid pipeline layout create info. All
    /// referenced descriptor set layouts must be valid handles created from
    /// this device.
    pub unsafe fn create_raw_pipeline_layout(
        &self,
        create_info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> Result<vk::PipelineLayout, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_pipeline_layout(create_info, None) }
    }

    /// # Safety
    /// `layout` must be a valid handle created from this device and not yet
    /// destroyed. No pipeline still using this layout may be in use.
    pub unsafe fn destroy_raw_pipeline_layout(
        &self,
        layout: vk::PipelineLayout,
    ) {
        // SAFETY: Caller guarantees layout provenance and drop ordering.
        unsafe { self.handle.destroy_pipeline_layout(layout, None) };
    }

    /// Create a single compute pipeline.
    ///
    /// On partial batch failure ash returns any successfully-created pipeline
    /// handles alongside the error; this wrapper destroys them so callers
    /// never receive a mix of valid and invalid handles.
    ///
    /// # Safety
    /// `create_info` must reference a valid compute shader stage and a valid
    /// pipeline layout, both derived from this device. All referenced
    /// pointers must remain valid for the duration of the call.
    pub unsafe fn create_raw_compute_pipeline(
        &self,
        create_info: &vk::ComputePipelineCreateInfo<'_>,
    ) -> Result<vk::Pipeline, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe {
            self.handle.create_compute_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(create_info),
                None,
            )
        }
        .map_err(|(partial, result)| {
            // Destroy any handles that were successfully created before the
            // failure so the caller receives nothing on error.
            for p in partial {
                if p != vk::Pipeline::null() {
                    // SAFETY: p was just created by this device.
                    unsafe { self.handle.destroy_pipeline(p, None) };
                }
            }
            result
        })
        .map(|mut pipelines| {
            debug_assert_eq!(pipelines.len(), 1);
            pipelines.remove(0)
        })
    }

    /// # Safety
    /// `pipeline` must be a valid handle created from this device and not yet
    /// destroyed. No in-flight GPU work may still reference the pipeline.
    pub unsafe fn destroy_raw_pipeline(&self, pipeline: vk::Pipeline) {
        // SAFETY: Caller guarantees pipeline provenance and drop ordering.
        unsafe { self.handle.destroy_pipeline(pipeline, None) };
    }
}

// Command pool and buffer functionality
impl Device {
    /// # Safety
    /// `create_info` must use a valid queue family index for this device.
    pub unsafe fn create_raw_command_pool(
        &self,
        create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> Result<vk::CommandPool, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_command_pool(create_info, None) }
    }

    /// # Safety
    /// `pool` must be a valid handle created from this device. No command
    /// buffer allocated from it may be pending execution.
    /// vkDestroyCommandPool implicitly frees all allocated command buffers.
    pub unsafe fn destroy_raw_command_pool(&self, pool: vk::CommandPool) {
        // SAFETY: Caller guarantees pool provenance and drop ordering.
        unsafe { self.handle.destroy_command_pool(pool, None) };
    }

    /// # Safety
    /// `allocate_info` must reference a valid pool created from this device.
    /// The pool must be externally synchronized.
    pub unsafe fn allocate_raw_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>, vk::Result> {
        // SAFETY: Caller guarantees allocate_info validity and
        // pool synchronization.
        unsafe { self.handle.allocate_command_buffers(allocate_info) }
    }

    /// # Safety
    /// `command_buffer` must be in the initial state and derived from this
    /// device. `begin_info` must be valid.
    pub unsafe fn begin_raw_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees command buffer state and
        // begin_info validity.
        unsafe {
            self.handle
                .begin_command_buffer(command_buffer, begin_info)
        }
    }

    /// # Safety
    /// `command_buffer` must be in the recording state.
    pub unsafe fn end_raw_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees recording state.
        unsafe { self.handle.end_command_buffer(command_buffer) }
    }

    /// Bind a compute pipeline for subsequent dispatch commands.
    ///
    /// # Safety
    /// `command_buffer` must be in the recording state. `pipeline` must be a
    /// valid compute pipeline created from this device.
    pub unsafe fn cmd_bind_compute_pipeline(
        &self,
        command_buffer: vk::CommandBuffer,
        pipeline: vk::Pipeline,
    ) {
        // SAFETY: Caller guarantees command_buffer state and pipeline validity.
        unsafe {
            self.handle.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                pipeline,
            )
        }
    }

    /// Bind descriptor sets at the compute bind point.
    ///
    /// # Safety
    /// `command_buffer` must be in the recording state. `layout` and all
    /// sets must be valid handles created from this device, and the sets
    /// must be compatible with `layout`.
    pub unsafe fn cmd_bind_compute_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        // SAFETY: Caller guarantees command_buffer state and
        // handle compatibility.
        unsafe {
            self.handle.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                layout,
                first_set,
                sets,
                &[],
            )
        }
    }

    /// Record a compute dispatch.
    ///
    /// # Safety
    /// `command_buffer` must be in the recording state with a compute
    /// pipeline bound and all descriptor sets it statically uses bound and
    /// valid. The group counts must not exceed device limits.
    pub unsafe fn cmd_dispatch(
        &self,
        command_buffer: vk::CommandBuffer,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) {
        // SAFETY: Caller guarantees pipeline and descriptor state validity.
        unsafe {
            self.handle.cmd_dispatch(
                command_buffer,
                group_count_x,
                group_count_y,
                group_count_z,
            )
        }
    }
}

// Fence functionality
impl Device {
    /// # Safety
    /// `create_info` must be fully initialised with no dangling pointers.
    pub unsafe fn create_raw_fence(
        &self,
        create_info: &vk::FenceCreateInfo<'_>,
    ) -> Result<vk::Fence, vk::Result> {
        // SAFETY: Caller guarantees create_info validity.
        unsafe { self.handle.create_fence(create_info, None) }
    }

    /// # Safety
    /// `fence` must be a valid handle created from this device. No GPU work
    /// may reference it.
    pub unsafe fn destroy_raw_fence(&self, fence: vk::Fence) {
        // SAFETY: Caller guarantees fence provenance and drop ordering.
        unsafe { self.handle.destroy_fence(fence, None) };
    }

    /// # Safety
    /// All fences must be valid handles created from this device.
    pub unsafe fn wait_for_raw_fences(
        &self,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout_ns: u64,
    ) -> Result<(), vk::Result> {
        // SAFETY: Caller guarantees fence provenance.
        unsafe { self.handle.wait_for_fences(fences, wait_all, timeout_ns) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn compute_only_family_preferred_over_combined() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];

        assert_eq!(find_compute_queue_family(&families), Some(1));
    }

    #[test]
    fn transfer_and_sparse_bits_do_not_disqualify() {
        let families = [family(
            vk::QueueFlags::COMPUTE
                | vk::QueueFlags::TRANSFER
                | vk::QueueFlags::SPARSE_BINDING,
        )];

        assert_eq!(find_compute_queue_family(&families), Some(0));
    }

    #[test]
    fn combined_graphics_compute_only_is_not_found() {
        let families = [family(
            vk::QueueFlags::GRAPHICS
                | vk::QueueFlags::COMPUTE
                | vk::QueueFlags::TRANSFER,
        )];

        assert_eq!(find_compute_queue_family(&families), None);
    }

    #[test]
    fn transfer_only_family_is_not_found() {
        let families = [family(vk::QueueFlags::TRANSFER)];

        assert_eq!(find_compute_queue_family(&families), None);
        assert_eq!(find_compute_queue_family(&[]), None);
    }

    fn memory_properties(
        types: &[vk::MemoryPropertyFlags],
    ) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &flags) in types.iter().enumerate() {
            props.memory_types[i].property_flags = flags;
        }
        props
    }

    const HOST_MAPPABLE: vk::MemoryPropertyFlags =
        vk::MemoryPropertyFlags::from_raw(
            vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
                | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
        );

    #[test]
    fn first_matching_memory_type_wins() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST_MAPPABLE,
            HOST_MAPPABLE,
        ]);

        assert_eq!(find_memory_type(&props, !0, HOST_MAPPABLE), Some(1));
        // Deterministic: same inputs, same answer.
        assert_eq!(find_memory_type(&props, !0, HOST_MAPPABLE), Some(1));
    }

    #[test]
    fn type_bits_filter_is_honored() {
        let props = memory_properties(&[HOST_MAPPABLE, HOST_MAPPABLE]);

        assert_eq!(find_memory_type(&props, 1 << 1, HOST_MAPPABLE), Some(1));
    }

    #[test]
    fn no_compatible_memory_type_is_none() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        assert_eq!(find_memory_type(&props, !0, HOST_MAPPABLE), None);
    }

    #[test]
    fn partial_flag_match_is_rejected() {
        // HOST_VISIBLE without HOST_COHERENT must not satisfy a
        // request for both.
        let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);

        assert_eq!(find_memory_type(&props, !0, HOST_MAPPABLE), None);
        assert_eq!(
            find_memory_type(
                &props,
                !0,
                vk::MemoryPropertyFlags::HOST_VISIBLE
            ),
            Some(0)
        );
    }
}
