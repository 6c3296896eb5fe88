//! Per-dispatch resource provisioning, pipeline binding, and execution.
//!
//! A dispatch runs in three phases, each an RAII bundle:
//!
//! 1. [`DeviceSession::provision`] — input/output/uniform buffers created,
//!    bound to host-visible memory, and filled.
//! 2. [`BoundPipeline::build`] — kernel module, descriptor set (written
//!    against the session's buffers), and compute pipeline.
//! 3. [`PendingTwist::submit`] — command recording, queue submission, and
//!    the fence the caller waits on.
//!
//! Failure at any step drops whatever was already built, in reverse
//! creation order, via the wrappers' Drop impls. There is no partial
//! state to clean up by hand and no success-path-only teardown.

use std::sync::Arc;

use bytemuck::Zeroable;
use thiserror::Error;
use twist_vk::ash::vk;
use twist_vk::buffer::{BufferCreationError, HostVisibleBuffer, MapError};
use twist_vk::command::{
    AllocateCommandBufferError, CommandPool, CreateCommandPoolError,
    OneTimeCommandBuffer,
};
use twist_vk::descriptor::{
    DescriptorBindingDesc, DescriptorPool, DescriptorSet, DescriptorSetLayout,
};
use twist_vk::device::Device;
use twist_vk::pipeline::{
    ComputePipeline, CreateComputePipelineError, PipelineLayout,
};
use twist_vk::shader::{CreateShaderModuleError, ShaderModule};
use twist_vk::sync::{
    CreateFenceError, Fence, MarkSubmittedError, WaitFenceError,
};

use crate::data::{Point, TwistParams};

/// Binding slots forming the contract with the kernel binary. Changing
/// any of these is a breaking change to every shipped kernel.
const BINDING_INPUT: u32 = 0;
const BINDING_OUTPUT: u32 = 1;
const BINDING_PARAMS: u32 = 2;

const KERNEL_ENTRY_POINT: &str = "main";

// ---------------------------------------------------------------------------
// DeviceSession
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Buffer(#[from] BufferCreationError),

    #[error("Failed to upload dispatch inputs: {0}")]
    Upload(#[from] MapError),
}

/// The three buffers backing one dispatch, filled and ready to bind.
///
/// Input and output are storage buffers of identical size (N × 16
/// bytes); the uniform buffer holds the 12-byte [`TwistParams`] block.
#[derive(Debug)]
pub struct DeviceSession {
    device: Arc<Device>,
    input: HostVisibleBuffer,
    output: HostVisibleBuffer,
    uniform: HostVisibleBuffer,
    count: u32,
}

impl DeviceSession {
    /// Create and fill all three buffers.
    ///
    /// `points` must be non-empty; zero-sized Vulkan buffers are invalid
    /// and the engine short-circuits N = 0 before reaching this point.
    pub fn provision(
        device: &Arc<Device>,
        points: &[Point],
        angle: f32,
        envelope: f32,
    ) -> Result<Self, ProvisionError> {
        let count = points.len() as u32;
        let payload_size = std::mem::size_of_val(points) as vk::DeviceSize;
        let params = TwistParams {
            count,
            angle,
            envelope,
        };

        let input = HostVisibleBuffer::new(
            device,
            payload_size,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let output = HostVisibleBuffer::new(
            device,
            payload_size,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let uniform = HostVisibleBuffer::new(
            device,
            std::mem::size_of::<TwistParams>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        input.write_bytes(bytemuck::cast_slice(points))?;
        uniform.write_bytes(bytemuck::bytes_of(&params))?;

        tracing::debug!(
            count,
            payload_size,
            "Provisioned dispatch buffers ({} bytes per storage buffer)",
            payload_size,
        );

        Ok(Self {
            device: Arc::clone(device),
            input,
            output,
            uniform,
            count,
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Copy the output buffer back into a fresh `Vec<Point>`.
    ///
    /// Callers must ensure the dispatch writing the output buffer has
    /// completed (fence signaled) first.
    fn read_back(&self) -> Result<Vec<Point>, MapError> {
        let mut points = vec![Point::zeroed(); self.count as usize];
        self.output
            .read_bytes(bytemuck::cast_slice_mut(&mut points))?;
        Ok(points)
    }
}

// ---------------------------------------------------------------------------
// BoundPipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum BuildPipelineError {
    #[error(transparent)]
    Shader(#[from] CreateShaderModuleError),

    #[error("Kernel entry point name contains a NUL byte")]
    EntryPointName(#[from] std::ffi::NulError),

    #[error("Vulkan error creating descriptor set layout: {0}")]
    SetLayout(vk::Result),

    #[error("Vulkan error creating descriptor pool: {0}")]
    Pool(vk::Result),

    #[error("Vulkan error allocating descriptor set: {0}")]
    AllocateSet(vk::Result),

    #[error("Vulkan error creating pipeline layout: {0}")]
    Layout(vk::Result),

    #[error(transparent)]
    Pipeline(#[from] CreateComputePipelineError),
}

/// The kernel compiled into a pipeline, with its descriptor set already
/// written against a [`DeviceSession`]'s buffers.
///
/// Field order matters: Drop runs top to bottom, destroying the pipeline
/// before the descriptor pool, the pool before the set layout, and the
/// layout before the shader module.
#[derive(Debug)]
pub struct BoundPipeline {
    pipeline: ComputePipeline,
    descriptor_set: DescriptorSet,
    _descriptor_pool: DescriptorPool,
    _set_layout: DescriptorSetLayout,
    _shader: ShaderModule,
}

impl BoundPipeline {
    /// Build the pipeline for `kernel_spirv` and bind it to the
    /// session's buffers.
    pub fn build(
        session: &DeviceSession,
        kernel_spirv: &[u8],
    ) -> Result<Self, BuildPipelineError> {
        let device = session.device();
        let shader = ShaderModule::new(device, kernel_spirv)?;

        let storage_binding = |binding: u32| DescriptorBindingDesc {
            binding,
            descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
            count: 1,
            stage_flags: vk::ShaderStageFlags::COMPUTE,
        };
        let bindings = [
            storage_binding(BINDING_INPUT),
            storage_binding(BINDING_OUTPUT),
            DescriptorBindingDesc {
                binding: BINDING_PARAMS,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                count: 1,
                stage_flags: vk::ShaderStageFlags::COMPUTE,
            },
        ];
        let set_layout = DescriptorSetLayout::new(device, &bindings)
            .map_err(BuildPipelineError::SetLayout)?;

        // Pool sized for exactly the one set this dispatch needs.
        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(2),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1),
        ];
        let descriptor_pool = DescriptorPool::new(device, 1, &pool_sizes)
            .map_err(BuildPipelineError::Pool)?;

        let descriptor_set = descriptor_pool
            .allocate_sets(&[&set_layout])
            .map_err(BuildPipelineError::AllocateSet)?
            .remove(0);

        // SAFETY: All three buffers were created with the matching usage
        // flags and live in `session`, which every submitted command
        // buffer using this set keeps alive via PendingTwist.
        unsafe {
            descriptor_set.write_storage_buffer(
                device,
                BINDING_INPUT,
                &session.input,
            );
            descriptor_set.write_storage_buffer(
                device,
                BINDING_OUTPUT,
                &session.output,
            );
            descriptor_set.write_uniform_buffer(
                device,
                BINDING_PARAMS,
                &session.uniform,
            );
        }

        let pipeline_layout = Arc::new(
            PipelineLayout::new(device, &[&set_layout])
                .map_err(BuildPipelineError::Layout)?,
        );

        let entry_point = shader.entry_point(KERNEL_ENTRY_POINT)?;
        let pipeline =
            ComputePipeline::new(device, &entry_point, &pipeline_layout)?;

        Ok(Self {
            pipeline,
            descriptor_set,
            _descriptor_pool: descriptor_pool,
            _set_layout: set_layout,
            _shader: shader,
        })
    }
}

// ---------------------------------------------------------------------------
// PendingTwist
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    CommandPool(#[from] CreateCommandPoolError),

    #[error(transparent)]
    CommandBuffer(#[from] AllocateCommandBufferError),

    #[error("Vulkan error recording dispatch commands: {0}")]
    Record(vk::Result),

    #[error(transparent)]
    Fence(#[from] CreateFenceError),

    #[error("Vulkan error submitting to the compute queue: {0}")]
    Submit(vk::Result),

    #[error(transparent)]
    FenceState(#[from] MarkSubmittedError),
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Wait(#[from] WaitFenceError),

    #[error("Failed to read back dispatch output: {0}")]
    Readback(#[from] MapError),
}

/// A dispatch that has been submitted to the compute queue.
///
/// Holds every resource the GPU may still be touching; nothing is
/// destroyed until [`wait`](Self::wait) has observed the fence and read
/// the output back (or the handle is dropped after completion). Field
/// order gives reverse-creation teardown: fence, then command objects,
/// then pipeline, then buffers.
#[derive(Debug)]
pub struct PendingTwist {
    fence: Fence,
    _command_buffer: OneTimeCommandBuffer,
    _command_pool: CommandPool,
    _pipeline: BoundPipeline,
    session: DeviceSession,
}

impl PendingTwist {
    /// Record the dispatch and submit it to the compute queue.
    ///
    /// Takes ownership of the session and pipeline; both stay alive
    /// until the returned handle is consumed or dropped.
    pub fn submit(
        session: DeviceSession,
        pipeline: BoundPipeline,
    ) -> Result<Self, DispatchError> {
        let device = session.device();
        let command_pool =
            CommandPool::new(device, device.compute_queue_family())?;
        let mut command_buffer = command_pool.allocate_command_buffer()?;

        // SAFETY: command_buffer is freshly allocated; pipeline, layout,
        // and descriptor set are valid objects from the same device and
        // compatible with each other by construction.
        unsafe {
            command_buffer.begin().map_err(DispatchError::Record)?;
            command_buffer
                .bind_compute_pipeline(pipeline.pipeline.raw_handle());
            command_buffer.bind_compute_descriptor_sets(
                pipeline.pipeline.layout().raw_handle(),
                0,
                &[pipeline.descriptor_set.raw_descriptor_set()],
            );
            command_buffer.dispatch(session.count(), 1, 1);
            command_buffer.end().map_err(DispatchError::Record)?;
        }

        let mut fence = Fence::new(device)?;

        let raw_command_buffers = [command_buffer.raw_command_buffer()];
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&raw_command_buffers);

        // SAFETY: The command buffer is executable, the fence is
        // unsignaled, and every referenced object is owned by the
        // PendingTwist under construction.
        unsafe {
            device
                .compute_queue_submit(
                    std::slice::from_ref(&submit_info),
                    fence.raw_fence(),
                )
                .map_err(DispatchError::Submit)?;
            // SAFETY: The fence was just handed to vkQueueSubmit.
            fence.mark_submitted()?;
        }

        tracing::debug!(
            groups = session.count(),
            "Submitted twist dispatch to the compute queue",
        );

        Ok(Self {
            fence,
            _command_buffer: command_buffer,
            _command_pool: command_pool,
            _pipeline: pipeline,
            session,
        })
    }

    /// Poll whether the GPU has finished without blocking.
    pub fn is_complete(&self) -> Result<bool, WaitFenceError> {
        self.fence.wait_nonblocking()
    }

    /// Block until the dispatch completes, then read the transformed
    /// points back.
    ///
    /// Consumes the handle; all GPU resources are torn down (reverse
    /// creation order) when it returns.
    pub fn wait(self) -> Result<Vec<Point>, CollectError> {
        self.fence.wait(u64::MAX)?;
        let points = self.session.read_back()?;
        Ok(points)
    }
}

impl Drop for PendingTwist {
    fn drop(&mut self) {
        // A handle can be dropped without ever being waited on, with the
        // kernel still writing the buffers owned below. Block until the
        // dispatch completes before any field Drop destroys a resource
        // the GPU may touch.
        if self.fence.is_submitted()
            && let Err(e) = self.fence.wait(u64::MAX)
        {
            tracing::error!(
                "Fence wait during dispatch teardown failed: {e}"
            );
            if let Err(e) = self.session.device().wait_idle() {
                tracing::error!(
                    "Device wait-idle during dispatch teardown failed: {e}"
                );
            }
        }
    }
}
