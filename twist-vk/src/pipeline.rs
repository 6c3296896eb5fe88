use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::descriptor::DescriptorSetLayout;
use crate::device::Device;
use crate::shader::EntryPoint;

// ---------------------------------------------------------------------------
// PipelineLayout
// ---------------------------------------------------------------------------

/// An owned wrapper around a `VkPipelineLayout`.
///
/// Multiple pipelines that share the same descriptor set signature can
/// hold the layout behind an `Arc<PipelineLayout>`.
pub struct PipelineLayout {
    parent: Arc<Device>,
    handle: vk::PipelineLayout,
}

impl std::fmt::Debug for PipelineLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayout")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl PipelineLayout {
    /// Create a pipeline layout over the given descriptor set layouts,
    /// with no push constant ranges.
    pub fn new(
        device: &Arc<Device>,
        set_layouts: &[&DescriptorSetLayout],
    ) -> Result<Self, vk::Result> {
        let raw_layouts: Vec<vk::DescriptorSetLayout> = set_layouts
            .iter()
            .map(|l| l.raw_descriptor_set_layout())
            .collect();
        let create_info =
            vk::PipelineLayoutCreateInfo::default().set_layouts(&raw_layouts);
        // SAFETY: create_info references valid descriptor set layouts
        // created from device, valid for the duration of this call.
        let handle =
            unsafe { device.create_raw_pipeline_layout(&create_info) }?;
        Ok(Self {
            parent: Arc::clone(device),
            handle,
        })
    }

    pub fn raw_handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        tracing::debug!("Dropping pipeline layout {:?}", self.handle);
        // SAFETY: handle was created from parent and is being destroyed during
        // teardown. All pipelines using this layout must be dropped first.
        unsafe { self.parent.destroy_raw_pipeline_layout(self.handle) };
    }
}

// ---------------------------------------------------------------------------
// ComputePipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
#[error("Vulkan error creating compute pipeline: {0}")]
pub struct CreateComputePipelineError(pub vk::Result);

/// A compute pipeline built from a single SPIR-V entry point.
///
/// Pipelines are compiled without a pipeline cache: each dispatch
/// session is one-shot, so nothing would ever hit a warm cache entry.
pub struct ComputePipeline {
    parent: Arc<Device>,
    handle: vk::Pipeline,
    layout: Arc<PipelineLayout>,
}

impl std::fmt::Debug for ComputePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputePipeline")
            .field("handle", &self.handle)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl ComputePipeline {
    /// Create a compute pipeline from an entry point and layout.
    pub fn new(
        device: &Arc<Device>,
        entry_point: &EntryPoint<'_>,
        layout: &Arc<PipelineLayout>,
    ) -> Result<Self, CreateComputePipelineError> {
        let stage = entry_point.as_pipeline_stage_create_info();
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout.raw_handle());

        // SAFETY: create_info references a valid compute shader stage and a
        // valid pipeline layout, both derived from device and valid for the
        // duration of this call.
        let handle =
            unsafe { device.create_raw_compute_pipeline(&create_info) }
                .map_err(CreateComputePipelineError)?;

        Ok(Self {
            parent: Arc::clone(device),
            handle,
            layout: Arc::clone(layout),
        })
    }

    pub fn raw_handle(&self) -> vk::Pipeline {
        self.handle
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        tracing::debug!("Dropping compute pipeline {:?}", self.handle);
        // SAFETY: handle was created from parent and is being destroyed during
        // teardown. All in-flight GPU work referencing this pipeline must be
        // completed before drop.
        unsafe { self.parent.destroy_raw_pipeline(self.handle) };
        // self.layout Arc is released here; the layout itself is destroyed
        // only when all pipelines sharing it have been dropped.
    }
}
