//! Engine entry points: instance ownership and the dispatch drivers.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use twist_vk::device::{CreateComputeDeviceError, Device};
use twist_vk::instance::{Instance, InstanceCreationError, VulkanLogLevel};

use crate::data::Point;
use crate::session::{
    BoundPipeline, BuildPipelineError, CollectError, DeviceSession,
    DispatchError, PendingTwist, ProvisionError,
};

#[derive(Debug, Error)]
pub enum TwistError {
    #[error("Failed to read kernel binary {path}: {source}")]
    KernelIo {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Device(#[from] CreateComputeDeviceError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Pipeline(#[from] BuildPipelineError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// Owns the Vulkan instance and drives one-shot twist dispatches.
///
/// The instance lives exactly as long as the engine; each dispatch
/// creates its own device and resources and releases them when the
/// result has been read back. The kernel binary path is always supplied
/// by the caller — nothing here assumes where kernels live on disk.
pub struct TwistEngine {
    instance: Arc<Instance>,
}

impl std::fmt::Debug for TwistEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwistEngine").finish_non_exhaustive()
    }
}

impl TwistEngine {
    /// Create the engine and its Vulkan instance.
    ///
    /// `vulkan_log_level` gates the validation-layer debug messenger;
    /// `None` disables it entirely.
    pub fn new(
        app_name: impl AsRef<str>,
        vulkan_log_level: Option<VulkanLogLevel>,
    ) -> Result<Self, InstanceCreationError> {
        // SAFETY: The instance is dropped only when the engine is, after
        // every per-dispatch device created from it has been torn down.
        let instance = unsafe { Instance::new(app_name, vulkan_log_level) }?;
        Ok(Self {
            instance: Arc::new(instance),
        })
    }

    /// Run the kernel over `points` and block until the transformed
    /// points are available.
    ///
    /// N = 0 returns an empty vec without touching the GPU.
    pub fn twist_points(
        &self,
        kernel: &Path,
        points: &[Point],
        angle: f32,
        envelope: f32,
    ) -> Result<Vec<Point>, TwistError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let pending = self.begin_twist(kernel, points, angle, envelope)?;
        let start = Instant::now();
        let result = pending.wait()?;
        tracing::debug!(elapsed = ?start.elapsed(), "GPU wait and readback");
        Ok(result)
    }

    /// Provision, build, and submit a dispatch, returning a handle the
    /// caller can poll or wait on.
    ///
    /// `points` must be non-empty; use
    /// [`twist_points`](Self::twist_points) when N may be zero.
    pub fn begin_twist(
        &self,
        kernel: &Path,
        points: &[Point],
        angle: f32,
        envelope: f32,
    ) -> Result<PendingTwist, TwistError> {
        let kernel_spirv =
            std::fs::read(kernel).map_err(|source| TwistError::KernelIo {
                path: kernel.to_path_buf(),
                source,
            })?;

        let start = Instant::now();
        let device = Arc::new(Device::create_compute(&self.instance)?);
        tracing::debug!(elapsed = ?start.elapsed(), "Device creation");

        let start = Instant::now();
        let session =
            DeviceSession::provision(&device, points, angle, envelope)?;
        let pipeline = BoundPipeline::build(&session, &kernel_spirv)?;
        tracing::debug!(elapsed = ?start.elapsed(), "Resource provisioning");

        Ok(PendingTwist::submit(session, pipeline)?)
    }
}
