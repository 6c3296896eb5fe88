//! Shader module wrapper for precompiled SPIR-V kernels.
//!
//! Kernels arrive as raw SPIR-V bytes loaded from disk; no shader
//! compilation happens here. [`ShaderModule::new`] validates the byte
//! length and wraps the `VkShaderModule`; [`ShaderModule::entry_point`]
//! produces a borrow-view usable as a compute pipeline stage.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::device::Device;

/// Reinterpret SPIR-V bytes as `u32` words. If the slice is already
/// u32-aligned it is borrowed directly; otherwise the words are copied.
fn spirv_words(
    spirv_bytes: &[u8],
) -> Result<std::borrow::Cow<'_, [u32]>, CreateShaderModuleError> {
    use std::borrow::Cow;

    if !spirv_bytes.len().is_multiple_of(4) {
        return Err(CreateShaderModuleError::InvalidLength(spirv_bytes.len()));
    }

    // SAFETY: u32 has no invalid bit patterns and we verified the length
    // is a multiple of 4, so the reinterpretation is sound.
    // SPIR-V is defined as little-endian, so for the copy path we use
    // from_le_bytes rather than from_ne_bytes to be correct on all
    // platforms. The direct borrow path via align_to is only reached on
    // little-endian targets where native and SPIR-V byte order match.
    let (prefix, aligned_words, _suffix) =
        unsafe { spirv_bytes.align_to::<u32>() };
    if prefix.is_empty() && cfg!(target_endian = "little") {
        Ok(Cow::Borrowed(aligned_words))
    } else {
        Ok(Cow::Owned(
            spirv_bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ))
    }
}

#[derive(Debug, Error)]
pub enum CreateShaderModuleError {
    #[error("SPIR-V byte slice length ({0}) is not a multiple of 4")]
    InvalidLength(usize),

    #[error("Vulkan error creating shader module: {0}")]
    Vulkan(vk::Result),
}

pub struct ShaderModule {
    parent: Arc<Device>,
    handle: vk::ShaderModule,
}

impl std::fmt::Debug for ShaderModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModule")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl ShaderModule {
    /// Create a shader module from raw SPIR-V bytes.
    ///
    /// `spirv_bytes` must have a length that is a multiple of 4. If the
    /// bytes are not already aligned to `u32`, they are copied internally.
    pub fn new(
        device: &Arc<Device>,
        spirv_bytes: &[u8],
    ) -> Result<Self, CreateShaderModuleError> {
        let code = spirv_words(spirv_bytes)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);

        // SAFETY: create_info contains valid SPIR-V code words.
        let handle = unsafe { device.create_raw_shader_module(&create_info) }
            .map_err(CreateShaderModuleError::Vulkan)?;

        Ok(Self {
            parent: Arc::clone(device),
            handle,
        })
    }

    /// Create an [`EntryPoint`] view into this module for the given compute
    /// entry point name.
    ///
    /// Returns `Err` only if `name` contains an interior NUL byte.
    pub fn entry_point(
        &self,
        name: &str,
    ) -> Result<EntryPoint<'_>, std::ffi::NulError> {
        Ok(EntryPoint {
            module: self,
            name: CString::new(name)?,
        })
    }

    pub fn raw_handle(&self) -> vk::ShaderModule {
        self.handle
    }

    pub fn get_parent(&self) -> &Arc<Device> {
        &self.parent
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        tracing::debug!("Dropping shader module {:?}", self.handle);
        // SAFETY: handle was created from parent and is being destroyed during
        // teardown. All pipeline objects derived from this module must be
        // destroyed before this ShaderModule is dropped.
        unsafe { self.parent.destroy_raw_shader_module(self.handle) };
    }
}

/// A borrow-view pairing a [`ShaderModule`] with a specific compute entry
/// point name.
///
/// Created via [`ShaderModule::entry_point`]. The lifetime `'a` ties this view
/// to the module it was created from, ensuring the module stays alive for as
/// long as any pipeline stage create info derived from it is in use.
#[derive(Debug)]
pub struct EntryPoint<'a> {
    module: &'a ShaderModule,
    name: CString,
}

impl<'a> EntryPoint<'a> {
    /// Build a `VkPipelineShaderStageCreateInfo` referencing this entry point.
    ///
    /// The returned struct borrows from `self`, so it must not outlive this
    /// `EntryPoint`.
    pub fn as_pipeline_stage_create_info(
        &self,
    ) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(self.module.raw_handle())
            .name(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spirv_length_must_be_word_aligned() {
        assert!(matches!(
            spirv_words(&[0u8; 7]),
            Err(CreateShaderModuleError::InvalidLength(7))
        ));
        assert!(spirv_words(&[0u8; 8]).is_ok());
        assert!(spirv_words(&[]).is_ok());
    }

    #[test]
    fn spirv_words_decode_little_endian() {
        // The SPIR-V magic number, serialized little-endian.
        let bytes = 0x0723_0203u32.to_le_bytes();
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(&words[..], &[0x0723_0203]);
    }
}
