// Shaders, render passes, pipelines and frame buffers
//
// Immutable rendering state. A render pass describes one color attachment
// that is cleared on load and handed to presentation on store; pipelines and
// frame buffers are built against it.

use std::collections::BTreeMap;

use glam::UVec2;

use crate::backend::mock::{MockFrameBuffer, MockPipeline, MockRenderPass, MockShader};
use crate::backend::vulkan::{VulkanFrameBuffer, VulkanPipeline, VulkanRenderPass, VulkanShader};
use crate::backend::{backend_impl, BackendKind};
use crate::error::{Error, ErrorKind, Result};
use crate::format::{Format, ShaderStage};
use crate::handle::{Handle, FRAME_BUFFER_CAPACITY, PIPELINE_CAPACITY, RENDER_PASS_CAPACITY, SHADER_CAPACITY};
use crate::swapchain::ImageView;

/// Entry point every shader module must export.
pub const SHADER_ENTRY_POINT: &str = "main";

backend_impl! {
    ShaderImpl {
        vulkan: VulkanShader,
        mock: MockShader,
    },
    "shader"
}

backend_impl! {
    RenderPassImpl {
        vulkan: VulkanRenderPass,
        mock: MockRenderPass,
    },
    "render pass"
}

backend_impl! {
    PipelineImpl {
        vulkan: VulkanPipeline,
        mock: MockPipeline,
    },
    "pipeline"
}

backend_impl! {
    FrameBufferImpl {
        vulkan: VulkanFrameBuffer,
        mock: MockFrameBuffer,
    },
    "frame buffer"
}

/// Reject bytecode no backend could load.
pub(crate) fn validate_bytecode(code: &[u8]) -> Result<()> {
    if code.is_empty() {
        return Err(Error::new(ErrorKind::ShaderCompileFailed, "Shader bytecode is empty"));
    }
    if code.len() % 4 != 0 {
        return Err(Error::new(
            ErrorKind::ShaderCompileFailed,
            format!("Shader bytecode length {} is not a multiple of 4", code.len()),
        ));
    }
    Ok(())
}

/// Compiled shader module.
#[derive(Debug)]
pub struct Shader {
    handle: Handle<ShaderImpl, SHADER_CAPACITY>,
}

impl Shader {
    pub(crate) fn from_impl(inner: ShaderImpl) -> Self {
        Self {
            handle: Handle::emplace(inner),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub(crate) fn inner(&self) -> &ShaderImpl {
        self.handle.get()
    }
}

/// Shaders bound to their stages, one per stage.
#[derive(Debug, Clone, Default)]
pub struct ShaderSet<'a> {
    stages: BTreeMap<ShaderStage, &'a Shader>,
}

impl<'a> ShaderSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: ShaderStage, shader: &'a Shader) -> Self {
        self.insert(stage, shader);
        self
    }

    /// Bind `shader` to `stage`, returning the one it replaces.
    pub fn insert(&mut self, stage: ShaderStage, shader: &'a Shader) -> Option<&'a Shader> {
        self.stages.insert(stage, shader)
    }

    pub fn get(&self, stage: ShaderStage) -> Option<&'a Shader> {
        self.stages.get(&stage).copied()
    }

    pub fn contains(&self, stage: ShaderStage) -> bool {
        self.stages.contains_key(&stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShaderStage, &'a Shader)> + '_ {
        self.stages.iter().map(|(stage, shader)| (*stage, *shader))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassInfo {
    pub color_format: Format,
}

#[derive(Debug)]
pub struct RenderPass {
    handle: Handle<RenderPassImpl, RENDER_PASS_CAPACITY>,
    color_format: Format,
}

impl RenderPass {
    pub(crate) fn from_impl(inner: RenderPassImpl, color_format: Format) -> Self {
        Self {
            handle: Handle::emplace(inner),
            color_format,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub fn color_format(&self) -> Format {
        self.color_format
    }

    pub(crate) fn inner(&self) -> &RenderPassImpl {
        self.handle.get()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineInfo<'a> {
    pub render_pass: &'a RenderPass,
    pub shaders: ShaderSet<'a>,
    pub viewport_size: UVec2,
    pub scissor_size: UVec2,
}

impl PipelineInfo<'_> {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.shaders.contains(ShaderStage::Vertex) {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                "Graphics pipeline needs a vertex shader",
            ));
        }
        if self.viewport_size.min_element() == 0 {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                format!("Viewport size {} has a zero dimension", self.viewport_size),
            ));
        }
        Ok(())
    }
}

/// Graphics pipeline: shader stages plus fixed-function state.
#[derive(Debug)]
pub struct Pipeline {
    handle: Handle<PipelineImpl, PIPELINE_CAPACITY>,
}

impl Pipeline {
    pub(crate) fn from_impl(inner: PipelineImpl) -> Self {
        Self {
            handle: Handle::emplace(inner),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub(crate) fn inner(&self) -> &PipelineImpl {
        self.handle.get()
    }
}

#[derive(Debug, Clone)]
pub struct FrameBufferInfo<'a> {
    pub render_pass: &'a RenderPass,
    pub attachments: &'a [&'a ImageView],
    pub extent: UVec2,
}

impl FrameBufferInfo<'_> {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.attachments.is_empty() {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                "Frame buffer needs at least one attachment",
            ));
        }
        if self.extent.min_element() == 0 {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                format!("Frame buffer extent {} has a zero dimension", self.extent),
            ));
        }
        Ok(())
    }
}

/// Concrete image views bound to a render pass's attachment slots.
#[derive(Debug)]
pub struct FrameBuffer {
    handle: Handle<FrameBufferImpl, FRAME_BUFFER_CAPACITY>,
    extent: UVec2,
}

impl FrameBuffer {
    pub(crate) fn from_impl(inner: FrameBufferImpl, extent: UVec2) -> Self {
        Self {
            handle: Handle::emplace(inner),
            extent,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    pub(crate) fn inner(&self) -> &FrameBufferImpl {
        self.handle.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytecode_must_be_whole_words() {
        assert_eq!(
            validate_bytecode(&[]).unwrap_err().kind(),
            ErrorKind::ShaderCompileFailed
        );
        assert_eq!(
            validate_bytecode(&[0x03, 0x02, 0x23]).unwrap_err().kind(),
            ErrorKind::ShaderCompileFailed
        );
        assert!(validate_bytecode(&[0x03, 0x02, 0x23, 0x07]).is_ok());
    }
}
