// Device - logical connection to the selected adapter
//
// The device is the only factory for GPU resources and owns the graphics and
// present queues. Resources keep the device's backend state alive, so the
// native device is always destroyed after everything created from it.

use std::sync::Arc;

use crate::adapter::AdapterInfo;
use crate::backend::mock::MockDevice;
use crate::backend::vulkan::VulkanDevice;
use crate::backend::{backend_impl, BackendKind};
use crate::command::{CommandBuffer, CommandPool, CommandPoolImpl, CommandPoolInfo};
use crate::error::{Error, ErrorKind, Result};
use crate::format::Format;
use crate::handle::{Handle, DEVICE_CAPACITY};
use crate::instance::{Instance, InstanceImpl};
use crate::pipeline::{
    validate_bytecode, FrameBuffer, FrameBufferImpl, FrameBufferInfo, Pipeline, PipelineImpl,
    PipelineInfo, RenderPass, RenderPassImpl, RenderPassInfo, Shader, ShaderImpl,
};
use crate::surface::{Surface, SurfaceImpl};
use crate::swapchain::{SwapChain, SwapChainInfo};
use crate::sync::{Fence, FenceImpl, Semaphore, SemaphoreImpl};

backend_impl! {
    DeviceImpl {
        vulkan: Arc<VulkanDevice>,
        mock: Arc<MockDevice>,
    },
    "device"
}

/// Work handed to the graphics queue in one submission.
///
/// Each wait semaphore is waited on at the color-attachment-output stage.
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub wait_semaphores: &'a [&'a Semaphore],
    pub signal_semaphores: &'a [&'a Semaphore],
    pub command_buffers: &'a [&'a CommandBuffer],
}

#[derive(Debug, Clone, Copy)]
pub struct PresentInfo<'a> {
    pub wait_semaphores: &'a [&'a Semaphore],
    pub swapchains: &'a [&'a SwapChain],
    pub image_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentStatus {
    Optimal,
    /// Presented, but the swapchain no longer matches the surface exactly.
    Suboptimal,
}

#[derive(Debug)]
pub struct Device {
    handle: Handle<DeviceImpl, DEVICE_CAPACITY>,
    adapter: AdapterInfo,
}

impl Device {
    pub(crate) fn create(instance: &Instance, surface: &Surface) -> Result<Self> {
        let (inner, adapter) = match (instance.inner(), surface.inner()) {
            (InstanceImpl::Vulkan(_), SurfaceImpl::Vulkan(surface)) => {
                let (device, adapter) = VulkanDevice::new(surface)?;
                (DeviceImpl::Vulkan(device), adapter)
            }
            (InstanceImpl::Mock(_), SurfaceImpl::Mock(surface)) => {
                let (device, adapter) = MockDevice::new(surface)?;
                (DeviceImpl::Mock(device), adapter)
            }
            (instance, _) => crate::backend::mismatch("surface", instance.kind()),
        };

        log::info!(
            "Created {} device on '{}' (graphics family {}, present family {})",
            inner.kind(),
            adapter.name,
            adapter.queue_families.graphics,
            adapter.queue_families.present
        );

        Ok(Self {
            handle: Handle::emplace(inner),
            adapter,
        })
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    /// The physical adapter this device was opened on.
    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    pub fn create_swapchain(&self, info: &SwapChainInfo) -> Result<SwapChain> {
        SwapChain::create(self, info)
    }

    pub fn create_shader(&self, code: &[u8]) -> Result<Shader> {
        validate_bytecode(code)?;

        let inner = match self.handle.get() {
            DeviceImpl::Vulkan(device) => ShaderImpl::Vulkan(device.create_shader(code)?),
            DeviceImpl::Mock(device) => ShaderImpl::Mock(device.create_shader(code)),
        };
        Ok(Shader::from_impl(inner))
    }

    pub fn create_render_pass(&self, info: &RenderPassInfo) -> Result<RenderPass> {
        if info.color_format == Format::Undefined {
            return Err(Error::new(
                ErrorKind::FormatNotSupported,
                "Render pass color format is undefined",
            ));
        }

        let inner = match self.handle.get() {
            DeviceImpl::Vulkan(device) => RenderPassImpl::Vulkan(device.create_render_pass(info)?),
            DeviceImpl::Mock(device) => RenderPassImpl::Mock(device.create_render_pass(info)),
        };
        Ok(RenderPass::from_impl(inner, info.color_format))
    }

    pub fn create_pipeline(&self, info: &PipelineInfo<'_>) -> Result<Pipeline> {
        info.validate()?;

        let inner = match self.handle.get() {
            DeviceImpl::Vulkan(device) => PipelineImpl::Vulkan(device.create_pipeline(info)?),
            DeviceImpl::Mock(device) => PipelineImpl::Mock(device.create_pipeline(info)),
        };
        log::debug!("Created pipeline with {} shader stages", info.shaders.len());
        Ok(Pipeline::from_impl(inner))
    }

    pub fn create_frame_buffer(&self, info: &FrameBufferInfo<'_>) -> Result<FrameBuffer> {
        info.validate()?;

        let inner = match self.handle.get() {
            DeviceImpl::Vulkan(device) => FrameBufferImpl::Vulkan(device.create_frame_buffer(info)?),
            DeviceImpl::Mock(device) => FrameBufferImpl::Mock(device.create_frame_buffer(info)),
        };
        Ok(FrameBuffer::from_impl(inner, info.extent))
    }

    pub fn create_command_pool(&self, info: &CommandPoolInfo) -> Result<CommandPool> {
        let inner = match self.handle.get() {
            DeviceImpl::Vulkan(device) => CommandPoolImpl::Vulkan(device.create_command_pool(info)?),
            DeviceImpl::Mock(device) => CommandPoolImpl::Mock(device.create_command_pool(info)),
        };
        Ok(CommandPool::from_impl(inner, info))
    }

    pub fn create_semaphore(&self) -> Result<Semaphore> {
        let inner = match self.handle.get() {
            DeviceImpl::Vulkan(device) => SemaphoreImpl::Vulkan(device.create_semaphore()?),
            DeviceImpl::Mock(device) => SemaphoreImpl::Mock(device.create_semaphore()),
        };
        Ok(Semaphore::from_impl(inner))
    }

    /// Create a fence, optionally already signaled.
    pub fn create_fence(&self, signaled: bool) -> Result<Fence> {
        let inner = match self.handle.get() {
            DeviceImpl::Vulkan(device) => FenceImpl::Vulkan(device.create_fence(signaled)?),
            DeviceImpl::Mock(device) => FenceImpl::Mock(device.create_fence(signaled)),
        };
        Ok(Fence::from_impl(inner))
    }

    /// Queue recorded command buffers on the graphics queue.
    ///
    /// `fence` is signaled once every buffer finished executing. Buffers
    /// must not be reset or re-recorded before then.
    pub fn submit(&self, info: &SubmitInfo<'_>, fence: Option<&Fence>) -> Result<()> {
        for buffer in info.command_buffers {
            buffer.ensure_executable()?;
        }

        match self.handle.get() {
            DeviceImpl::Vulkan(device) => device.submit(info, fence),
            DeviceImpl::Mock(device) => device.submit(info, fence),
        }
    }

    /// Queue `image_index` of each swapchain for presentation.
    ///
    /// A stale swapchain fails with `SwapchainOutOfDate`.
    pub fn present(&self, info: &PresentInfo<'_>) -> Result<PresentStatus> {
        let status = match self.handle.get() {
            DeviceImpl::Vulkan(device) => device.present(info)?,
            DeviceImpl::Mock(device) => device.present(info)?,
        };
        if status == PresentStatus::Suboptimal {
            log::warn!("Presented to a suboptimal swapchain");
        }
        Ok(status)
    }

    /// Block until every queue on the device is idle.
    pub fn wait_idle(&self) -> Result<()> {
        match self.handle.get() {
            DeviceImpl::Vulkan(device) => device.wait_idle(),
            DeviceImpl::Mock(device) => {
                device.wait_idle();
                Ok(())
            }
        }
    }

    pub(crate) fn inner(&self) -> &DeviceImpl {
        self.handle.get()
    }
}
