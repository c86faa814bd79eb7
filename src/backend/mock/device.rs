// Simulated instance, surface, device and swapchain

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::resources::{
    MockCommandPool, MockFence, MockFrameBuffer, MockPipeline, MockRenderPass, MockSemaphore,
    MockShader,
};
use super::{LiveToken, MockDriver};
use crate::adapter::{self, AdapterCandidate, AdapterInfo};
use crate::command::CommandPoolInfo;
use crate::device::{PresentInfo, PresentStatus, SubmitInfo};
use crate::error::{Error, ErrorKind, Result};
use crate::handle::assert_fits;
use crate::handle::{IMAGE_VIEW_CAPACITY, SWAPCHAIN_CAPACITY};
use crate::instance::{ensure_requirements, InstanceInfo, Requirements, SWAPCHAIN_EXTENSION};
use crate::pipeline::{FrameBufferInfo, PipelineInfo, RenderPassInfo};
use crate::surface::NativeWindow;
use crate::swapchain::{AcquiredImage, SurfaceSupport, SwapChainConfig};
use crate::sync::{Fence, Semaphore};

#[derive(Debug)]
pub(crate) struct MockInstance {
    driver: MockDriver,
    id: u64,
    _live: LiveToken,
}

impl MockInstance {
    pub(crate) fn new(driver: &MockDriver, info: &InstanceInfo, requirements: &Requirements) -> Result<Arc<Self>> {
        let config = driver.config();
        let enabled = ensure_requirements(requirements, &config.instance_extensions, &config.instance_layers)?;
        log::debug!("[mock] instance extensions enabled: {:?}", enabled);

        if info.debug_level.is_enabled() {
            log::debug!(
                "[mock] debug messenger installed for {:?}",
                info.debug_level.severities()
            );
        }

        Ok(Arc::new(Self {
            driver: driver.clone(),
            id: driver.next_id(),
            _live: driver.track(),
        }))
    }

    pub(crate) fn raw_handle(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
pub(crate) struct MockSurface {
    instance: Arc<MockInstance>,
    raw: u64,
    _live: LiveToken,
}

impl MockSurface {
    pub(crate) fn from_raw(instance: &Arc<MockInstance>, raw: u64) -> Arc<Self> {
        Arc::new(Self {
            instance: Arc::clone(instance),
            raw,
            _live: instance.driver.track(),
        })
    }

    pub(crate) fn from_window(instance: &Arc<MockInstance>, window: &NativeWindow) -> Result<Arc<Self>> {
        log::debug!("[mock] surface for {:?}", window.window);
        Ok(Self::from_raw(instance, instance.driver.next_id()))
    }

    pub(crate) fn raw_handle(&self) -> u64 {
        self.raw
    }

    fn driver(&self) -> &MockDriver {
        &self.instance.driver
    }
}

#[derive(Debug)]
pub(crate) struct MockDevice {
    surface: Arc<MockSurface>,
    adapter: usize,
    _live: LiveToken,
}

impl MockDevice {
    pub(crate) fn new(surface: &Arc<MockSurface>) -> Result<(Arc<Self>, AdapterInfo)> {
        let driver = surface.driver();

        let candidates = driver
            .adapters()
            .iter()
            .enumerate()
            .map(|(index, adapter)| AdapterCandidate {
                handle: index,
                name: adapter.name.clone(),
                adapter_type: adapter.adapter_type,
                max_image_dimension_2d: adapter.max_image_dimension_2d,
                queue_families: adapter.queue_families.clone(),
                missing_extensions: [SWAPCHAIN_EXTENSION]
                    .iter()
                    .filter(|required| !adapter.extensions.iter().any(|e| e == *required))
                    .map(|required| required.to_string())
                    .collect(),
                surface_format_count: adapter.surface.formats.len(),
                present_mode_count: adapter.surface.present_modes.len(),
            })
            .collect();

        let (adapter, info) = adapter::select(candidates)?;
        for family in info.queue_families.unique() {
            log::debug!("[mock] queue family {} with 1 queue, priority 1.0", family);
        }

        let device = Arc::new(Self {
            surface: Arc::clone(surface),
            adapter,
            _live: driver.track(),
        });
        Ok((device, info))
    }

    pub(crate) fn driver(&self) -> &MockDriver {
        self.surface.driver()
    }

    pub(crate) fn surface_support(&self) -> SurfaceSupport {
        self.driver().adapters()[self.adapter].surface.clone()
    }

    pub(crate) fn create_swapchain(self: &Arc<Self>, config: &SwapChainConfig) -> Result<MockSwapChain> {
        let driver = self.driver();
        Ok(MockSwapChain {
            device: Arc::clone(self),
            image_count: config.image_count,
            generation: driver.generation(),
            next_image: AtomicU32::new(0),
            failing_view: driver.take_failing_image_view(),
            _live: driver.track(),
        })
    }

    pub(crate) fn create_shader(&self, _code: &[u8]) -> MockShader {
        MockShader::new(self.driver())
    }

    pub(crate) fn create_render_pass(&self, _info: &RenderPassInfo) -> MockRenderPass {
        MockRenderPass::new(self.driver())
    }

    pub(crate) fn create_pipeline(&self, info: &PipelineInfo<'_>) -> MockPipeline {
        for (_, shader) in info.shaders.iter() {
            shader.inner().mock();
        }
        info.render_pass.inner().mock();
        MockPipeline::new(self.driver())
    }

    pub(crate) fn create_frame_buffer(&self, info: &FrameBufferInfo<'_>) -> MockFrameBuffer {
        info.render_pass.inner().mock();
        for view in info.attachments {
            view.inner().mock();
        }
        MockFrameBuffer::new(self.driver())
    }

    pub(crate) fn create_command_pool(&self, info: &CommandPoolInfo) -> MockCommandPool {
        MockCommandPool::new(self.driver(), info.resettable)
    }

    pub(crate) fn create_semaphore(&self) -> MockSemaphore {
        MockSemaphore::new(self.driver())
    }

    pub(crate) fn create_fence(&self, signaled: bool) -> MockFence {
        MockFence::new(self.driver(), signaled)
    }

    pub(crate) fn submit(&self, info: &SubmitInfo<'_>, fence: Option<&Fence>) -> Result<()> {
        let fence = fence.map(|f| f.inner().mock());
        if let Some(fence) = fence {
            if fence.state().is_signaled() {
                return Err(Error::new(
                    ErrorKind::ValidationFailed,
                    "Fence submitted while still signaled; reset it first",
                ));
            }
        }

        consume_waits(info.wait_semaphores)?;

        let draws = info
            .command_buffers
            .iter()
            .map(|buffer| buffer.inner().mock().draw_count())
            .sum();

        for semaphore in info.signal_semaphores {
            semaphore.inner().mock().signal()?;
        }

        self.driver().enqueue(fence.map(MockFence::shared_state), draws);
        Ok(())
    }

    pub(crate) fn present(&self, info: &PresentInfo<'_>) -> Result<PresentStatus> {
        for swapchain in info.swapchains {
            let swapchain = swapchain.inner().mock();
            if info.image_index >= swapchain.image_count {
                return Err(Error::new(
                    ErrorKind::ValidationFailed,
                    format!(
                        "Image index {} out of range for {} images",
                        info.image_index, swapchain.image_count
                    ),
                ));
            }
        }

        // Waits execute even when the chain turns out to be stale
        consume_waits(info.wait_semaphores)?;
        for swapchain in info.swapchains {
            swapchain.inner().mock().check_current()?;
        }
        self.driver().count_present();

        if self.driver().is_suboptimal() {
            Ok(PresentStatus::Suboptimal)
        } else {
            Ok(PresentStatus::Optimal)
        }
    }

    /// The simulated GPU drains its queue.
    pub(crate) fn wait_idle(&self) {
        self.driver().retire_all();
    }
}

fn consume_waits(semaphores: &[&Semaphore]) -> Result<()> {
    for semaphore in semaphores {
        semaphore.inner().mock().consume()?;
    }
    Ok(())
}

#[derive(Debug)]
pub(crate) struct MockSwapChain {
    device: Arc<MockDevice>,
    image_count: u32,
    generation: u64,
    next_image: AtomicU32,
    failing_view: Option<u32>,
    _live: LiveToken,
}

assert_fits!(MockSwapChain, SWAPCHAIN_CAPACITY);

impl MockSwapChain {
    pub(crate) fn image_count(&self) -> u32 {
        self.image_count
    }

    pub(crate) fn create_view(&self, index: u32) -> Result<MockImageView> {
        if self.failing_view == Some(index) {
            return Err(Error::new(
                ErrorKind::OutOfDeviceMemory,
                format!("Failed to create image view {index}"),
            ));
        }
        Ok(MockImageView {
            _live: self.device.driver().track(),
        })
    }

    pub(crate) fn acquire(
        &self,
        semaphore: Option<&Semaphore>,
        fence: Option<&Fence>,
        timeout: Option<Duration>,
    ) -> Result<AcquiredImage> {
        self.check_current()?;

        if self.device.driver().images_withheld() {
            if let Some(timeout) = timeout {
                thread::sleep(timeout);
            }
            return Err(Error::new(
                ErrorKind::Timeout,
                format!("No swapchain image became available within {:?}", timeout),
            ));
        }

        if let Some(semaphore) = semaphore {
            semaphore.inner().mock().signal()?;
        }
        if let Some(fence) = fence {
            fence.inner().mock().state().signal();
        }

        let index = self.next_image.fetch_add(1, Ordering::Relaxed) % self.image_count;
        Ok(AcquiredImage {
            index,
            suboptimal: self.device.driver().is_suboptimal(),
        })
    }

    fn check_current(&self) -> Result<()> {
        if self.generation != self.device.driver().generation() {
            return Err(Error::new(
                ErrorKind::SwapchainOutOfDate,
                "Swapchain no longer matches its surface",
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct MockImageView {
    _live: LiveToken,
}

assert_fits!(MockImageView, IMAGE_VIEW_CAPACITY);
