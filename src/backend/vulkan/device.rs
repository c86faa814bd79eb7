// Vulkan Device - physical device selection, logical device, queues
//
// Every resource created here holds an `Arc<VulkanDevice>`, so the logical
// device is destroyed only after the last of them.

use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;
use parking_lot::Mutex;

use super::command::VulkanCommandPool;
use super::conv::{self, VkResultExt};
use super::instance::{name_of, VulkanInstance, VulkanSurface};
use super::pipeline::{VulkanFrameBuffer, VulkanPipeline, VulkanRenderPass, VulkanShader};
use super::sync::{VulkanFence, VulkanSemaphore};
use crate::adapter::{self, AdapterCandidate, AdapterInfo, QueueFamilies, QueueFamilySupport};
use crate::command::CommandPoolInfo;
use crate::device::{PresentInfo, PresentStatus, SubmitInfo};
use crate::error::{Error, ErrorKind, Result};
use crate::instance::SWAPCHAIN_EXTENSION;
use crate::pipeline::{FrameBufferInfo, PipelineInfo, RenderPassInfo};
use crate::swapchain::{SurfaceCapabilities, SurfaceSupport};
use crate::sync::Fence;

/// Device extensions every adapter must expose.
const REQUIRED_DEVICE_EXTENSIONS: &[&str] = &[SWAPCHAIN_EXTENSION];

pub(crate) struct VulkanDevice {
    pub(crate) device: ash::Device,
    pub(crate) swapchain_loader: khr::Swapchain,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    // Queues need external synchronization
    queue_lock: Mutex<()>,
    pub(crate) surface: Arc<VulkanSurface>,
}

impl VulkanDevice {
    pub(crate) fn new(surface: &Arc<VulkanSurface>) -> Result<(Arc<Self>, AdapterInfo)> {
        let instance = &surface.instance;

        // Step 1: Describe every physical device
        let physical_devices = unsafe { instance.instance.enumerate_physical_devices() }
            .context("Failed to enumerate Vulkan physical devices")?;
        if physical_devices.is_empty() {
            return Err(Error::new(
                ErrorKind::InitializationFailed,
                "Failed to find GPUs with Vulkan support",
            ));
        }

        let candidates = physical_devices
            .into_iter()
            .map(|physical_device| describe_adapter(instance, surface, physical_device))
            .collect::<Result<Vec<_>>>()?;

        // Step 2: Pick the best one
        let (physical_device, adapter) = adapter::select(candidates)?;
        let families = adapter.queue_families;

        // Step 3: Create logical device, one queue per distinct family
        let queue_priorities = [1.0];
        let queue_create_infos = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect::<Vec<_>>();

        let extensions = [khr::Swapchain::name().as_ptr()];
        let features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        // Step 4: Fetch queues
        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = khr::Swapchain::new(&instance.instance, &device);

        Ok((
            Arc::new(Self {
                device,
                swapchain_loader,
                physical_device,
                queue_families: families,
                graphics_queue,
                present_queue,
                queue_lock: Mutex::new(()),
                surface: Arc::clone(surface),
            }),
            adapter,
        ))
    }

    fn instance(&self) -> &VulkanInstance {
        &self.surface.instance
    }

    pub(crate) fn surface_support(&self) -> Result<SurfaceSupport> {
        query_surface_support(self.instance(), &self.surface, self.physical_device)
    }

    pub(crate) fn create_shader(self: &Arc<Self>, code: &[u8]) -> Result<VulkanShader> {
        VulkanShader::new(self, code)
    }

    pub(crate) fn create_render_pass(self: &Arc<Self>, info: &RenderPassInfo) -> Result<VulkanRenderPass> {
        VulkanRenderPass::new(self, info)
    }

    pub(crate) fn create_pipeline(self: &Arc<Self>, info: &PipelineInfo<'_>) -> Result<VulkanPipeline> {
        VulkanPipeline::new(self, info)
    }

    pub(crate) fn create_frame_buffer(self: &Arc<Self>, info: &FrameBufferInfo<'_>) -> Result<VulkanFrameBuffer> {
        VulkanFrameBuffer::new(self, info)
    }

    pub(crate) fn create_command_pool(self: &Arc<Self>, info: &CommandPoolInfo) -> Result<VulkanCommandPool> {
        VulkanCommandPool::new(self, info)
    }

    pub(crate) fn create_semaphore(self: &Arc<Self>) -> Result<VulkanSemaphore> {
        VulkanSemaphore::new(self)
    }

    pub(crate) fn create_fence(self: &Arc<Self>, signaled: bool) -> Result<VulkanFence> {
        VulkanFence::new(self, signaled)
    }

    pub(crate) fn submit(&self, info: &SubmitInfo<'_>, fence: Option<&Fence>) -> Result<()> {
        let wait_semaphores = info
            .wait_semaphores
            .iter()
            .map(|s| s.inner().vulkan().semaphore)
            .collect::<Vec<_>>();
        let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
        let command_buffers = info
            .command_buffers
            .iter()
            .map(|b| b.inner().vulkan().buffer)
            .collect::<Vec<_>>();
        let signal_semaphores = info
            .signal_semaphores
            .iter()
            .map(|s| s.inner().vulkan().semaphore)
            .collect::<Vec<_>>();
        let fence = fence.map_or(vk::Fence::null(), |f| f.inner().vulkan().fence);

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        let _queue = self.queue_lock.lock();
        unsafe { self.device.queue_submit(self.graphics_queue, &[submit_info], fence) }
            .context("Failed to submit draw command buffer")
    }

    pub(crate) fn present(&self, info: &PresentInfo<'_>) -> Result<PresentStatus> {
        let wait_semaphores = info
            .wait_semaphores
            .iter()
            .map(|s| s.inner().vulkan().semaphore)
            .collect::<Vec<_>>();
        let swapchains = info
            .swapchains
            .iter()
            .map(|s| s.inner().vulkan().swapchain)
            .collect::<Vec<_>>();
        let image_indices = vec![info.image_index; swapchains.len()];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _queue = self.queue_lock.lock();
        let suboptimal = unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) }
            .context("Failed to present swapchain image")?;

        if suboptimal {
            Ok(PresentStatus::Suboptimal)
        } else {
            Ok(PresentStatus::Optimal)
        }
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub(crate) fn wait_idle(&self) -> Result<()> {
        let _queue = self.queue_lock.lock();
        unsafe { self.device.device_wait_idle() }.context("Failed to wait for device idle")
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        if let Err(err) = self.wait_idle() {
            log::warn!("{}", err);
        }
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

fn describe_adapter(
    instance: &VulkanInstance,
    surface: &VulkanSurface,
    physical_device: vk::PhysicalDevice,
) -> Result<AdapterCandidate<vk::PhysicalDevice>> {
    let properties = unsafe { instance.instance.get_physical_device_properties(physical_device) };
    let name = name_of(&properties.device_name);

    let families = unsafe {
        instance
            .instance
            .get_physical_device_queue_family_properties(physical_device)
    };
    let mut queue_families = Vec::with_capacity(families.len());
    for (index, family) in families.iter().enumerate() {
        let present = unsafe {
            instance.surface_loader.get_physical_device_surface_support(
                physical_device,
                index as u32,
                surface.surface,
            )
        }
        .context("Failed to query surface presentation support")?;

        queue_families.push(QueueFamilySupport {
            graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present,
        });
    }

    let available = unsafe {
        instance
            .instance
            .enumerate_device_extension_properties(physical_device)
    }
    .context("Failed to enumerate device extensions")?
    .iter()
    .map(|p| name_of(&p.extension_name))
    .collect::<Vec<_>>();
    let missing_extensions = REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .filter(|required| !available.iter().any(|name| name == *required))
        .map(|required| required.to_string())
        .collect();

    let support = query_surface_support(instance, surface, physical_device)?;

    Ok(AdapterCandidate {
        handle: physical_device,
        name,
        adapter_type: conv::adapter_type_from_vk(properties.device_type),
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        queue_families,
        missing_extensions,
        surface_format_count: support.formats.len(),
        present_mode_count: support.present_modes.len(),
    })
}

fn query_surface_support(
    instance: &VulkanInstance,
    surface: &VulkanSurface,
    physical_device: vk::PhysicalDevice,
) -> Result<SurfaceSupport> {
    let loader = &instance.surface_loader;

    let caps = unsafe { loader.get_physical_device_surface_capabilities(physical_device, surface.surface) }
        .context("Failed to query surface capabilities")?;
    let formats = unsafe { loader.get_physical_device_surface_formats(physical_device, surface.surface) }
        .context("Failed to query surface formats")?;
    let present_modes =
        unsafe { loader.get_physical_device_surface_present_modes(physical_device, surface.surface) }
            .context("Failed to query surface present modes")?;

    // u32::MAX extent means the swapchain picks its own size
    let current_extent = (caps.current_extent.width != u32::MAX)
        .then(|| glam::UVec2::new(caps.current_extent.width, caps.current_extent.height));

    Ok(SurfaceSupport {
        capabilities: SurfaceCapabilities {
            min_image_count: caps.min_image_count,
            max_image_count: caps.max_image_count,
            current_extent,
            min_extent: glam::UVec2::new(caps.min_image_extent.width, caps.min_image_extent.height),
            max_extent: glam::UVec2::new(caps.max_image_extent.width, caps.max_image_extent.height),
        },
        formats: conv::surface_formats_from_vk(&formats),
        present_modes: present_modes
            .into_iter()
            .filter_map(conv::present_mode_from_vk)
            .collect(),
    })
}
