// Vulkan swapchain and its image views

use std::sync::Arc;
use std::time::Duration;

use ash::vk;

use super::conv::{self, VkResultExt};
use super::device::VulkanDevice;
use crate::error::Result;
use crate::handle::assert_fits;
use crate::handle::{IMAGE_VIEW_CAPACITY, SWAPCHAIN_CAPACITY};
use crate::swapchain::{AcquiredImage, SharingMode, SwapChainConfig};
use crate::sync::{timeout_nanos, Fence, Semaphore};

pub(crate) struct VulkanSwapChain {
    pub(crate) swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::Format,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanSwapChain, SWAPCHAIN_CAPACITY);

impl VulkanSwapChain {
    pub(crate) fn new(device: &Arc<VulkanDevice>, config: &SwapChainConfig) -> Result<Self> {
        let surface = &device.surface;
        let caps = unsafe {
            surface
                .instance
                .surface_loader
                .get_physical_device_surface_capabilities(device.physical_device, surface.surface)
        }
        .context("Failed to query surface capabilities")?;

        let format = conv::format_to_vk(config.surface_format.format)?;
        let families = match config.sharing {
            SharingMode::Exclusive => Vec::new(),
            SharingMode::Concurrent(families) => families.to_vec(),
        };
        let sharing_mode = if families.is_empty() {
            vk::SharingMode::EXCLUSIVE
        } else {
            vk::SharingMode::CONCURRENT
        };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.surface)
            .min_image_count(config.image_count)
            .image_format(format)
            .image_color_space(conv::color_space_to_vk(config.surface_format.color_space))
            .image_extent(vk::Extent2D {
                width: config.extent.x,
                height: config.extent.y,
            })
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&families)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(conv::present_mode_to_vk(config.present_mode))
            .clipped(true);

        let swapchain = unsafe { device.swapchain_loader.create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;

        // Destroy the chain if the image query fails
        let images = match unsafe { device.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(result) => {
                unsafe { device.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(conv::error(result, "Failed to get swapchain images"));
            }
        };

        Ok(Self {
            swapchain,
            images,
            format,
            device: Arc::clone(device),
        })
    }

    /// The driver may create more images than requested.
    pub(crate) fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub(crate) fn create_view(&self, index: u32) -> Result<VulkanImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(self.images[index as usize])
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { self.device.device.create_image_view(&create_info, None) }
            .context("Failed to create image view")?;

        Ok(VulkanImageView {
            view,
            device: Arc::clone(&self.device),
        })
    }

    pub(crate) fn acquire(
        &self,
        semaphore: Option<&Semaphore>,
        fence: Option<&Fence>,
        timeout: Option<Duration>,
    ) -> Result<AcquiredImage> {
        let semaphore = semaphore.map_or(vk::Semaphore::null(), |s| s.inner().vulkan().semaphore);
        let fence = fence.map_or(vk::Fence::null(), |f| f.inner().vulkan().fence);

        let (index, suboptimal) = unsafe {
            self.device.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_nanos(timeout),
                semaphore,
                fence,
            )
        }
        .context("Failed to acquire swapchain image")?;

        Ok(AcquiredImage { index, suboptimal })
    }
}

impl Drop for VulkanSwapChain {
    fn drop(&mut self) {
        unsafe {
            self.device.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

pub(crate) struct VulkanImageView {
    pub(crate) view: vk::ImageView,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanImageView, IMAGE_VIEW_CAPACITY);

impl Drop for VulkanImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_image_view(self.view, None);
        }
    }
}
