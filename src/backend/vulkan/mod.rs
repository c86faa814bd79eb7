// Vulkan backend, built on ash

mod command;
mod conv;
mod device;
mod instance;
mod pipeline;
mod swapchain;
mod sync;

pub(crate) use command::{VulkanCommandBuffer, VulkanCommandPool};
pub(crate) use device::VulkanDevice;
pub(crate) use instance::{VulkanInstance, VulkanSurface};
pub(crate) use pipeline::{VulkanFrameBuffer, VulkanPipeline, VulkanRenderPass, VulkanShader};
pub(crate) use swapchain::{VulkanImageView, VulkanSwapChain};
pub(crate) use sync::{VulkanFence, VulkanSemaphore};
