// Synchronization primitives
//
// Semaphores order GPU work, fences report completion to the CPU.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;

use super::conv::VkResultExt;
use super::device::VulkanDevice;
use crate::error::Result;
use crate::handle::assert_fits;
use crate::handle::{FENCE_CAPACITY, SEMAPHORE_CAPACITY};
use crate::sync::{timeout_nanos, FenceStatus};

pub(crate) struct VulkanSemaphore {
    pub(crate) semaphore: vk::Semaphore,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanSemaphore, SEMAPHORE_CAPACITY);

impl VulkanSemaphore {
    pub(crate) fn new(device: &Arc<VulkanDevice>) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.device.create_semaphore(&semaphore_info, None) }
            .context("Failed to create semaphore")?;

        Ok(Self {
            semaphore,
            device: Arc::clone(device),
        })
    }
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

pub(crate) struct VulkanFence {
    pub(crate) fence: vk::Fence,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanFence, FENCE_CAPACITY);

impl VulkanFence {
    pub(crate) fn new(device: &Arc<VulkanDevice>, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.device.create_fence(&fence_info, None) }
            .context("Failed to create fence")?;

        Ok(Self {
            fence,
            device: Arc::clone(device),
        })
    }

    pub(crate) fn status(&self) -> FenceStatus {
        match unsafe { self.device.device.get_fence_status(self.fence) } {
            Ok(true) => FenceStatus::Signaled,
            Ok(false) => FenceStatus::Unsignaled,
            Err(result) => {
                log::warn!("Failed to query fence status: {:?}", result);
                FenceStatus::Unknown
            }
        }
    }

    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        unsafe {
            self.device
                .device
                .wait_for_fences(&[self.fence], true, timeout_nanos(timeout))
        }
        .context("Failed to wait for fence")
    }

    pub(crate) fn reset(&self) -> Result<()> {
        unsafe { self.device.device.reset_fences(&[self.fence]) }.context("Failed to reset fence")
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_fence(self.fence, None);
        }
    }
}
