// Command pools and command buffer recording

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use super::conv::VkResultExt;
use super::device::VulkanDevice;
use crate::command::{BeginRenderPassInfo, CommandPoolInfo, DrawInfo};
use crate::error::Result;
use crate::handle::assert_fits;
use crate::handle::{COMMAND_BUFFER_CAPACITY, COMMAND_POOL_CAPACITY};
use crate::pipeline::Pipeline;

/// Shared by the pool and every buffer allocated from it, so the native pool
/// is destroyed after its last buffer is freed.
struct PoolShared {
    pool: vk::CommandPool,
    // Pool operations need external synchronization
    lock: Mutex<()>,
    device: Arc<VulkanDevice>,
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}

pub(crate) struct VulkanCommandPool {
    shared: Arc<PoolShared>,
}

assert_fits!(VulkanCommandPool, COMMAND_POOL_CAPACITY);

impl VulkanCommandPool {
    pub(crate) fn new(device: &Arc<VulkanDevice>, info: &CommandPoolInfo) -> Result<Self> {
        let flags = if info.resettable {
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
        } else {
            vk::CommandPoolCreateFlags::empty()
        };

        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.queue_families.graphics)
            .flags(flags);

        let pool = unsafe { device.device.create_command_pool(&create_info, None) }
            .context("Failed to create command pool")?;

        Ok(Self {
            shared: Arc::new(PoolShared {
                pool,
                lock: Mutex::new(()),
                device: Arc::clone(device),
            }),
        })
    }

    pub(crate) fn allocate(&self) -> Result<VulkanCommandBuffer> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.shared.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = {
            let _pool = self.shared.lock.lock();
            unsafe { self.shared.device.device.allocate_command_buffers(&allocate_info) }
                .context("Failed to allocate command buffers")?
        };

        Ok(VulkanCommandBuffer {
            buffer: buffers[0],
            pool: Arc::clone(&self.shared),
        })
    }
}

pub(crate) struct VulkanCommandBuffer {
    pub(crate) buffer: vk::CommandBuffer,
    pool: Arc<PoolShared>,
}

assert_fits!(VulkanCommandBuffer, COMMAND_BUFFER_CAPACITY);

impl VulkanCommandBuffer {
    fn device(&self) -> &ash::Device {
        &self.pool.device.device
    }

    pub(crate) fn begin(&mut self) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        let _pool = self.pool.lock.lock();
        unsafe { self.device().begin_command_buffer(self.buffer, &begin_info) }
            .context("Failed to begin recording command buffer")
    }

    pub(crate) fn end(&mut self) -> Result<()> {
        let _pool = self.pool.lock.lock();
        unsafe { self.device().end_command_buffer(self.buffer) }
            .context("Failed to record command buffer")
    }

    pub(crate) fn reset(&mut self) -> Result<()> {
        let _pool = self.pool.lock.lock();
        unsafe {
            self.device()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())
        }
        .context("Failed to reset command buffer")
    }

    pub(crate) fn begin_render_pass(&mut self, info: &BeginRenderPassInfo<'_>) {
        let clear_values = info
            .clear_colors
            .iter()
            .map(|color| vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: color.to_array(),
                },
            })
            .collect::<Vec<_>>();

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(info.render_pass.inner().vulkan().render_pass)
            .framebuffer(info.frame_buffer.inner().vulkan().frame_buffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D {
                    x: info.area_offset.x,
                    y: info.area_offset.y,
                },
                extent: vk::Extent2D {
                    width: info.area_extent.x,
                    height: info.area_extent.y,
                },
            })
            .clear_values(&clear_values);

        unsafe {
            self.device()
                .cmd_begin_render_pass(self.buffer, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    pub(crate) fn end_render_pass(&mut self) {
        unsafe { self.device().cmd_end_render_pass(self.buffer) };
    }

    pub(crate) fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        unsafe {
            self.device().cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.inner().vulkan().pipeline,
            );
        }
    }

    pub(crate) fn draw(&mut self, info: &DrawInfo) {
        unsafe {
            self.device()
                .cmd_draw(self.buffer, info.vertex_count, 1, info.first_vertex, 0);
        }
    }
}

impl Drop for VulkanCommandBuffer {
    fn drop(&mut self) {
        let _pool = self.pool.lock.lock();
        unsafe {
            self.pool
                .device
                .device
                .free_command_buffers(self.pool.pool, &[self.buffer]);
        }
    }
}
