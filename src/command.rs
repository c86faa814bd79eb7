// Command pools and command buffers
//
// The recording state machine lives here, in front of every backend, so a
// misuse fails the same way whichever driver sits underneath.
//
// Initial --begin--> Recording --end--> Executable
//    ^                  |                   |
//    +------reset-------+-------reset-------+
// A failed `end` leaves the buffer Invalid; `begin` accepts Initial or Invalid.

use glam::{IVec2, UVec2, Vec4};

use crate::backend::mock::{MockCommandBuffer, MockCommandPool};
use crate::backend::vulkan::{VulkanCommandBuffer, VulkanCommandPool};
use crate::backend::{backend_impl, BackendKind};
use crate::error::{Error, Result};
use crate::handle::{Handle, COMMAND_BUFFER_CAPACITY, COMMAND_POOL_CAPACITY};
use crate::pipeline::{FrameBuffer, Pipeline, RenderPass};

backend_impl! {
    CommandPoolImpl {
        vulkan: VulkanCommandPool,
        mock: MockCommandPool,
    },
    "command pool"
}

backend_impl! {
    CommandBufferImpl {
        vulkan: VulkanCommandBuffer,
        mock: MockCommandBuffer,
    },
    "command buffer"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPoolInfo {
    /// Buffers from this pool may be reset individually.
    pub resettable: bool,
}

impl Default for CommandPoolInfo {
    fn default() -> Self {
        Self { resettable: true }
    }
}

/// Allocation arena for command buffers on the graphics queue family.
///
/// Not for concurrent recording: use one pool per recording thread.
#[derive(Debug)]
pub struct CommandPool {
    handle: Handle<CommandPoolImpl, COMMAND_POOL_CAPACITY>,
    resettable: bool,
}

impl CommandPool {
    pub(crate) fn from_impl(inner: CommandPoolImpl, info: &CommandPoolInfo) -> Self {
        Self {
            handle: Handle::emplace(inner),
            resettable: info.resettable,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub fn is_resettable(&self) -> bool {
        self.resettable
    }

    pub fn allocate_command_buffer(&self) -> Result<CommandBuffer> {
        let inner = match self.handle.get() {
            CommandPoolImpl::Vulkan(pool) => CommandBufferImpl::Vulkan(pool.allocate()?),
            CommandPoolImpl::Mock(pool) => CommandBufferImpl::Mock(pool.allocate()),
        };
        Ok(CommandBuffer {
            handle: Handle::emplace(inner),
            state: CommandBufferState::Initial,
            resettable: self.resettable,
            in_render_pass: false,
        })
    }

    pub fn allocate_command_buffers(&self, count: usize) -> Result<Vec<CommandBuffer>> {
        (0..count).map(|_| self.allocate_command_buffer()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    Invalid,
}

#[derive(Debug, Clone, Copy)]
pub struct BeginRenderPassInfo<'a> {
    pub render_pass: &'a RenderPass,
    pub frame_buffer: &'a FrameBuffer,
    pub area_offset: IVec2,
    pub area_extent: UVec2,
    /// One clear color per attachment, RGBA.
    pub clear_colors: &'a [Vec4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawInfo {
    pub vertex_count: u32,
    pub first_vertex: u32,
}

#[derive(Debug)]
pub struct CommandBuffer {
    handle: Handle<CommandBufferImpl, COMMAND_BUFFER_CAPACITY>,
    state: CommandBufferState,
    resettable: bool,
    in_render_pass: bool,
}

impl CommandBuffer {
    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            CommandBufferState::Initial | CommandBufferState::Invalid => {}
            state => {
                return Err(Error::invalid_state(format!(
                    "Cannot begin a command buffer in the {state:?} state"
                )))
            }
        }

        match self.handle.get_mut() {
            CommandBufferImpl::Vulkan(buffer) => buffer.begin()?,
            CommandBufferImpl::Mock(buffer) => buffer.begin(),
        }
        self.state = CommandBufferState::Recording;
        self.in_render_pass = false;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        self.expect_recording("end")?;
        if self.in_render_pass {
            return Err(Error::invalid_state(
                "Cannot end a command buffer inside a render pass",
            ));
        }

        let result = match self.handle.get_mut() {
            CommandBufferImpl::Vulkan(buffer) => buffer.end(),
            CommandBufferImpl::Mock(buffer) => buffer.end(),
        };
        self.state = match result {
            Ok(()) => CommandBufferState::Executable,
            Err(_) => CommandBufferState::Invalid,
        };
        result
    }

    /// Return to Initial. Only buffers from a resettable pool can be reset.
    pub fn reset(&mut self) -> Result<()> {
        if !self.resettable {
            return Err(Error::invalid_state(
                "Command buffer comes from a pool created without reset capability",
            ));
        }

        match self.handle.get_mut() {
            CommandBufferImpl::Vulkan(buffer) => buffer.reset()?,
            CommandBufferImpl::Mock(buffer) => buffer.reset(),
        }
        self.state = CommandBufferState::Initial;
        self.in_render_pass = false;
        Ok(())
    }

    pub fn begin_render_pass(&mut self, info: &BeginRenderPassInfo<'_>) -> Result<()> {
        self.expect_recording("begin a render pass")?;
        if self.in_render_pass {
            return Err(Error::invalid_state("Render pass already active"));
        }

        match self.handle.get_mut() {
            CommandBufferImpl::Vulkan(buffer) => buffer.begin_render_pass(info),
            CommandBufferImpl::Mock(buffer) => buffer.begin_render_pass(info),
        }
        self.in_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.expect_recording("end a render pass")?;
        if !self.in_render_pass {
            return Err(Error::invalid_state("No render pass is active"));
        }

        match self.handle.get_mut() {
            CommandBufferImpl::Vulkan(buffer) => buffer.end_render_pass(),
            CommandBufferImpl::Mock(buffer) => buffer.end_render_pass(),
        }
        self.in_render_pass = false;
        Ok(())
    }

    pub fn bind_pipeline(&mut self, pipeline: &Pipeline) -> Result<()> {
        self.expect_recording("bind a pipeline")?;

        match self.handle.get_mut() {
            CommandBufferImpl::Vulkan(buffer) => buffer.bind_pipeline(pipeline),
            CommandBufferImpl::Mock(buffer) => buffer.bind_pipeline(pipeline),
        }
        Ok(())
    }

    pub fn draw(&mut self, info: &DrawInfo) -> Result<()> {
        self.expect_recording("draw")?;
        if !self.in_render_pass {
            return Err(Error::invalid_state("Draw outside of a render pass"));
        }

        match self.handle.get_mut() {
            CommandBufferImpl::Vulkan(buffer) => buffer.draw(info),
            CommandBufferImpl::Mock(buffer) => buffer.draw(info),
        }
        Ok(())
    }

    /// Submission only accepts fully recorded buffers.
    pub(crate) fn ensure_executable(&self) -> Result<()> {
        if self.state != CommandBufferState::Executable {
            return Err(Error::invalid_state(format!(
                "Cannot submit a command buffer in the {:?} state",
                self.state
            )));
        }
        Ok(())
    }

    pub(crate) fn inner(&self) -> &CommandBufferImpl {
        self.handle.get()
    }

    fn expect_recording(&self, action: &str) -> Result<()> {
        if self.state != CommandBufferState::Recording {
            return Err(Error::invalid_state(format!(
                "Cannot {action} while the command buffer is {:?}",
                self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, MockDriver};
    use crate::device::Device;
    use crate::error::ErrorKind;
    use crate::format::Format;
    use crate::instance::{Instance, InstanceInfo};
    use crate::format::ShaderStage;
    use crate::pipeline::{FrameBufferInfo, PipelineInfo, RenderPassInfo, ShaderSet};
    use crate::surface::SurfaceInfo;
    use crate::swapchain::SwapChainInfo;

    fn mock_device() -> Device {
        let instance = Instance::new(&InstanceInfo {
            backend: Backend::Mock(MockDriver::new()),
            ..InstanceInfo::default()
        })
        .unwrap();
        let surface = instance.create_surface(SurfaceInfo::custom(|_| 1)).unwrap();
        instance.create_device(&surface).unwrap()
    }

    fn assert_invalid(result: Result<()>) {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn recording_lifecycle() {
        let device = mock_device();
        let pool = device.create_command_pool(&CommandPoolInfo::default()).unwrap();
        let mut buffer = pool.allocate_command_buffer().unwrap();
        assert_eq!(buffer.state(), CommandBufferState::Initial);

        assert_invalid(buffer.end());
        buffer.begin().unwrap();
        assert_eq!(buffer.state(), CommandBufferState::Recording);
        assert_invalid(buffer.begin());

        buffer.end().unwrap();
        assert_eq!(buffer.state(), CommandBufferState::Executable);
        assert_invalid(buffer.begin());

        buffer.reset().unwrap();
        assert_eq!(buffer.state(), CommandBufferState::Initial);
        buffer.begin().unwrap();
    }

    #[test]
    fn reset_needs_resettable_pool() {
        let device = mock_device();
        let pool = device
            .create_command_pool(&CommandPoolInfo { resettable: false })
            .unwrap();
        assert!(!pool.is_resettable());

        let mut buffer = pool.allocate_command_buffer().unwrap();
        buffer.begin().unwrap();
        buffer.end().unwrap();
        assert_invalid(buffer.reset());
        assert_eq!(buffer.state(), CommandBufferState::Executable);
    }

    #[test]
    fn draws_only_inside_a_render_pass() {
        let device = mock_device();
        let swapchain = device.create_swapchain(&SwapChainInfo::new(640, 480)).unwrap();
        let render_pass = device
            .create_render_pass(&RenderPassInfo {
                color_format: swapchain.format(),
            })
            .unwrap();
        assert_eq!(render_pass.color_format(), Format::B8G8R8A8Srgb);

        let view = swapchain.image_view(0).unwrap();
        let frame_buffer = device
            .create_frame_buffer(&FrameBufferInfo {
                render_pass: &render_pass,
                attachments: &[view],
                extent: swapchain.extent(),
            })
            .unwrap();

        let pool = device.create_command_pool(&CommandPoolInfo::default()).unwrap();
        let mut buffer = pool.allocate_command_buffer().unwrap();
        let draw = DrawInfo {
            vertex_count: 3,
            first_vertex: 0,
        };
        let pass = BeginRenderPassInfo {
            render_pass: &render_pass,
            frame_buffer: &frame_buffer,
            area_offset: IVec2::ZERO,
            area_extent: UVec2::new(640, 480),
            clear_colors: &[Vec4::new(0.0, 0.0, 0.0, 1.0)],
        };

        assert_invalid(buffer.draw(&draw));
        buffer.begin().unwrap();
        assert_invalid(buffer.draw(&draw));
        assert_invalid(buffer.end_render_pass());

        buffer.begin_render_pass(&pass).unwrap();
        assert_invalid(buffer.begin_render_pass(&pass));
        buffer.draw(&draw).unwrap();
        assert_invalid(buffer.end());

        buffer.end_render_pass().unwrap();
        buffer.end().unwrap();
        assert_eq!(buffer.inner().mock().draw_count(), 1);
    }

    #[test]
    fn commands_need_a_recording_buffer() {
        let device = mock_device();
        let render_pass = device
            .create_render_pass(&RenderPassInfo {
                color_format: Format::B8G8R8A8Srgb,
            })
            .unwrap();
        let vertex = device.create_shader(&[0x03, 0x02, 0x23, 0x07]).unwrap();
        let pipeline = device
            .create_pipeline(&PipelineInfo {
                render_pass: &render_pass,
                shaders: ShaderSet::new().with(ShaderStage::Vertex, &vertex),
                viewport_size: UVec2::new(64, 64),
                scissor_size: UVec2::new(64, 64),
            })
            .unwrap();
        let draw = DrawInfo {
            vertex_count: 3,
            first_vertex: 0,
        };

        let pool = device.create_command_pool(&CommandPoolInfo::default()).unwrap();
        let mut buffer = pool.allocate_command_buffer().unwrap();
        assert_invalid(buffer.bind_pipeline(&pipeline));

        buffer.begin().unwrap();
        buffer.bind_pipeline(&pipeline).unwrap();
        buffer.end().unwrap();

        assert_invalid(buffer.bind_pipeline(&pipeline));
        assert_invalid(buffer.draw(&draw));
        assert_eq!(buffer.state(), CommandBufferState::Executable);
        assert_eq!(buffer.inner().mock().draw_count(), 0);
    }
}
