//! Shared setup for the integration tests: a mock-backed device plus a
//! recorded triangle per swapchain image.

#![allow(dead_code)]

use frame_rhi::{
    Backend, BeginRenderPassInfo, CommandBuffer, CommandPool, CommandPoolInfo, Device, DrawInfo,
    FrameBuffer, FrameBufferInfo, Instance, InstanceInfo, MockDriver, Pipeline, PipelineInfo,
    RenderPass, RenderPassInfo, Shader, ShaderSet, ShaderStage, Surface, SurfaceInfo, SwapChain,
    SwapChainInfo,
};
use glam::{IVec2, Vec4};

/// SPIR-V magic number, enough for the mock driver.
pub const FAKE_SPIRV: [u8; 4] = [0x03, 0x02, 0x23, 0x07];

pub struct Gpu {
    pub device: Device,
    pub surface: Surface,
    pub instance: Instance,
    pub driver: MockDriver,
}

pub fn gpu(driver: MockDriver) -> Gpu {
    let instance = Instance::new(&InstanceInfo {
        backend: Backend::Mock(driver.clone()),
        ..InstanceInfo::default()
    })
    .expect("instance");
    let surface = instance
        .create_surface(SurfaceInfo::custom(|_| 0xC0FFEE))
        .expect("surface");
    let device = instance.create_device(&surface).expect("device");
    Gpu {
        device,
        surface,
        instance,
        driver,
    }
}

/// Everything needed to draw into one swapchain.
pub struct Scene {
    pub command_buffers: Vec<CommandBuffer>,
    pub frame_buffers: Vec<FrameBuffer>,
    pub pipeline: Pipeline,
    pub render_pass: RenderPass,
    pub fragment: Shader,
    pub vertex: Shader,
    pub pool: CommandPool,
    pub swapchain: SwapChain,
}

pub fn scene(device: &Device, width: u32, height: u32) -> Scene {
    let swapchain = device
        .create_swapchain(&SwapChainInfo::new(width, height))
        .expect("swapchain");
    let extent = swapchain.extent();

    let vertex = device.create_shader(&FAKE_SPIRV).expect("vertex shader");
    let fragment = device.create_shader(&FAKE_SPIRV).expect("fragment shader");
    let render_pass = device
        .create_render_pass(&RenderPassInfo {
            color_format: swapchain.format(),
        })
        .expect("render pass");
    let pipeline = device
        .create_pipeline(&PipelineInfo {
            render_pass: &render_pass,
            shaders: ShaderSet::new()
                .with(ShaderStage::Vertex, &vertex)
                .with(ShaderStage::Fragment, &fragment),
            viewport_size: extent,
            scissor_size: extent,
        })
        .expect("pipeline");

    let frame_buffers: Vec<FrameBuffer> = swapchain
        .image_views()
        .iter()
        .map(|view| {
            device
                .create_frame_buffer(&FrameBufferInfo {
                    render_pass: &render_pass,
                    attachments: &[view],
                    extent,
                })
                .expect("frame buffer")
        })
        .collect();

    let pool = device
        .create_command_pool(&CommandPoolInfo::default())
        .expect("command pool");
    let mut command_buffers = pool
        .allocate_command_buffers(frame_buffers.len())
        .expect("command buffers");
    for (buffer, frame_buffer) in command_buffers.iter_mut().zip(&frame_buffers) {
        buffer.begin().unwrap();
        buffer
            .begin_render_pass(&BeginRenderPassInfo {
                render_pass: &render_pass,
                frame_buffer,
                area_offset: IVec2::ZERO,
                area_extent: extent,
                clear_colors: &[Vec4::new(0.0, 0.0, 0.0, 1.0)],
            })
            .unwrap();
        buffer.bind_pipeline(&pipeline).unwrap();
        buffer
            .draw(&DrawInfo {
                vertex_count: 3,
                first_vertex: 0,
            })
            .unwrap();
        buffer.end_render_pass().unwrap();
        buffer.end().unwrap();
    }

    Scene {
        command_buffers,
        frame_buffers,
        pipeline,
        render_pass,
        fragment,
        vertex,
        pool,
        swapchain,
    }
}
