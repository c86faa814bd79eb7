// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// Vertices are generated in the vertex shader, so there is no vertex input.

use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;

use ash::vk;

use super::conv::{self, VkResultExt};
use super::device::VulkanDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::handle::assert_fits;
use crate::handle::{FRAME_BUFFER_CAPACITY, PIPELINE_CAPACITY, RENDER_PASS_CAPACITY, SHADER_CAPACITY};
use crate::pipeline::{FrameBufferInfo, PipelineInfo, RenderPassInfo, SHADER_ENTRY_POINT};

pub(crate) struct VulkanShader {
    pub(crate) module: vk::ShaderModule,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanShader, SHADER_CAPACITY);

impl VulkanShader {
    pub(crate) fn new(device: &Arc<VulkanDevice>, code: &[u8]) -> Result<Self> {
        let words = ash::util::read_spv(&mut Cursor::new(code)).map_err(|e| {
            Error::new(
                ErrorKind::ShaderCompileFailed,
                format!("Invalid SPIR-V bytecode: {e}"),
            )
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe { device.device.create_shader_module(&create_info, None) }
            .context("Failed to create shader module")?;

        Ok(Self {
            module,
            device: Arc::clone(device),
        })
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_shader_module(self.module, None);
        }
    }
}

pub(crate) struct VulkanRenderPass {
    pub(crate) render_pass: vk::RenderPass,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanRenderPass, RENDER_PASS_CAPACITY);

impl VulkanRenderPass {
    /// Single color attachment, cleared on load and handed to presentation.
    pub(crate) fn new(device: &Arc<VulkanDevice>, info: &RenderPassInfo) -> Result<Self> {
        // Color attachment (the swapchain image)
        let color_attachment = vk::AttachmentDescription::builder()
            .format(conv::format_to_vk(info.color_format)?)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = &[color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_attachments)
            .build();

        // Wait for the acquired image before writing to it
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build();

        let attachments = &[color_attachment];
        let subpasses = &[subpass];
        let dependencies = &[dependency];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        let render_pass = unsafe { device.device.create_render_pass(&render_pass_info, None) }
            .context("Failed to create render pass")?;

        Ok(Self {
            render_pass,
            device: Arc::clone(device),
        })
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

pub(crate) struct VulkanPipeline {
    pub(crate) pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanPipeline, PIPELINE_CAPACITY);

impl VulkanPipeline {
    pub(crate) fn new(device: &Arc<VulkanDevice>, info: &PipelineInfo<'_>) -> Result<Self> {
        let entry_point = CString::new(SHADER_ENTRY_POINT).map_err(|_| {
            Error::new(ErrorKind::ShaderCompileFailed, "Invalid shader entry point")
        })?;

        // Shader stages
        let shader_stages = info
            .shaders
            .iter()
            .map(|(stage, shader)| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(conv::shader_stage_to_vk(stage))
                    .module(shader.inner().vulkan().module)
                    .name(&entry_point)
                    .build()
            })
            .collect::<Vec<_>>();

        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor
        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(info.viewport_size.x as f32)
            .height(info.viewport_size.y as f32)
            .min_depth(0.0)
            .max_depth(1.0)
            .build();

        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(vk::Extent2D {
                width: info.scissor_size.x,
                height: info.scissor_size.y,
            })
            .build();

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Color blending (no blending, opaque)
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();

        let color_blend_attachments = &[color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(color_blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }
            .context("Failed to create pipeline layout")?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(info.render_pass.inner().vulkan().render_pass)
            .subpass(0)
            .build();

        let created = unsafe {
            device
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        let pipeline = match created {
            Ok(pipelines) => pipelines[0],
            Err((_, result)) => {
                unsafe { device.device.destroy_pipeline_layout(layout, None) };
                return Err(conv::error(result, "Failed to create graphics pipeline"));
            }
        };

        Ok(Self {
            pipeline,
            layout,
            device: Arc::clone(device),
        })
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

pub(crate) struct VulkanFrameBuffer {
    pub(crate) frame_buffer: vk::Framebuffer,
    device: Arc<VulkanDevice>,
}

assert_fits!(VulkanFrameBuffer, FRAME_BUFFER_CAPACITY);

impl VulkanFrameBuffer {
    pub(crate) fn new(device: &Arc<VulkanDevice>, info: &FrameBufferInfo<'_>) -> Result<Self> {
        let attachments = info
            .attachments
            .iter()
            .map(|view| view.inner().vulkan().view)
            .collect::<Vec<_>>();

        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(info.render_pass.inner().vulkan().render_pass)
            .attachments(&attachments)
            .width(info.extent.x)
            .height(info.extent.y)
            .layers(1);

        let frame_buffer = unsafe { device.device.create_framebuffer(&framebuffer_info, None) }
            .context("Failed to create framebuffer")?;

        Ok(Self {
            frame_buffer,
            device: Arc::clone(device),
        })
    }
}

impl Drop for VulkanFrameBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_framebuffer(self.frame_buffer, None);
        }
    }
}
