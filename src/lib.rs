// =============================================================================
// FRAME-RHI - Backend-abstracted GPU device layer
// =============================================================================
//
// OBJECT GRAPH:
//   Instance
//     ├── Surface
//     └── Device (selected adapter, graphics + present queues)
//           ├── SwapChain ── ImageView
//           ├── Shader / RenderPass / Pipeline / FrameBuffer
//           ├── CommandPool ── CommandBuffer
//           └── Semaphore / Fence
//
// FRAME FLOW (see `frame::FrameLoop`):
// 1. Wait for the slot's in-flight fence, reset it
// 2. Acquire swapchain image (signals image-available)
// 3. Submit commands (wait image-available, signal render-finished + fence)
// 4. Present (wait render-finished), advance the slot
//
// Every resource stores its backend implementation inline in a `Handle`.
// Backends: Vulkan (ash) and an in-process mock driver.
//
// =============================================================================

pub mod adapter;
pub mod backend;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod frame;
pub mod handle;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use adapter::{AdapterInfo, AdapterType, QueueFamilies};
pub use backend::mock::{default_surface_support, CompletionMode, MockAdapter, MockDriver, MockDriverBuilder};
pub use backend::{Backend, BackendKind};
pub use command::{
    BeginRenderPassInfo, CommandBuffer, CommandBufferState, CommandPool, CommandPoolInfo, DrawInfo,
};
pub use device::{Device, PresentInfo, PresentStatus, SubmitInfo};
pub use error::{Error, ErrorKind, Result};
pub use format::{ColorSpace, Format, PresentMode, ShaderStage, SurfaceFormat};
pub use frame::{Frame, FrameLoop, FrameSync};
pub use handle::Handle;
pub use instance::{required_surface_extensions, DebugLevel, Instance, InstanceInfo, MessageSeverity, Version};
pub use pipeline::{
    FrameBuffer, FrameBufferInfo, Pipeline, PipelineInfo, RenderPass, RenderPassInfo, Shader, ShaderSet,
};
pub use shader::{CompileOptions, CompileOutput, GlslcCompiler, OptimizationLevel, ShaderCompiler, SourceLanguage};
pub use surface::{NativeWindow, Surface, SurfaceInfo};
pub use swapchain::{AcquiredImage, ImageView, SwapChain, SwapChainInfo};
pub use sync::{Fence, FenceStatus, Semaphore};
