// Mock backend - in-process simulated driver
//
// Behaves like an explicit graphics driver without touching a GPU: adapters
// and surface capabilities come from the builder, submissions go onto a
// simulated timeline that completes immediately or when the test says so.

mod device;
mod resources;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use glam::UVec2;
use parking_lot::Mutex;

use crate::adapter::{AdapterType, QueueFamilySupport};
use crate::format::{ColorSpace, Format, PresentMode, SurfaceFormat};
use crate::instance::{platform_surface_extensions, DEBUG_UTILS_EXTENSION, SURFACE_EXTENSION, SWAPCHAIN_EXTENSION, VALIDATION_LAYER};
use crate::swapchain::{SurfaceCapabilities, SurfaceSupport};

pub(crate) use device::{MockDevice, MockImageView, MockInstance, MockSurface, MockSwapChain};
pub(crate) use resources::{
    FenceState, MockCommandBuffer, MockCommandPool, MockFence, MockFrameBuffer, MockPipeline,
    MockRenderPass, MockSemaphore, MockShader,
};

/// When submitted work completes on the simulated GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Work completes during `submit`.
    #[default]
    Immediate,
    /// Work stays pending until `retire_next` / `retire_all`.
    Manual,
}

/// One simulated physical adapter.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    pub name: String,
    pub adapter_type: AdapterType,
    pub max_image_dimension_2d: u32,
    pub queue_families: Vec<QueueFamilySupport>,
    pub extensions: Vec<String>,
    pub surface: SurfaceSupport,
}

impl MockAdapter {
    /// Adapter with one graphics+present family, swapchain support and the
    /// default surface.
    pub fn new(name: impl Into<String>, adapter_type: AdapterType, max_image_dimension_2d: u32) -> Self {
        Self {
            name: name.into(),
            adapter_type,
            max_image_dimension_2d,
            queue_families: vec![QueueFamilySupport {
                graphics: true,
                present: true,
            }],
            extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            surface: default_surface_support(),
        }
    }

    pub fn with_queue_families(mut self, families: Vec<QueueFamilySupport>) -> Self {
        self.queue_families = families;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_surface_capabilities(mut self, capabilities: SurfaceCapabilities) -> Self {
        self.surface.capabilities = capabilities;
        self
    }

    pub fn with_surface_formats(mut self, formats: Vec<SurfaceFormat>) -> Self {
        self.surface.formats = formats;
        self
    }

    pub fn with_present_modes(mut self, modes: Vec<PresentMode>) -> Self {
        self.surface.present_modes = modes;
        self
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new("Mock Adapter", AdapterType::Discrete, 4096)
    }
}

/// min 1 / max 3 images, undefined current extent, 1..=4096 pixels.
pub fn default_surface_support() -> SurfaceSupport {
    SurfaceSupport {
        capabilities: SurfaceCapabilities {
            min_image_count: 1,
            max_image_count: 3,
            current_extent: None,
            min_extent: UVec2::new(1, 1),
            max_extent: UVec2::new(4096, 4096),
        },
        formats: vec![
            SurfaceFormat::new(Format::B8G8R8A8Srgb, ColorSpace::SrgbNonlinear),
            SurfaceFormat::new(Format::R8G8B8A8Srgb, ColorSpace::SrgbNonlinear),
        ],
        present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
    }
}

#[derive(Debug, Clone)]
struct DriverConfig {
    adapters: Vec<MockAdapter>,
    instance_extensions: Vec<String>,
    instance_layers: Vec<String>,
    completion: CompletionMode,
}

#[derive(Debug, Clone)]
pub struct MockDriverBuilder {
    config: DriverConfig,
}

impl MockDriverBuilder {
    fn new() -> Self {
        let instance_extensions = [SURFACE_EXTENSION, DEBUG_UTILS_EXTENSION]
            .into_iter()
            .chain(platform_surface_extensions().iter().copied())
            .map(str::to_string)
            .collect();

        Self {
            config: DriverConfig {
                adapters: Vec::new(),
                instance_extensions,
                instance_layers: vec![VALIDATION_LAYER.to_string()],
                completion: CompletionMode::Immediate,
            },
        }
    }

    pub fn adapter(mut self, adapter: MockAdapter) -> Self {
        self.config.adapters.push(adapter);
        self
    }

    /// Replace the instance extensions the driver offers.
    pub fn instance_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.instance_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the instance layers the driver offers.
    pub fn instance_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.instance_layers = layers.into_iter().map(Into::into).collect();
        self
    }

    pub fn completion(mut self, mode: CompletionMode) -> Self {
        self.config.completion = mode;
        self
    }

    pub fn build(self) -> MockDriver {
        MockDriver {
            state: Arc::new(DriverState {
                config: self.config,
                next_id: AtomicU64::new(1),
                live_objects: AtomicUsize::new(0),
                timeline: Mutex::new(Timeline::default()),
                presents: AtomicU64::new(0),
                swapchain_generation: AtomicU64::new(0),
                suboptimal: AtomicBool::new(false),
                images_withheld: AtomicBool::new(false),
                failing_image_view: Mutex::new(None),
            }),
        }
    }
}

struct Pending {
    fence: Option<Arc<FenceState>>,
    draws: u64,
}

#[derive(Default)]
struct Timeline {
    pending: VecDeque<Pending>,
    submitted: u64,
    completed: u64,
    draws_completed: u64,
}

struct DriverState {
    config: DriverConfig,
    next_id: AtomicU64,
    live_objects: AtomicUsize,
    timeline: Mutex<Timeline>,
    presents: AtomicU64,
    swapchain_generation: AtomicU64,
    suboptimal: AtomicBool,
    images_withheld: AtomicBool,
    failing_image_view: Mutex<Option<u32>>,
}

/// Handle to a simulated driver. Clones share the same driver.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<DriverState>,
}

impl MockDriver {
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// Driver with a single default adapter and immediate completion.
    pub fn new() -> Self {
        Self::builder().adapter(MockAdapter::default()).build()
    }

    pub fn completion(&self) -> CompletionMode {
        self.state.config.completion
    }

    pub fn adapters(&self) -> &[MockAdapter] {
        &self.state.config.adapters
    }

    /// Complete the oldest pending submission, signaling its fence.
    ///
    /// Returns false when nothing is pending.
    pub fn retire_next(&self) -> bool {
        let retired = {
            let mut timeline = self.state.timeline.lock();
            let next = timeline.pending.pop_front();
            if let Some(pending) = &next {
                timeline.completed += 1;
                timeline.draws_completed += pending.draws;
            }
            next
        };

        match retired {
            Some(pending) => {
                if let Some(fence) = pending.fence {
                    fence.signal();
                }
                true
            }
            None => false,
        }
    }

    /// Complete every pending submission. Returns how many completed.
    pub fn retire_all(&self) -> usize {
        let mut count = 0;
        while self.retire_next() {
            count += 1;
        }
        count
    }

    pub fn pending_submissions(&self) -> usize {
        self.state.timeline.lock().pending.len()
    }

    pub fn submitted_count(&self) -> u64 {
        self.state.timeline.lock().submitted
    }

    pub fn completed_count(&self) -> u64 {
        self.state.timeline.lock().completed
    }

    /// Draw calls executed by completed submissions.
    pub fn draws_completed(&self) -> u64 {
        self.state.timeline.lock().draws_completed
    }

    /// Driver objects currently alive, across all types.
    pub fn live_objects(&self) -> usize {
        self.state.live_objects.load(Ordering::SeqCst)
    }

    pub fn present_count(&self) -> u64 {
        self.state.presents.load(Ordering::SeqCst)
    }

    /// Make every existing swapchain report `SwapchainOutOfDate`, as after a
    /// window resize. Swapchains created afterwards are valid.
    pub fn invalidate_swapchains(&self) {
        self.state.swapchain_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Report acquires and presents as suboptimal.
    pub fn set_suboptimal(&self, suboptimal: bool) {
        self.state.suboptimal.store(suboptimal, Ordering::SeqCst);
    }

    /// Keep every swapchain image on the presentation engine. Acquires then
    /// wait out their timeout and fail with `Timeout`; an acquire without a
    /// timeout fails immediately instead of hanging.
    pub fn withhold_images(&self, withheld: bool) {
        self.state.images_withheld.store(withheld, Ordering::SeqCst);
    }

    /// Make the next swapchain fail while creating the view for `image`.
    pub fn fail_image_view_creation(&self, image: u32) {
        *self.state.failing_image_view.lock() = Some(image);
    }

    fn config(&self) -> &DriverConfig {
        &self.state.config
    }

    fn next_id(&self) -> u64 {
        self.state.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn track(&self) -> LiveToken {
        self.state.live_objects.fetch_add(1, Ordering::SeqCst);
        LiveToken {
            state: Arc::clone(&self.state),
        }
    }

    fn generation(&self) -> u64 {
        self.state.swapchain_generation.load(Ordering::SeqCst)
    }

    fn images_withheld(&self) -> bool {
        self.state.images_withheld.load(Ordering::SeqCst)
    }

    fn is_suboptimal(&self) -> bool {
        self.state.suboptimal.load(Ordering::SeqCst)
    }

    fn take_failing_image_view(&self) -> Option<u32> {
        self.state.failing_image_view.lock().take()
    }

    fn count_present(&self) {
        self.state.presents.fetch_add(1, Ordering::SeqCst);
    }

    fn enqueue(&self, fence: Option<Arc<FenceState>>, draws: u64) {
        {
            let mut timeline = self.state.timeline.lock();
            timeline.submitted += 1;
            timeline.pending.push_back(Pending { fence, draws });
        }
        if self.completion() == CompletionMode::Immediate {
            self.retire_all();
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("adapters", &self.state.config.adapters.len())
            .field("completion", &self.state.config.completion)
            .field("live_objects", &self.live_objects())
            .field("pending", &self.pending_submissions())
            .finish()
    }
}

/// Counts one live driver object for as long as it exists.
struct LiveToken {
    state: Arc<DriverState>,
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.state.live_objects.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for LiveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LiveToken")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_completion_waits_for_retire() {
        let driver = MockDriver::builder().completion(CompletionMode::Manual).build();
        driver.enqueue(None, 3);
        driver.enqueue(None, 1);
        assert_eq!(driver.pending_submissions(), 2);
        assert_eq!(driver.draws_completed(), 0);

        assert!(driver.retire_next());
        assert_eq!(driver.draws_completed(), 3);
        assert_eq!(driver.retire_all(), 1);
        assert!(!driver.retire_next());
        assert_eq!(driver.completed_count(), 2);
        assert_eq!(driver.submitted_count(), 2);
    }

    #[test]
    fn immediate_completion_never_queues() {
        let driver = MockDriver::new();
        driver.enqueue(None, 1);
        assert_eq!(driver.pending_submissions(), 0);
        assert_eq!(driver.completed_count(), 1);
    }

    #[test]
    fn live_tokens_count_objects() {
        let driver = MockDriver::new();
        let a = driver.track();
        let b = driver.track();
        assert_eq!(driver.live_objects(), 2);
        drop(a);
        assert_eq!(driver.live_objects(), 1);
        drop(b);
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn image_view_failure_is_one_shot() {
        let driver = MockDriver::new();
        driver.fail_image_view_creation(1);
        assert_eq!(driver.take_failing_image_view(), Some(1));
        assert_eq!(driver.take_failing_image_view(), None);
    }
}
