// SwapChain - presentable images negotiated from surface capabilities
//
// The negotiation rules are backend-neutral; backends only report what the
// surface supports and build the chain from the negotiated configuration.

use std::time::Duration;

use glam::UVec2;

use crate::adapter::QueueFamilies;
use crate::backend::mock::{MockImageView, MockSwapChain};
use crate::backend::vulkan::{VulkanImageView, VulkanSwapChain};
use crate::backend::{backend_impl, BackendKind};
use crate::device::{Device, DeviceImpl};
use crate::error::{Error, ErrorKind, Result};
use crate::format::{ColorSpace, Format, PresentMode, SurfaceFormat};
use crate::handle::{Handle, IMAGE_VIEW_CAPACITY, SWAPCHAIN_CAPACITY};
use crate::sync::{Fence, Semaphore};

/// Surface format picked whenever the surface offers it.
pub const PREFERRED_SURFACE_FORMAT: SurfaceFormat =
    SurfaceFormat::new(Format::B8G8R8A8Srgb, ColorSpace::SrgbNonlinear);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainInfo {
    pub requested_width: u32,
    pub requested_height: u32,
}

impl SwapChainInfo {
    pub const fn new(requested_width: u32, requested_height: u32) -> Self {
        Self {
            requested_width,
            requested_height,
        }
    }

    pub fn requested_extent(&self) -> UVec2 {
        UVec2::new(self.requested_width, self.requested_height)
    }
}

/// Image count and extent limits of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound.
    pub max_image_count: u32,
    /// `None` when the surface lets the swapchain decide its size.
    pub current_extent: Option<UVec2>,
    pub min_extent: UVec2,
    pub max_extent: UVec2,
}

/// Everything a surface reports for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSupport {
    pub capabilities: SurfaceCapabilities,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    /// Images are shared between the graphics and present families.
    Concurrent([u32; 2]),
}

impl SharingMode {
    pub fn for_families(families: QueueFamilies) -> Self {
        if families.is_shared() {
            SharingMode::Exclusive
        } else {
            SharingMode::Concurrent([families.graphics, families.present])
        }
    }
}

/// Outcome of swapchain negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainConfig {
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: UVec2,
    pub image_count: u32,
    pub sharing: SharingMode,
}

pub fn choose_surface_format(candidates: &[SurfaceFormat]) -> Result<SurfaceFormat> {
    if candidates.contains(&PREFERRED_SURFACE_FORMAT) {
        return Ok(PREFERRED_SURFACE_FORMAT);
    }
    candidates.first().copied().ok_or_else(|| {
        Error::new(
            ErrorKind::FormatNotSupported,
            "Surface reports no supported formats",
        )
    })
}

/// Mailbox when available, FIFO otherwise.
pub fn choose_present_mode(modes: &[PresentMode]) -> PresentMode {
    if modes.contains(&PresentMode::Mailbox) {
        PresentMode::Mailbox
    } else {
        PresentMode::Fifo
    }
}

pub fn choose_extent(capabilities: &SurfaceCapabilities, requested: UVec2) -> UVec2 {
    match capabilities.current_extent {
        Some(fixed) => fixed,
        None => requested.clamp(capabilities.min_extent, capabilities.max_extent),
    }
}

pub fn choose_image_count(capabilities: &SurfaceCapabilities) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

pub fn negotiate(
    support: &SurfaceSupport,
    families: QueueFamilies,
    info: &SwapChainInfo,
) -> Result<SwapChainConfig> {
    let surface_format = choose_surface_format(&support.formats)?;
    let present_mode = choose_present_mode(&support.present_modes);
    let extent = choose_extent(&support.capabilities, info.requested_extent());
    let image_count = choose_image_count(&support.capabilities);

    Ok(SwapChainConfig {
        surface_format,
        present_mode,
        extent,
        image_count,
        sharing: SharingMode::for_families(families),
    })
}

/// Image handed out by `SwapChain::acquire_next_image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    /// The chain still works but no longer matches the surface exactly.
    pub suboptimal: bool,
}

backend_impl! {
    SwapChainImpl {
        vulkan: VulkanSwapChain,
        mock: MockSwapChain,
    },
    "swapchain"
}

backend_impl! {
    ImageViewImpl {
        vulkan: VulkanImageView,
        mock: MockImageView,
    },
    "image view"
}

/// View over one swapchain image, usable as a frame buffer attachment.
#[derive(Debug)]
pub struct ImageView {
    handle: Handle<ImageViewImpl, IMAGE_VIEW_CAPACITY>,
}

impl ImageView {
    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub(crate) fn inner(&self) -> &ImageViewImpl {
        self.handle.get()
    }
}

#[derive(Debug)]
pub struct SwapChain {
    // Views go before the chain that owns their images.
    views: Vec<ImageView>,
    handle: Handle<SwapChainImpl, SWAPCHAIN_CAPACITY>,
    config: SwapChainConfig,
}

impl SwapChain {
    pub(crate) fn create(device: &Device, info: &SwapChainInfo) -> Result<Self> {
        let support = match device.inner() {
            DeviceImpl::Vulkan(device) => device.surface_support()?,
            DeviceImpl::Mock(device) => device.surface_support(),
        };
        let mut config = negotiate(&support, device.adapter().queue_families, info)?;

        log::debug!(
            "Swapchain negotiated: {:?} {:?}, {:?}, {}x{}, {} images, {:?}",
            config.surface_format.format,
            config.surface_format.color_space,
            config.present_mode,
            config.extent.x,
            config.extent.y,
            config.image_count,
            config.sharing
        );

        let inner = match device.inner() {
            DeviceImpl::Vulkan(device) => SwapChainImpl::Vulkan(VulkanSwapChain::new(device, &config)?),
            DeviceImpl::Mock(device) => SwapChainImpl::Mock(device.create_swapchain(&config)?),
        };

        let image_count = match &inner {
            SwapChainImpl::Vulkan(swapchain) => swapchain.image_count(),
            SwapChainImpl::Mock(swapchain) => swapchain.image_count(),
        };
        config.image_count = image_count;

        // A failed view drops the views built so far, then the chain.
        let mut views = Vec::with_capacity(image_count as usize);
        for index in 0..image_count {
            let view = match &inner {
                SwapChainImpl::Vulkan(swapchain) => ImageViewImpl::Vulkan(swapchain.create_view(index)?),
                SwapChainImpl::Mock(swapchain) => ImageViewImpl::Mock(swapchain.create_view(index)?),
            };
            views.push(ImageView {
                handle: Handle::emplace(view),
            });
        }

        log::info!(
            "Created swapchain with {} images ({}x{})",
            image_count,
            config.extent.x,
            config.extent.y
        );

        Ok(Self {
            views,
            handle: Handle::emplace(inner),
            config,
        })
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub fn extent(&self) -> UVec2 {
        self.config.extent
    }

    pub fn format(&self) -> Format {
        self.config.surface_format.format
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        self.config.surface_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.config.present_mode
    }

    pub fn sharing_mode(&self) -> SharingMode {
        self.config.sharing
    }

    pub fn image_count(&self) -> u32 {
        self.config.image_count
    }

    pub fn image_view(&self, index: u32) -> Option<&ImageView> {
        self.views.get(index as usize)
    }

    pub fn image_views(&self) -> &[ImageView] {
        &self.views
    }

    /// Acquire the next presentable image.
    ///
    /// `semaphore` and `fence` are signaled once the image is ready for
    /// rendering. `None` as timeout waits forever. A stale chain fails with
    /// `SwapchainOutOfDate`; recreating it is up to the caller.
    pub fn acquire_next_image(
        &self,
        semaphore: Option<&Semaphore>,
        fence: Option<&Fence>,
        timeout: Option<Duration>,
    ) -> Result<AcquiredImage> {
        let acquired = match self.handle.get() {
            SwapChainImpl::Vulkan(swapchain) => swapchain.acquire(semaphore, fence, timeout)?,
            SwapChainImpl::Mock(swapchain) => swapchain.acquire(semaphore, fence, timeout)?,
        };
        if acquired.suboptimal {
            log::warn!("Acquired image {} from a suboptimal swapchain", acquired.index);
        }
        Ok(acquired)
    }

    pub(crate) fn inner(&self) -> &SwapChainImpl {
        self.handle.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> SurfaceCapabilities {
        SurfaceCapabilities {
            min_image_count: 1,
            max_image_count: 3,
            current_extent: None,
            min_extent: UVec2::new(1, 1),
            max_extent: UVec2::new(4096, 4096),
        }
    }

    const RGBA_SRGB: SurfaceFormat = SurfaceFormat::new(Format::R8G8B8A8Srgb, ColorSpace::SrgbNonlinear);

    #[test]
    fn preferred_format_wins() {
        let chosen = choose_surface_format(&[RGBA_SRGB, PREFERRED_SURFACE_FORMAT]).unwrap();
        assert_eq!(chosen, PREFERRED_SURFACE_FORMAT);

        let chosen = choose_surface_format(&[PREFERRED_SURFACE_FORMAT, RGBA_SRGB]).unwrap();
        assert_eq!(chosen, PREFERRED_SURFACE_FORMAT);
    }

    #[test]
    fn first_format_is_fallback() {
        assert_eq!(choose_surface_format(&[RGBA_SRGB]).unwrap(), RGBA_SRGB);

        // Right format, wrong color space.
        let linear = SurfaceFormat::new(Format::B8G8R8A8Srgb, ColorSpace::ExtendedSrgbLinear);
        assert_eq!(choose_surface_format(&[linear, RGBA_SRGB]).unwrap(), linear);
    }

    #[test]
    fn empty_format_list_fails() {
        let err = choose_surface_format(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatNotSupported);
    }

    #[test]
    fn mailbox_preferred_over_fifo() {
        assert_eq!(
            choose_present_mode(&[PresentMode::Fifo, PresentMode::Mailbox]),
            PresentMode::Mailbox
        );
        assert_eq!(choose_present_mode(&[PresentMode::Fifo]), PresentMode::Fifo);
        assert_eq!(
            choose_present_mode(&[PresentMode::Immediate, PresentMode::FifoRelaxed]),
            PresentMode::Fifo
        );
    }

    #[test]
    fn undefined_extent_clamps_request() {
        let caps = SurfaceCapabilities {
            min_extent: UVec2::new(100, 100),
            max_extent: UVec2::new(1920, 1080),
            ..caps()
        };
        assert_eq!(choose_extent(&caps, UVec2::new(640, 480)), UVec2::new(640, 480));
        assert_eq!(choose_extent(&caps, UVec2::new(50, 4000)), UVec2::new(100, 1080));
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let caps = SurfaceCapabilities {
            current_extent: Some(UVec2::new(800, 600)),
            ..caps()
        };
        assert_eq!(choose_extent(&caps, UVec2::new(640, 480)), UVec2::new(800, 600));
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        assert_eq!(choose_image_count(&caps()), 2);

        let tight = SurfaceCapabilities {
            min_image_count: 3,
            max_image_count: 3,
            ..caps()
        };
        assert_eq!(choose_image_count(&tight), 3);

        let unbounded = SurfaceCapabilities {
            min_image_count: 4,
            max_image_count: 0,
            ..caps()
        };
        assert_eq!(choose_image_count(&unbounded), 5);
    }

    #[test]
    fn sharing_follows_queue_families() {
        let shared = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        assert_eq!(SharingMode::for_families(shared), SharingMode::Exclusive);

        let split = QueueFamilies {
            graphics: 0,
            present: 2,
        };
        assert_eq!(SharingMode::for_families(split), SharingMode::Concurrent([0, 2]));
    }

    #[test]
    fn negotiation_of_reference_surface() {
        let support = SurfaceSupport {
            capabilities: caps(),
            formats: vec![PREFERRED_SURFACE_FORMAT, RGBA_SRGB],
            present_modes: vec![PresentMode::Fifo],
        };
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let config = negotiate(&support, families, &SwapChainInfo::new(640, 480)).unwrap();
        assert_eq!(config.image_count, 2);
        assert_eq!(config.extent, UVec2::new(640, 480));
        assert_eq!(config.surface_format, PREFERRED_SURFACE_FORMAT);
        assert_eq!(config.present_mode, PresentMode::Fifo);
        assert_eq!(config.sharing, SharingMode::Exclusive);
    }
}
