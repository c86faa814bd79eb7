// Instance - connection to the graphics driver
//
// Resolves the extension/layer requirements, validates them against what the
// driver offers and selects the backend every derived object will use.

use std::sync::Arc;

use bitflags::bitflags;
use raw_window_handle::RawDisplayHandle;

use crate::backend::mock::MockInstance;
use crate::backend::vulkan::VulkanInstance;
use crate::backend::{backend_impl, Backend, BackendKind};
use crate::device::Device;
use crate::error::{Error, ErrorKind, Result};
use crate::handle::{Handle, INSTANCE_CAPACITY};
use crate::surface::{Surface, SurfaceInfo};

pub const SURFACE_EXTENSION: &str = "VK_KHR_surface";
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";
pub const DEBUG_UTILS_EXTENSION: &str = "VK_EXT_debug_utils";
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Window-system surface extensions for the current platform.
pub fn platform_surface_extensions() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["VK_KHR_win32_surface"]
    }

    #[cfg(all(unix, not(any(target_os = "macos", target_os = "ios", target_os = "android"))))]
    {
        &["VK_KHR_xlib_surface", "VK_KHR_xcb_surface", "VK_KHR_wayland_surface"]
    }

    #[cfg(target_os = "android")]
    {
        &["VK_KHR_android_surface"]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "android",
        all(unix, not(any(target_os = "macos", target_os = "ios")))
    )))]
    {
        &[]
    }
}

/// Instance extensions needed to create a surface for `display`.
///
/// Includes `VK_KHR_surface`. Window systems without a surface path fail
/// with `ExtensionNotPresent`.
pub fn required_surface_extensions(display: RawDisplayHandle) -> Result<Vec<String>> {
    let platform = match display {
        RawDisplayHandle::Windows(_) => "VK_KHR_win32_surface",
        RawDisplayHandle::Xlib(_) => "VK_KHR_xlib_surface",
        RawDisplayHandle::Xcb(_) => "VK_KHR_xcb_surface",
        RawDisplayHandle::Wayland(_) => "VK_KHR_wayland_surface",
        other => {
            return Err(Error::new(
                ErrorKind::ExtensionNotPresent,
                format!("Unsupported window system: {:?}", other),
            ))
        }
    };
    Ok(vec![SURFACE_EXTENSION.to_string(), platform.to_string()])
}

bitflags! {
    /// Severities forwarded by the driver debug messenger.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageSeverity: u32 {
        const VERBOSE = 1 << 0;
        const INFO = 1 << 1;
        const WARNING = 1 << 2;
        const ERROR = 1 << 3;
    }
}

/// How much driver validation output to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugLevel {
    /// No validation layer, no messenger.
    #[default]
    None,
    Verbose,
    Warning,
    Error,
}

impl DebugLevel {
    /// Severities reported at this level.
    ///
    /// Levels are thresholds: everything at or above the chosen severity.
    pub fn severities(self) -> MessageSeverity {
        match self {
            DebugLevel::None => MessageSeverity::empty(),
            DebugLevel::Verbose => MessageSeverity::all(),
            DebugLevel::Warning => MessageSeverity::WARNING | MessageSeverity::ERROR,
            DebugLevel::Error => MessageSeverity::ERROR,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != DebugLevel::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub backend: Backend,
    pub debug_level: DebugLevel,
    /// Instance extensions. Empty means `VK_KHR_surface` plus whichever
    /// platform surface extensions the driver offers.
    pub required_extensions: Vec<String>,
    pub required_layers: Vec<String>,
    pub application_name: String,
    pub application_version: Version,
    pub engine_name: String,
    pub engine_version: Version,
}

impl Default for InstanceInfo {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            debug_level: DebugLevel::None,
            required_extensions: Vec::new(),
            required_layers: Vec::new(),
            application_name: "frame-rhi application".to_string(),
            application_version: Version::new(0, 1, 0),
            engine_name: "frame-rhi".to_string(),
            engine_version: Version::new(0, 1, 0),
        }
    }
}

/// Final extension and layer lists sent to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Requirements {
    pub extensions: Vec<String>,
    /// Enabled only when the driver offers them.
    pub optional_extensions: Vec<String>,
    pub layers: Vec<String>,
}

impl InstanceInfo {
    pub(crate) fn requirements(&self) -> Requirements {
        let (mut extensions, optional_extensions) = if self.required_extensions.is_empty() {
            (
                vec![SURFACE_EXTENSION.to_string()],
                platform_surface_extensions().iter().map(|name| name.to_string()).collect(),
            )
        } else {
            (self.required_extensions.clone(), Vec::new())
        };
        let mut layers = self.required_layers.clone();

        if self.debug_level.is_enabled() {
            push_unique(&mut extensions, DEBUG_UTILS_EXTENSION);
            push_unique(&mut layers, VALIDATION_LAYER);
        }

        Requirements {
            extensions,
            optional_extensions,
            layers,
        }
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

/// Fail with `kind` naming the first requested entry the driver lacks.
pub(crate) fn ensure_available(
    requested: &[String],
    available: &[String],
    kind: ErrorKind,
    label: &str,
) -> Result<()> {
    match requested.iter().find(|name| !available.contains(name)) {
        Some(missing) => Err(Error::new(kind, format!("{label} {missing} not found"))),
        None => Ok(()),
    }
}

/// Check the requirements against the driver and return the extensions to
/// enable: every required one plus the optional ones that are available.
pub(crate) fn ensure_requirements(
    requirements: &Requirements,
    extensions: &[String],
    layers: &[String],
) -> Result<Vec<String>> {
    log::debug!("Requested instance extensions: {:?}", requirements.extensions);
    log::debug!("Available instance extensions: {:?}", extensions);
    ensure_available(
        &requirements.extensions,
        extensions,
        ErrorKind::ExtensionNotPresent,
        "Extension",
    )?;

    log::debug!("Requested layers: {:?}", requirements.layers);
    log::debug!("Available layers: {:?}", layers);
    ensure_available(&requirements.layers, layers, ErrorKind::LayerNotPresent, "Layer")?;

    let mut enabled = requirements.extensions.clone();
    for name in &requirements.optional_extensions {
        if extensions.contains(name) {
            push_unique(&mut enabled, name);
        } else {
            log::debug!("Optional extension {} not offered, skipping", name);
        }
    }
    Ok(enabled)
}

backend_impl! {
    InstanceImpl {
        vulkan: Arc<VulkanInstance>,
        mock: Arc<MockInstance>,
    },
    "instance"
}

/// Connection to the graphics driver. Outlives every object created from it.
#[derive(Debug)]
pub struct Instance {
    handle: Handle<InstanceImpl, INSTANCE_CAPACITY>,
}

impl Instance {
    pub fn new(info: &InstanceInfo) -> Result<Self> {
        log::info!(
            "Creating {} instance for '{}'",
            info.backend.kind(),
            info.application_name
        );

        let requirements = info.requirements();
        let inner = match &info.backend {
            Backend::Vulkan => InstanceImpl::Vulkan(VulkanInstance::new(info, &requirements)?),
            Backend::Mock(driver) => InstanceImpl::Mock(MockInstance::new(driver, info, &requirements)?),
        };

        Ok(Self {
            handle: Handle::emplace(inner),
        })
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    /// Native instance handle as an opaque integer.
    pub fn raw_handle(&self) -> u64 {
        match self.handle.get() {
            InstanceImpl::Vulkan(instance) => instance.raw_handle(),
            InstanceImpl::Mock(instance) => instance.raw_handle(),
        }
    }

    pub fn create_surface(&self, info: SurfaceInfo) -> Result<Surface> {
        Surface::create(self, info)
    }

    /// Select the best adapter able to present to `surface` and open it.
    pub fn create_device(&self, surface: &Surface) -> Result<Device> {
        Device::create(self, surface)
    }

    pub(crate) fn inner(&self) -> &InstanceImpl {
        self.handle.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn severities_are_thresholds() {
        assert_eq!(DebugLevel::None.severities(), MessageSeverity::empty());
        assert_eq!(DebugLevel::Error.severities(), MessageSeverity::ERROR);
        assert_eq!(
            DebugLevel::Warning.severities(),
            MessageSeverity::WARNING | MessageSeverity::ERROR
        );
        assert!(DebugLevel::Verbose.severities().contains(MessageSeverity::VERBOSE));
        assert!(DebugLevel::Verbose.severities().contains(MessageSeverity::ERROR));
    }

    #[test]
    fn empty_extension_list_uses_platform_defaults() {
        let requirements = InstanceInfo::default().requirements();
        assert_eq!(requirements.extensions, names(&[SURFACE_EXTENSION]));
        assert_eq!(
            requirements.optional_extensions.len(),
            platform_surface_extensions().len()
        );
        assert!(requirements.layers.is_empty());
    }

    #[test]
    fn missing_platform_extensions_are_skipped() {
        let requirements = Requirements {
            extensions: names(&[SURFACE_EXTENSION]),
            optional_extensions: names(&["VK_KHR_xlib_surface", "VK_KHR_wayland_surface"]),
            layers: Vec::new(),
        };
        let available = names(&[SURFACE_EXTENSION, "VK_KHR_wayland_surface"]);

        let enabled = ensure_requirements(&requirements, &available, &[]).unwrap();
        assert_eq!(enabled, names(&[SURFACE_EXTENSION, "VK_KHR_wayland_surface"]));
    }

    #[test]
    fn surface_extensions_follow_the_display() {
        use raw_window_handle::{WindowsDisplayHandle, XcbDisplayHandle, XlibDisplayHandle};

        let xlib = required_surface_extensions(RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0))).unwrap();
        assert_eq!(xlib, names(&[SURFACE_EXTENSION, "VK_KHR_xlib_surface"]));

        let xcb = required_surface_extensions(RawDisplayHandle::Xcb(XcbDisplayHandle::new(None, 0))).unwrap();
        assert_eq!(xcb, names(&[SURFACE_EXTENSION, "VK_KHR_xcb_surface"]));

        let windows = required_surface_extensions(RawDisplayHandle::Windows(WindowsDisplayHandle::new())).unwrap();
        assert_eq!(windows, names(&[SURFACE_EXTENSION, "VK_KHR_win32_surface"]));
    }

    #[test]
    fn debug_level_adds_messenger_and_validation() {
        let info = InstanceInfo {
            debug_level: DebugLevel::Warning,
            required_extensions: names(&[SURFACE_EXTENSION, DEBUG_UTILS_EXTENSION]),
            ..InstanceInfo::default()
        };
        let requirements = info.requirements();
        assert_eq!(
            requirements.extensions,
            names(&[SURFACE_EXTENSION, DEBUG_UTILS_EXTENSION])
        );
        assert_eq!(requirements.layers, names(&[VALIDATION_LAYER]));
    }

    #[test]
    fn first_missing_name_is_reported() {
        let err = ensure_available(
            &names(&["a", "b", "c"]),
            &names(&["a"]),
            ErrorKind::ExtensionNotPresent,
            "Extension",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtensionNotPresent);
        assert_eq!(err.message(), "Extension b not found");

        let err = ensure_available(&names(&["VK_LAYER_x"]), &[], ErrorKind::LayerNotPresent, "Layer")
            .unwrap_err();
        assert_eq!(err.message(), "Layer VK_LAYER_x not found");
    }
}
