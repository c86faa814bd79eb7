// Vulkan instance and surface
//
// Loads the system loader, validates the requested extensions and layers,
// and optionally installs a debug messenger forwarding to `log`.

use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use ash::extensions::{ext, khr};
use ash::vk::{self, Handle as _};
use ash::Entry;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use super::conv::{self, VkResultExt};
use crate::error::{Error, ErrorKind, Result};
use crate::instance::{ensure_requirements, InstanceInfo, Requirements, Version};
use crate::surface::NativeWindow;

pub(crate) struct VulkanInstance {
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub(crate) surface_loader: khr::Surface,
    pub(crate) instance: ash::Instance,
    pub(crate) entry: Entry,
}

impl VulkanInstance {
    pub(crate) fn new(info: &InstanceInfo, requirements: &Requirements) -> Result<Arc<Self>> {
        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }.map_err(|e| {
            Error::new(
                ErrorKind::InitializationFailed,
                format!("Failed to load Vulkan library. Is Vulkan installed? ({e})"),
            )
        })?;

        let version = entry
            .try_enumerate_instance_version()
            .context("Failed to enumerate Vulkan instance version")?
            .unwrap_or(vk::API_VERSION_1_0);
        log::info!(
            "Vulkan version: {}.{}.{} (variant {})",
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
            vk::api_version_variant(version)
        );

        // Step 2: Validate layers and extensions
        let extensions = entry
            .enumerate_instance_extension_properties(None)
            .context("Failed to enumerate Vulkan extension properties")?
            .iter()
            .map(|p| name_of(&p.extension_name))
            .collect::<Vec<_>>();
        let layers = entry
            .enumerate_instance_layer_properties()
            .context("Failed to enumerate Vulkan layer properties")?
            .iter()
            .map(|p| name_of(&p.layer_name))
            .collect::<Vec<_>>();
        let enabled_extensions = ensure_requirements(requirements, &extensions, &layers)?;

        // Step 3: Create instance
        let app_name = c_string(&info.application_name)?;
        let engine_name = c_string(&info.engine_name)?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(make_version(info.application_version))
            .engine_name(&engine_name)
            .engine_version(make_version(info.engine_version))
            .api_version(vk::API_VERSION_1_2);

        let extension_names = enabled_extensions
            .iter()
            .map(|name| c_string(name))
            .collect::<Result<Vec<_>>>()?;
        let layer_names = requirements
            .layers
            .iter()
            .map(|name| c_string(name))
            .collect::<Result<Vec<_>>>()?;
        let extension_ptrs = extension_names.iter().map(|n| n.as_ptr()).collect::<Vec<_>>();
        let layer_ptrs = layer_names.iter().map(|n| n.as_ptr()).collect::<Vec<_>>();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        // Step 4: Setup debug messenger if requested
        let debug_utils = if info.debug_level.is_enabled() {
            match setup_debug_messenger(&entry, &instance, info) {
                Ok(messenger) => Some(messenger),
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            }
        } else {
            None
        };

        let surface_loader = khr::Surface::new(&entry, &instance);
        Ok(Arc::new(Self {
            debug_utils,
            surface_loader,
            instance,
            entry,
        }))
    }

    pub(crate) fn raw_handle(&self) -> u64 {
        self.instance.handle().as_raw()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

impl std::fmt::Debug for VulkanInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanInstance")
            .field("instance", &self.instance.handle())
            .field("debug_messenger", &self.debug_utils.is_some())
            .finish()
    }
}

fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
    info: &InstanceInfo,
) -> Result<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ext::DebugUtils::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(conv::severities_to_vk(info.debug_level.severities()))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .context("Failed to set up debug messenger")?;

    log::debug!("Debug messenger installed for {:?}", info.debug_level);
    Ok((debug_utils, messenger))
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {}", message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {}", message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::info!("[Vulkan] {}", message);
    } else {
        log::debug!("[Vulkan] {}", message);
    }

    vk::FALSE
}

pub(super) fn name_of(raw: &[c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| {
        Error::new(
            ErrorKind::InitializationFailed,
            format!("'{value}' contains an interior NUL byte"),
        )
    })
}

fn make_version(version: Version) -> u32 {
    vk::make_api_version(0, version.major, version.minor, version.patch)
}

pub(crate) struct VulkanSurface {
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) instance: Arc<VulkanInstance>,
}

impl VulkanSurface {
    /// Adopt a surface created outside the crate.
    pub(crate) fn from_raw(instance: &Arc<VulkanInstance>, raw: u64) -> Arc<Self> {
        Arc::new(Self {
            surface: vk::SurfaceKHR::from_raw(raw),
            instance: Arc::clone(instance),
        })
    }

    pub(crate) fn from_window(instance: &Arc<VulkanInstance>, window: &NativeWindow) -> Result<Arc<Self>> {
        let entry = &instance.entry;
        let raw_instance = &instance.instance;

        let surface = match (window.display, window.window) {
            (_, RawWindowHandle::Win32(handle)) => {
                let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                    .hinstance(handle.hinstance.map_or(0, |h| h.get()) as vk::HINSTANCE)
                    .hwnd(handle.hwnd.get() as vk::HWND);
                let loader = khr::Win32Surface::new(entry, raw_instance);
                unsafe { loader.create_win32_surface(&create_info, None) }
            }
            (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
                let dpy = display.display.map_or(std::ptr::null_mut(), |d| d.as_ptr());
                let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                    .dpy(dpy as *mut vk::Display)
                    .window(handle.window);
                let loader = khr::XlibSurface::new(entry, raw_instance);
                unsafe { loader.create_xlib_surface(&create_info, None) }
            }
            (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(handle)) => {
                let connection = display.connection.map_or(std::ptr::null_mut(), |c| c.as_ptr());
                let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                    .connection(connection as *mut vk::xcb_connection_t)
                    .window(handle.window.get());
                let loader = khr::XcbSurface::new(entry, raw_instance);
                unsafe { loader.create_xcb_surface(&create_info, None) }
            }
            (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
                let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                    .display(display.display.as_ptr() as *mut vk::wl_display)
                    .surface(handle.surface.as_ptr() as *mut vk::wl_surface);
                let loader = khr::WaylandSurface::new(entry, raw_instance);
                unsafe { loader.create_wayland_surface(&create_info, None) }
            }
            (display, window) => {
                return Err(Error::new(
                    ErrorKind::ExtensionNotPresent,
                    format!("Unsupported window system: {:?} / {:?}", display, window),
                ))
            }
        }
        .context("Failed to create window surface")?;

        Ok(Arc::new(Self {
            surface,
            instance: Arc::clone(instance),
        }))
    }

    pub(crate) fn raw_handle(&self) -> u64 {
        self.surface.as_raw()
    }
}

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        unsafe {
            self.instance.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

impl std::fmt::Debug for VulkanSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSurface")
            .field("surface", &self.surface)
            .finish()
    }
}
