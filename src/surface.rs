// Surface - native drawable target
//
// Either the embedding platform creates the native surface itself through a
// callback, or the backend creates one from raw window handles.

use std::fmt;
use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};

use crate::backend::mock::MockSurface;
use crate::backend::vulkan::VulkanSurface;
use crate::backend::{backend_impl, BackendKind};
use crate::error::{Error, ErrorKind, Result};
use crate::handle::{Handle, SURFACE_CAPACITY};
use crate::instance::{Instance, InstanceImpl};

/// Callback that receives the native instance handle and returns a native
/// surface handle, or 0 on failure. Ownership of the returned surface passes
/// to the `Surface`.
pub type CustomSurfaceInit = Box<dyn FnOnce(u64) -> u64>;

/// Raw platform handles of a window.
///
/// The window must outlive any surface created from these handles.
#[derive(Debug, Clone, Copy)]
pub struct NativeWindow {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

impl NativeWindow {
    pub fn from_window<W>(window: &W) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + ?Sized,
    {
        let display = window.display_handle().map_err(|e| {
            Error::new(
                ErrorKind::InitializationFailed,
                format!("Failed to get display handle: {e}"),
            )
        })?;
        let handle = window.window_handle().map_err(|e| {
            Error::new(
                ErrorKind::InitializationFailed,
                format!("Failed to get window handle: {e}"),
            )
        })?;

        Ok(Self {
            display: display.as_raw(),
            window: handle.as_raw(),
        })
    }
}

/// How to obtain the native surface. The custom initializer wins when both
/// are set.
#[derive(Default)]
pub struct SurfaceInfo {
    pub custom_init: Option<CustomSurfaceInit>,
    pub native_window: Option<NativeWindow>,
}

impl SurfaceInfo {
    pub fn custom(init: impl FnOnce(u64) -> u64 + 'static) -> Self {
        Self {
            custom_init: Some(Box::new(init)),
            native_window: None,
        }
    }

    pub fn native(window: NativeWindow) -> Self {
        Self {
            custom_init: None,
            native_window: Some(window),
        }
    }
}

impl fmt::Debug for SurfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceInfo")
            .field("custom_init", &self.custom_init.is_some())
            .field("native_window", &self.native_window)
            .finish()
    }
}

backend_impl! {
    SurfaceImpl {
        vulkan: Arc<VulkanSurface>,
        mock: Arc<MockSurface>,
    },
    "surface"
}

#[derive(Debug)]
pub struct Surface {
    handle: Handle<SurfaceImpl, SURFACE_CAPACITY>,
}

impl Surface {
    pub(crate) fn create(instance: &Instance, info: SurfaceInfo) -> Result<Self> {
        let SurfaceInfo {
            custom_init,
            native_window,
        } = info;

        let inner = if let Some(init) = custom_init {
            let raw = init(instance.raw_handle());
            if raw == 0 {
                return Err(Error::new(
                    ErrorKind::InitializationFailed,
                    "Custom surface initializer returned a null surface",
                ));
            }
            match instance.inner() {
                InstanceImpl::Vulkan(instance) => {
                    SurfaceImpl::Vulkan(VulkanSurface::from_raw(instance, raw))
                }
                InstanceImpl::Mock(instance) => SurfaceImpl::Mock(MockSurface::from_raw(instance, raw)),
            }
        } else if let Some(window) = native_window {
            match instance.inner() {
                InstanceImpl::Vulkan(instance) => {
                    SurfaceImpl::Vulkan(VulkanSurface::from_window(instance, &window)?)
                }
                InstanceImpl::Mock(instance) => {
                    SurfaceImpl::Mock(MockSurface::from_window(instance, &window)?)
                }
            }
        } else {
            return Err(Error::new(
                ErrorKind::InitializationFailed,
                "Surface info has neither a custom initializer nor a native window",
            ));
        };

        log::info!("Created {} surface", inner.kind());
        Ok(Self {
            handle: Handle::emplace(inner),
        })
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    /// Native surface handle as an opaque integer.
    pub fn raw_handle(&self) -> u64 {
        match self.handle.get() {
            SurfaceImpl::Vulkan(surface) => surface.raw_handle(),
            SurfaceImpl::Mock(surface) => surface.raw_handle(),
        }
    }

    pub(crate) fn inner(&self) -> &SurfaceImpl {
        self.handle.get()
    }
}
