// Inline backend handles
//
// A `Handle` stores exactly one backend implementation by value, with no
// boxing and no vtable. The implementation type is a closed enum over the
// compiled-in backends, so every call is a plain `match`.
//
// Each resource declares a capacity in bytes. Emplacing a value whose type
// does not fit fails the build (post-monomorphization const assertion).

use std::any::type_name;
use std::fmt;
use std::mem::size_of;

pub const INSTANCE_CAPACITY: usize = 32;
pub const SURFACE_CAPACITY: usize = 32;
pub const DEVICE_CAPACITY: usize = 32;
pub const SWAPCHAIN_CAPACITY: usize = 64;
pub const IMAGE_VIEW_CAPACITY: usize = 32;
pub const SHADER_CAPACITY: usize = 32;
pub const RENDER_PASS_CAPACITY: usize = 32;
pub const PIPELINE_CAPACITY: usize = 48;
pub const FRAME_BUFFER_CAPACITY: usize = 32;
pub const COMMAND_POOL_CAPACITY: usize = 32;
pub const COMMAND_BUFFER_CAPACITY: usize = 48;
pub const SEMAPHORE_CAPACITY: usize = 32;
pub const FENCE_CAPACITY: usize = 32;

/// Compile-time check that a concrete backend type fits a capacity.
///
/// Used by the backend modules next to each resource type.
macro_rules! assert_fits {
    ($ty:ty, $capacity:expr) => {
        const _: () = assert!(
            ::std::mem::size_of::<$ty>() <= $capacity,
            "backend type exceeds its handle capacity"
        );
    };
}
pub(crate) use assert_fits;

/// Move-only, fixed-capacity slot holding one backend implementation.
///
/// A handle is either empty or populated. Only backend code inside this
/// crate can populate one. Touching an empty handle is a programming error
/// and panics.
pub struct Handle<T, const SIZE: usize> {
    slot: Option<T>,
}

impl<T, const SIZE: usize> Handle<T, SIZE> {
    const FITS: () = assert!(
        size_of::<T>() <= SIZE,
        "backend implementation exceeds the handle capacity"
    );

    /// The explicit empty state.
    pub const fn empty() -> Self {
        Self { slot: None }
    }

    /// Populate a handle with a backend implementation.
    pub(crate) fn emplace(value: T) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS;
        Self { slot: Some(value) }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Declared capacity in bytes.
    pub const fn capacity() -> usize {
        SIZE
    }

    #[track_caller]
    pub(crate) fn get(&self) -> &T {
        match &self.slot {
            Some(value) => value,
            None => panic!("operation on an empty {} handle", type_name::<T>()),
        }
    }

    #[track_caller]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        match &mut self.slot {
            Some(value) => value,
            None => panic!("operation on an empty {} handle", type_name::<T>()),
        }
    }

    /// Destroy the held implementation now, leaving the handle empty.
    pub fn release(&mut self) {
        self.slot = None;
    }
}

impl<T, const SIZE: usize> Default for Handle<T, SIZE> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, const SIZE: usize> fmt::Debug for Handle<T, SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &type_name::<T>())
            .field("capacity", &SIZE)
            .field("empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command, device, instance, pipeline, surface, swapchain, sync};

    #[test]
    fn empty_handle_reports_empty() {
        let handle: Handle<u64, 8> = Handle::empty();
        assert!(handle.is_empty());
        assert_eq!(Handle::<u64, 8>::capacity(), 8);
    }

    #[test]
    fn emplace_then_release() {
        let mut handle: Handle<u32, 8> = Handle::emplace(7);
        assert!(!handle.is_empty());
        assert_eq!(*handle.get(), 7);
        *handle.get_mut() = 9;
        assert_eq!(*handle.get(), 9);
        handle.release();
        assert!(handle.is_empty());
    }

    #[test]
    #[should_panic(expected = "empty")]
    fn empty_handle_fails_fast() {
        let handle: Handle<u32, 8> = Handle::default();
        let _ = handle.get();
    }

    #[test]
    fn every_backend_impl_fits_its_capacity() {
        assert!(size_of::<instance::InstanceImpl>() <= INSTANCE_CAPACITY);
        assert!(size_of::<surface::SurfaceImpl>() <= SURFACE_CAPACITY);
        assert!(size_of::<device::DeviceImpl>() <= DEVICE_CAPACITY);
        assert!(size_of::<swapchain::SwapChainImpl>() <= SWAPCHAIN_CAPACITY);
        assert!(size_of::<swapchain::ImageViewImpl>() <= IMAGE_VIEW_CAPACITY);
        assert!(size_of::<pipeline::ShaderImpl>() <= SHADER_CAPACITY);
        assert!(size_of::<pipeline::RenderPassImpl>() <= RENDER_PASS_CAPACITY);
        assert!(size_of::<pipeline::PipelineImpl>() <= PIPELINE_CAPACITY);
        assert!(size_of::<pipeline::FrameBufferImpl>() <= FRAME_BUFFER_CAPACITY);
        assert!(size_of::<command::CommandPoolImpl>() <= COMMAND_POOL_CAPACITY);
        assert!(size_of::<command::CommandBufferImpl>() <= COMMAND_BUFFER_CAPACITY);
        assert!(size_of::<sync::SemaphoreImpl>() <= SEMAPHORE_CAPACITY);
        assert!(size_of::<sync::FenceImpl>() <= FENCE_CAPACITY);
    }
}
