// Synchronization primitives
//
// Semaphores order GPU work against other GPU work, fences let the CPU
// observe GPU completion.

use std::time::Duration;

use crate::backend::mock::{MockFence, MockSemaphore};
use crate::backend::vulkan::{VulkanFence, VulkanSemaphore};
use crate::backend::{backend_impl, BackendKind};
use crate::error::Result;
use crate::handle::{Handle, FENCE_CAPACITY, SEMAPHORE_CAPACITY};

backend_impl! {
    SemaphoreImpl {
        vulkan: VulkanSemaphore,
        mock: MockSemaphore,
    },
    "semaphore"
}

backend_impl! {
    FenceImpl {
        vulkan: VulkanFence,
        mock: MockFence,
    },
    "fence"
}

/// GPU-to-GPU ordering token. Has no CPU-visible state.
#[derive(Debug)]
pub struct Semaphore {
    handle: Handle<SemaphoreImpl, SEMAPHORE_CAPACITY>,
}

impl Semaphore {
    pub(crate) fn from_impl(inner: SemaphoreImpl) -> Self {
        Self {
            handle: Handle::emplace(inner),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub(crate) fn inner(&self) -> &SemaphoreImpl {
        self.handle.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceStatus {
    Unsignaled,
    Signaled,
    /// The driver could not report a state, typically after device loss.
    Unknown,
}

/// GPU-to-CPU completion token.
#[derive(Debug)]
pub struct Fence {
    handle: Handle<FenceImpl, FENCE_CAPACITY>,
}

impl Fence {
    pub(crate) fn from_impl(inner: FenceImpl) -> Self {
        Self {
            handle: Handle::emplace(inner),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.handle.get().kind()
    }

    pub fn status(&self) -> FenceStatus {
        match self.handle.get() {
            FenceImpl::Vulkan(fence) => fence.status(),
            FenceImpl::Mock(fence) => fence.status(),
        }
    }

    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Block until the fence is signaled.
    ///
    /// `None` waits forever; otherwise an expired wait fails with
    /// `ErrorKind::Timeout` and leaves the fence untouched.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        match self.handle.get() {
            FenceImpl::Vulkan(fence) => fence.wait(timeout),
            FenceImpl::Mock(fence) => fence.wait(timeout),
        }
    }

    /// Return the fence to the unsignaled state.
    pub fn reset(&self) -> Result<()> {
        match self.handle.get() {
            FenceImpl::Vulkan(fence) => fence.reset(),
            FenceImpl::Mock(fence) => {
                fence.reset();
                Ok(())
            }
        }
    }

    pub(crate) fn inner(&self) -> &FenceImpl {
        self.handle.get()
    }
}

/// Convert an optional timeout into driver nanoseconds, saturating to "forever".
pub(crate) fn timeout_nanos(timeout: Option<Duration>) -> u64 {
    timeout.map_or(u64::MAX, |t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_saturate() {
        assert_eq!(timeout_nanos(None), u64::MAX);
        assert_eq!(timeout_nanos(Some(Duration::from_millis(5))), 5_000_000);
        assert_eq!(timeout_nanos(Some(Duration::MAX)), u64::MAX);
    }
}
