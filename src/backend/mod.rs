// Backend layer
//
// Each resource is a closed enum over the compiled-in backends, stored by
// value inside a `Handle`. The backend is chosen once when the `Instance` is
// created and every object derived from it carries the same variant.

pub mod mock;
pub mod vulkan;

use std::fmt;

pub use mock::MockDriver;

/// Which backend an object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Vulkan,
    Mock,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Vulkan => f.write_str("vulkan"),
            BackendKind::Mock => f.write_str("mock"),
        }
    }
}

/// Backend selection passed to `Instance::new`.
#[derive(Clone, Default)]
pub enum Backend {
    /// Load the system Vulkan loader.
    #[default]
    Vulkan,
    /// Run against an in-process simulated driver.
    Mock(MockDriver),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Vulkan => BackendKind::Vulkan,
            Backend::Mock(_) => BackendKind::Mock,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}

/// Objects from two backends met in one call.
#[track_caller]
pub(crate) fn mismatch(what: &str, expected: BackendKind) -> ! {
    panic!("{what} does not belong to the {expected} backend")
}

/// Declare the per-resource backend enum with checked accessors.
macro_rules! backend_impl {
    ($(#[$meta:meta])* $name:ident { vulkan: $vk:ty, mock: $mock:ty $(,)? }, $what:literal) => {
        $(#[$meta])*
        pub(crate) enum $name {
            Vulkan($vk),
            Mock($mock),
        }

        #[allow(dead_code)]
        impl $name {
            pub(crate) fn kind(&self) -> $crate::backend::BackendKind {
                match self {
                    Self::Vulkan(_) => $crate::backend::BackendKind::Vulkan,
                    Self::Mock(_) => $crate::backend::BackendKind::Mock,
                }
            }

            #[track_caller]
            pub(crate) fn vulkan(&self) -> &$vk {
                match self {
                    Self::Vulkan(inner) => inner,
                    Self::Mock(_) => {
                        $crate::backend::mismatch($what, $crate::backend::BackendKind::Vulkan)
                    }
                }
            }

            #[track_caller]
            pub(crate) fn mock(&self) -> &$mock {
                match self {
                    Self::Mock(inner) => inner,
                    Self::Vulkan(_) => {
                        $crate::backend::mismatch($what, $crate::backend::BackendKind::Mock)
                    }
                }
            }
        }
    };
}
pub(crate) use backend_impl;
