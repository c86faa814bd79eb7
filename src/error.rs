// Error model shared by every backend
//
// Every failure carries a kind, the numeric backend code and a message,
// enough to reproduce the failing call from a log line.

use std::fmt;
use thiserror::Error;

/// Category of a graphics failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InitializationFailed,
    DeviceLost,
    OutOfHostMemory,
    OutOfDeviceMemory,
    ExtensionNotPresent,
    LayerNotPresent,
    FeatureNotPresent,
    IncompatibleDriver,
    TooManyObjects,
    FormatNotSupported,
    OutOfPoolMemory,
    SurfaceLost,
    NativeWindowInUse,
    SwapchainOutOfDate,
    ValidationFailed,
    ShaderCompileFailed,
    /// A wait did not complete within the requested timeout.
    Timeout,
    /// The caller used an object outside the states that allow the operation.
    InvalidState,
    Unknown,
}

impl ErrorKind {
    /// Numeric code used when the backend did not supply one.
    ///
    /// Values follow the Vulkan result codes so logs read the same for
    /// every backend.
    pub const fn canonical_code(self) -> i32 {
        match self {
            ErrorKind::Timeout => 2,
            ErrorKind::OutOfHostMemory => -1,
            ErrorKind::OutOfDeviceMemory => -2,
            ErrorKind::InitializationFailed => -3,
            ErrorKind::DeviceLost => -4,
            ErrorKind::LayerNotPresent => -6,
            ErrorKind::ExtensionNotPresent => -7,
            ErrorKind::FeatureNotPresent => -8,
            ErrorKind::IncompatibleDriver => -9,
            ErrorKind::TooManyObjects => -10,
            ErrorKind::FormatNotSupported => -11,
            ErrorKind::Unknown => -13,
            ErrorKind::OutOfPoolMemory => -1_000_069_000,
            ErrorKind::SurfaceLost => -1_000_000_000,
            ErrorKind::NativeWindowInUse => -1_000_000_001,
            ErrorKind::SwapchainOutOfDate => -1_000_001_004,
            ErrorKind::ValidationFailed => -1_000_011_001,
            ErrorKind::ShaderCompileFailed => -1_000_012_000,
            // Not a driver condition; no backend reports it.
            ErrorKind::InvalidState => i32::MIN,
        }
    }

    /// Fixed human-readable description of the kind.
    pub const fn description(self) -> &'static str {
        match self {
            ErrorKind::InitializationFailed => {
                "Initialization of an object could not be completed for implementation-specific reasons."
            }
            ErrorKind::DeviceLost => "The logical or physical device has been lost.",
            ErrorKind::OutOfHostMemory => "A host memory allocation has failed.",
            ErrorKind::OutOfDeviceMemory => "A device memory allocation has failed.",
            ErrorKind::ExtensionNotPresent => "A requested extension is not supported.",
            ErrorKind::LayerNotPresent => {
                "A requested layer is not present or could not be loaded."
            }
            ErrorKind::FeatureNotPresent => "A requested feature is not supported.",
            ErrorKind::IncompatibleDriver => {
                "The requested API version is not supported by the driver."
            }
            ErrorKind::TooManyObjects => {
                "Too many objects of the type have already been created."
            }
            ErrorKind::FormatNotSupported => {
                "A requested format is not supported on this device."
            }
            ErrorKind::OutOfPoolMemory => "A pool memory allocation has failed.",
            ErrorKind::SurfaceLost => "A surface is no longer available.",
            ErrorKind::NativeWindowInUse => {
                "The requested window is already in use by another API."
            }
            ErrorKind::SwapchainOutOfDate => {
                "The surface changed and is no longer compatible with the swapchain."
            }
            ErrorKind::ValidationFailed => "Cannot validate given data structure.",
            ErrorKind::ShaderCompileFailed => "One or more shaders failed to compile or link.",
            ErrorKind::Timeout => "A wait operation did not complete in the allotted time.",
            ErrorKind::InvalidState => "The object is not in a state that allows this operation.",
            ErrorKind::Unknown => "An unknown error has occurred.",
        }
    }

    /// Whether the application can reasonably continue after this error.
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::InitializationFailed
                | ErrorKind::SwapchainOutOfDate
                | ErrorKind::ShaderCompileFailed
                | ErrorKind::Timeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Structured graphics error: kind, backend status code and message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (kind = {kind}, code = {code}): {}", .kind.description())]
pub struct Error {
    kind: ErrorKind,
    code: i32,
    message: String,
}

impl Error {
    /// Error with an explicit backend status code.
    pub fn with_code(kind: ErrorKind, code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// Error carrying the kind's canonical code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::with_code(kind, kind.canonical_code(), message)
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_code_and_description() {
        let err = Error::new(ErrorKind::LayerNotPresent, "Layer VK_LAYER_foo not found");
        let text = err.to_string();
        assert!(text.starts_with("Layer VK_LAYER_foo not found"));
        assert!(text.contains("kind = LayerNotPresent"));
        assert!(text.contains("code = -6"));
        assert!(text.contains("not present or could not be loaded"));
    }

    #[test]
    fn explicit_code_overrides_canonical() {
        let err = Error::with_code(ErrorKind::Unknown, 42, "odd");
        assert_eq!(err.code(), 42);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.message(), "odd");
    }

    #[test]
    fn device_lost_is_fatal() {
        assert!(!ErrorKind::DeviceLost.is_recoverable());
        assert!(ErrorKind::SwapchainOutOfDate.is_recoverable());
        assert!(ErrorKind::ShaderCompileFailed.is_recoverable());
    }
}
