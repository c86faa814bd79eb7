// Backend-neutral pixel formats and presentation enums

use std::fmt;

macro_rules! pixel_formats {
    ($($name:ident,)*) => {
        /// Pixel format of an image or attachment.
        ///
        /// Channel order, bit width and numeric class follow the names used by
        /// explicit graphics APIs (`B8G8R8A8Srgb` is 8-bit BGRA, sRGB encoded).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Format {
            /// No format specified. Never accepted by a backend.
            Undefined,
            $($name,)*
        }

        impl Format {
            /// Every pixel format, excluding [`Format::Undefined`].
            pub const ALL: &'static [Format] = &[$(Format::$name,)*];
        }
    };
}

pixel_formats! {
    R4G4UnormPack8,
    R8Unorm,
    R8Snorm,
    R8Uscaled,
    R8Sscaled,
    R8Uint,
    R8Sint,
    R8Srgb,
    R4G4B4A4UnormPack16,
    B4G4R4A4UnormPack16,
    R5G6B5UnormPack16,
    B5G6R5UnormPack16,
    R5G5B5A1UnormPack16,
    B5G5R5A1UnormPack16,
    A1R5G5B5UnormPack16,
    R8G8Unorm,
    R8G8Snorm,
    R8G8Uscaled,
    R8G8Sscaled,
    R8G8Uint,
    R8G8Sint,
    R8G8Srgb,
    R16Unorm,
    R16Snorm,
    R16Uscaled,
    R16Sscaled,
    R16Uint,
    R16Sint,
    R16Sfloat,
    R10X6UnormPack16,
    R12X4UnormPack16,
    A4R4G4B4UnormPack16,
    A4B4G4R4UnormPack16,
    R8G8B8Unorm,
    R8G8B8Snorm,
    R8G8B8Uscaled,
    R8G8B8Sscaled,
    R8G8B8Uint,
    R8G8B8Sint,
    R8G8B8Srgb,
    B8G8R8Unorm,
    B8G8R8Snorm,
    B8G8R8Uscaled,
    B8G8R8Sscaled,
    B8G8R8Uint,
    B8G8R8Sint,
    B8G8R8Srgb,
    R8G8B8A8Unorm,
    R8G8B8A8Snorm,
    R8G8B8A8Uscaled,
    R8G8B8A8Sscaled,
    R8G8B8A8Uint,
    R8G8B8A8Sint,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    B8G8R8A8Snorm,
    B8G8R8A8Uscaled,
    B8G8R8A8Sscaled,
    B8G8R8A8Uint,
    B8G8R8A8Sint,
    B8G8R8A8Srgb,
    A8B8G8R8UnormPack32,
    A8B8G8R8SnormPack32,
    A8B8G8R8UscaledPack32,
    A8B8G8R8SscaledPack32,
    A8B8G8R8UintPack32,
    A8B8G8R8SintPack32,
    A8B8G8R8SrgbPack32,
    A2R10G10B10UnormPack32,
    A2R10G10B10SnormPack32,
    A2R10G10B10UscaledPack32,
    A2R10G10B10SscaledPack32,
    A2R10G10B10UintPack32,
    A2R10G10B10SintPack32,
    A2B10G10R10UnormPack32,
    A2B10G10R10SnormPack32,
    A2B10G10R10UscaledPack32,
    A2B10G10R10SscaledPack32,
    A2B10G10R10UintPack32,
    A2B10G10R10SintPack32,
    R16G16Unorm,
    R16G16Snorm,
    R16G16Uscaled,
    R16G16Sscaled,
    R16G16Uint,
    R16G16Sint,
    R16G16Sfloat,
    R32Uint,
    R32Sint,
    R32Sfloat,
    B10G11R11UfloatPack32,
    E5B9G9R9UfloatPack32,
    R10X6G10X6Unorm2pack16,
    R12X4G12X4Unorm2pack16,
    R16G16B16Unorm,
    R16G16B16Snorm,
    R16G16B16Uscaled,
    R16G16B16Sscaled,
    R16G16B16Uint,
    R16G16B16Sint,
    R16G16B16Sfloat,
    R16G16B16A16Unorm,
    R16G16B16A16Snorm,
    R16G16B16A16Uscaled,
    R16G16B16A16Sscaled,
    R16G16B16A16Uint,
    R16G16B16A16Sint,
    R16G16B16A16Sfloat,
    R32G32Uint,
    R32G32Sint,
    R32G32Sfloat,
    R64Uint,
    R64Sint,
    R64Sfloat,
    R32G32B32Uint,
    R32G32B32Sint,
    R32G32B32Sfloat,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    R32G32B32A32Sfloat,
    R64G64Uint,
    R64G64Sint,
    R64G64Sfloat,
    R64G64B64Uint,
    R64G64B64Sint,
    R64G64B64Sfloat,
    R64G64B64A64Uint,
    R64G64B64A64Sint,
    R64G64B64A64Sfloat,
}

impl Format {
    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            Format::R8Srgb
                | Format::R8G8Srgb
                | Format::R8G8B8Srgb
                | Format::B8G8R8Srgb
                | Format::R8G8B8A8Srgb
                | Format::B8G8R8A8Srgb
                | Format::A8B8G8R8SrgbPack32
        )
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Color space a presentable image is interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    DisplayP3Nonlinear,
    ExtendedSrgbLinear,
    Hdr10St2084,
    PassThrough,
}

/// A format/color-space pair a surface can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: Format,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    pub const fn new(format: Format, color_space: ColorSpace) -> Self {
        Self {
            format,
            color_space,
        }
    }
}

/// How presented images are queued for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// No vsync, lowest latency, may tear.
    Immediate,
    /// No vsync, no tearing, newest image replaces the queued one.
    Mailbox,
    /// Vsync. Always supported.
    Fifo,
    FifoRelaxed,
}

/// Programmable pipeline stage a shader module runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
    AllGraphics,
    All,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_formats_are_distinct_and_defined() {
        let unique: HashSet<_> = Format::ALL.iter().collect();
        assert_eq!(unique.len(), Format::ALL.len());
        assert!(!Format::ALL.contains(&Format::Undefined));
    }

    #[test]
    fn srgb_detection() {
        assert!(Format::B8G8R8A8Srgb.is_srgb());
        assert!(!Format::B8G8R8A8Unorm.is_srgb());
    }
}
