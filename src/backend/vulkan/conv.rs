// Conversions between backend-neutral types and Vulkan

use ash::vk;

use crate::adapter::AdapterType;
use crate::error::{Error, ErrorKind, Result};
use crate::format::{ColorSpace, Format, PresentMode, ShaderStage, SurfaceFormat};
use crate::instance::MessageSeverity;

macro_rules! format_table {
    ($($local:ident => $vk:ident,)*) => {
        pub(crate) fn format_to_vk(format: Format) -> Result<vk::Format> {
            match format {
                $(Format::$local => Ok(vk::Format::$vk),)*
                Format::Undefined => Err(Error::new(
                    ErrorKind::FormatNotSupported,
                    "Undefined format has no Vulkan equivalent",
                )),
            }
        }

        pub(crate) fn format_from_vk(format: vk::Format) -> Result<Format> {
            match format {
                $(vk::Format::$vk => Ok(Format::$local),)*
                other => Err(Error::new(
                    ErrorKind::FormatNotSupported,
                    format!("Vulkan format {:?} has no local equivalent", other),
                )),
            }
        }
    };
}

format_table! {
    R4G4UnormPack8 => R4G4_UNORM_PACK8,
    R8Unorm => R8_UNORM,
    R8Snorm => R8_SNORM,
    R8Uscaled => R8_USCALED,
    R8Sscaled => R8_SSCALED,
    R8Uint => R8_UINT,
    R8Sint => R8_SINT,
    R8Srgb => R8_SRGB,
    R4G4B4A4UnormPack16 => R4G4B4A4_UNORM_PACK16,
    B4G4R4A4UnormPack16 => B4G4R4A4_UNORM_PACK16,
    R5G6B5UnormPack16 => R5G6B5_UNORM_PACK16,
    B5G6R5UnormPack16 => B5G6R5_UNORM_PACK16,
    R5G5B5A1UnormPack16 => R5G5B5A1_UNORM_PACK16,
    B5G5R5A1UnormPack16 => B5G5R5A1_UNORM_PACK16,
    A1R5G5B5UnormPack16 => A1R5G5B5_UNORM_PACK16,
    R8G8Unorm => R8G8_UNORM,
    R8G8Snorm => R8G8_SNORM,
    R8G8Uscaled => R8G8_USCALED,
    R8G8Sscaled => R8G8_SSCALED,
    R8G8Uint => R8G8_UINT,
    R8G8Sint => R8G8_SINT,
    R8G8Srgb => R8G8_SRGB,
    R16Unorm => R16_UNORM,
    R16Snorm => R16_SNORM,
    R16Uscaled => R16_USCALED,
    R16Sscaled => R16_SSCALED,
    R16Uint => R16_UINT,
    R16Sint => R16_SINT,
    R16Sfloat => R16_SFLOAT,
    R10X6UnormPack16 => R10X6_UNORM_PACK16,
    R12X4UnormPack16 => R12X4_UNORM_PACK16,
    A4R4G4B4UnormPack16 => A4R4G4B4_UNORM_PACK16,
    A4B4G4R4UnormPack16 => A4B4G4R4_UNORM_PACK16,
    R8G8B8Unorm => R8G8B8_UNORM,
    R8G8B8Snorm => R8G8B8_SNORM,
    R8G8B8Uscaled => R8G8B8_USCALED,
    R8G8B8Sscaled => R8G8B8_SSCALED,
    R8G8B8Uint => R8G8B8_UINT,
    R8G8B8Sint => R8G8B8_SINT,
    R8G8B8Srgb => R8G8B8_SRGB,
    B8G8R8Unorm => B8G8R8_UNORM,
    B8G8R8Snorm => B8G8R8_SNORM,
    B8G8R8Uscaled => B8G8R8_USCALED,
    B8G8R8Sscaled => B8G8R8_SSCALED,
    B8G8R8Uint => B8G8R8_UINT,
    B8G8R8Sint => B8G8R8_SINT,
    B8G8R8Srgb => B8G8R8_SRGB,
    R8G8B8A8Unorm => R8G8B8A8_UNORM,
    R8G8B8A8Snorm => R8G8B8A8_SNORM,
    R8G8B8A8Uscaled => R8G8B8A8_USCALED,
    R8G8B8A8Sscaled => R8G8B8A8_SSCALED,
    R8G8B8A8Uint => R8G8B8A8_UINT,
    R8G8B8A8Sint => R8G8B8A8_SINT,
    R8G8B8A8Srgb => R8G8B8A8_SRGB,
    B8G8R8A8Unorm => B8G8R8A8_UNORM,
    B8G8R8A8Snorm => B8G8R8A8_SNORM,
    B8G8R8A8Uscaled => B8G8R8A8_USCALED,
    B8G8R8A8Sscaled => B8G8R8A8_SSCALED,
    B8G8R8A8Uint => B8G8R8A8_UINT,
    B8G8R8A8Sint => B8G8R8A8_SINT,
    B8G8R8A8Srgb => B8G8R8A8_SRGB,
    A8B8G8R8UnormPack32 => A8B8G8R8_UNORM_PACK32,
    A8B8G8R8SnormPack32 => A8B8G8R8_SNORM_PACK32,
    A8B8G8R8UscaledPack32 => A8B8G8R8_USCALED_PACK32,
    A8B8G8R8SscaledPack32 => A8B8G8R8_SSCALED_PACK32,
    A8B8G8R8UintPack32 => A8B8G8R8_UINT_PACK32,
    A8B8G8R8SintPack32 => A8B8G8R8_SINT_PACK32,
    A8B8G8R8SrgbPack32 => A8B8G8R8_SRGB_PACK32,
    A2R10G10B10UnormPack32 => A2R10G10B10_UNORM_PACK32,
    A2R10G10B10SnormPack32 => A2R10G10B10_SNORM_PACK32,
    A2R10G10B10UscaledPack32 => A2R10G10B10_USCALED_PACK32,
    A2R10G10B10SscaledPack32 => A2R10G10B10_SSCALED_PACK32,
    A2R10G10B10UintPack32 => A2R10G10B10_UINT_PACK32,
    A2R10G10B10SintPack32 => A2R10G10B10_SINT_PACK32,
    A2B10G10R10UnormPack32 => A2B10G10R10_UNORM_PACK32,
    A2B10G10R10SnormPack32 => A2B10G10R10_SNORM_PACK32,
    A2B10G10R10UscaledPack32 => A2B10G10R10_USCALED_PACK32,
    A2B10G10R10SscaledPack32 => A2B10G10R10_SSCALED_PACK32,
    A2B10G10R10UintPack32 => A2B10G10R10_UINT_PACK32,
    A2B10G10R10SintPack32 => A2B10G10R10_SINT_PACK32,
    R16G16Unorm => R16G16_UNORM,
    R16G16Snorm => R16G16_SNORM,
    R16G16Uscaled => R16G16_USCALED,
    R16G16Sscaled => R16G16_SSCALED,
    R16G16Uint => R16G16_UINT,
    R16G16Sint => R16G16_SINT,
    R16G16Sfloat => R16G16_SFLOAT,
    R32Uint => R32_UINT,
    R32Sint => R32_SINT,
    R32Sfloat => R32_SFLOAT,
    B10G11R11UfloatPack32 => B10G11R11_UFLOAT_PACK32,
    E5B9G9R9UfloatPack32 => E5B9G9R9_UFLOAT_PACK32,
    R10X6G10X6Unorm2pack16 => R10X6G10X6_UNORM_2PACK16,
    R12X4G12X4Unorm2pack16 => R12X4G12X4_UNORM_2PACK16,
    R16G16B16Unorm => R16G16B16_UNORM,
    R16G16B16Snorm => R16G16B16_SNORM,
    R16G16B16Uscaled => R16G16B16_USCALED,
    R16G16B16Sscaled => R16G16B16_SSCALED,
    R16G16B16Uint => R16G16B16_UINT,
    R16G16B16Sint => R16G16B16_SINT,
    R16G16B16Sfloat => R16G16B16_SFLOAT,
    R16G16B16A16Unorm => R16G16B16A16_UNORM,
    R16G16B16A16Snorm => R16G16B16A16_SNORM,
    R16G16B16A16Uscaled => R16G16B16A16_USCALED,
    R16G16B16A16Sscaled => R16G16B16A16_SSCALED,
    R16G16B16A16Uint => R16G16B16A16_UINT,
    R16G16B16A16Sint => R16G16B16A16_SINT,
    R16G16B16A16Sfloat => R16G16B16A16_SFLOAT,
    R32G32Uint => R32G32_UINT,
    R32G32Sint => R32G32_SINT,
    R32G32Sfloat => R32G32_SFLOAT,
    R64Uint => R64_UINT,
    R64Sint => R64_SINT,
    R64Sfloat => R64_SFLOAT,
    R32G32B32Uint => R32G32B32_UINT,
    R32G32B32Sint => R32G32B32_SINT,
    R32G32B32Sfloat => R32G32B32_SFLOAT,
    R32G32B32A32Uint => R32G32B32A32_UINT,
    R32G32B32A32Sint => R32G32B32A32_SINT,
    R32G32B32A32Sfloat => R32G32B32A32_SFLOAT,
    R64G64Uint => R64G64_UINT,
    R64G64Sint => R64G64_SINT,
    R64G64Sfloat => R64G64_SFLOAT,
    R64G64B64Uint => R64G64B64_UINT,
    R64G64B64Sint => R64G64B64_SINT,
    R64G64B64Sfloat => R64G64B64_SFLOAT,
    R64G64B64A64Uint => R64G64B64A64_UINT,
    R64G64B64A64Sint => R64G64B64A64_SINT,
    R64G64B64A64Sfloat => R64G64B64A64_SFLOAT,
}

pub(crate) fn color_space_to_vk(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::DisplayP3Nonlinear => vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        ColorSpace::ExtendedSrgbLinear => vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        ColorSpace::Hdr10St2084 => vk::ColorSpaceKHR::HDR10_ST2084_EXT,
        ColorSpace::PassThrough => vk::ColorSpaceKHR::PASS_THROUGH_EXT,
    }
}

pub(crate) fn color_space_from_vk(color_space: vk::ColorSpaceKHR) -> Option<ColorSpace> {
    match color_space {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => Some(ColorSpace::SrgbNonlinear),
        vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT => Some(ColorSpace::DisplayP3Nonlinear),
        vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT => Some(ColorSpace::ExtendedSrgbLinear),
        vk::ColorSpaceKHR::HDR10_ST2084_EXT => Some(ColorSpace::Hdr10St2084),
        vk::ColorSpaceKHR::PASS_THROUGH_EXT => Some(ColorSpace::PassThrough),
        _ => None,
    }
}

/// Surface formats the local model can express; others are skipped.
pub(crate) fn surface_formats_from_vk(formats: &[vk::SurfaceFormatKHR]) -> Vec<SurfaceFormat> {
    formats
        .iter()
        .filter_map(|f| {
            let format = format_from_vk(f.format).ok()?;
            let color_space = color_space_from_vk(f.color_space)?;
            Some(SurfaceFormat::new(format, color_space))
        })
        .collect()
}

pub(crate) fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub(crate) fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
        ShaderStage::AllGraphics => vk::ShaderStageFlags::ALL_GRAPHICS,
        ShaderStage::All => vk::ShaderStageFlags::ALL,
    }
}

pub(crate) fn adapter_type_from_vk(device_type: vk::PhysicalDeviceType) -> AdapterType {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterType::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterType::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterType::Virtual,
        vk::PhysicalDeviceType::CPU => AdapterType::Cpu,
        _ => AdapterType::Other,
    }
}

pub(crate) fn severities_to_vk(severity: MessageSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let mut flags = vk::DebugUtilsMessageSeverityFlagsEXT::empty();
    if severity.contains(MessageSeverity::VERBOSE) {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
    }
    if severity.contains(MessageSeverity::INFO) {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
    }
    if severity.contains(MessageSeverity::WARNING) {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    }
    if severity.contains(MessageSeverity::ERROR) {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    }
    flags
}

/// Total mapping from Vulkan status codes to error kinds.
pub(crate) fn error_kind(result: vk::Result) -> ErrorKind {
    match result {
        vk::Result::TIMEOUT | vk::Result::NOT_READY => ErrorKind::Timeout,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => ErrorKind::OutOfHostMemory,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => ErrorKind::OutOfDeviceMemory,
        vk::Result::ERROR_INITIALIZATION_FAILED => ErrorKind::InitializationFailed,
        vk::Result::ERROR_DEVICE_LOST => ErrorKind::DeviceLost,
        vk::Result::ERROR_LAYER_NOT_PRESENT => ErrorKind::LayerNotPresent,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT => ErrorKind::ExtensionNotPresent,
        vk::Result::ERROR_FEATURE_NOT_PRESENT => ErrorKind::FeatureNotPresent,
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => ErrorKind::IncompatibleDriver,
        vk::Result::ERROR_TOO_MANY_OBJECTS => ErrorKind::TooManyObjects,
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => ErrorKind::FormatNotSupported,
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => ErrorKind::OutOfPoolMemory,
        vk::Result::ERROR_SURFACE_LOST_KHR => ErrorKind::SurfaceLost,
        vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => ErrorKind::NativeWindowInUse,
        vk::Result::ERROR_OUT_OF_DATE_KHR => ErrorKind::SwapchainOutOfDate,
        vk::Result::ERROR_VALIDATION_FAILED_EXT => ErrorKind::ValidationFailed,
        vk::Result::ERROR_INVALID_SHADER_NV => ErrorKind::ShaderCompileFailed,
        _ => ErrorKind::Unknown,
    }
}

pub(crate) fn error(result: vk::Result, message: impl Into<String>) -> Error {
    Error::with_code(error_kind(result), result.as_raw(), message)
}

/// Attach a message to a raw Vulkan result.
pub(crate) trait VkResultExt<T> {
    fn context(self, message: &str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    fn context(self, message: &str) -> Result<T> {
        self.map_err(|result| error(result, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_format_round_trips() {
        for &format in Format::ALL {
            let raw = format_to_vk(format).unwrap();
            assert_eq!(format_from_vk(raw).unwrap(), format, "{format}");
        }
    }

    #[test]
    fn unmapped_formats_are_rejected() {
        let err = format_from_vk(vk::Format::BC1_RGB_UNORM_BLOCK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatNotSupported);

        let err = format_to_vk(Format::Undefined).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatNotSupported);
        assert!(format_from_vk(vk::Format::UNDEFINED).is_err());
    }

    #[test]
    fn results_map_to_kinds() {
        assert_eq!(error_kind(vk::Result::ERROR_OUT_OF_DATE_KHR), ErrorKind::SwapchainOutOfDate);
        assert_eq!(error_kind(vk::Result::TIMEOUT), ErrorKind::Timeout);
        assert_eq!(error_kind(vk::Result::ERROR_FRAGMENTATION), ErrorKind::Unknown);

        let err = error(vk::Result::ERROR_DEVICE_LOST, "queue submit");
        assert_eq!(err.kind(), ErrorKind::DeviceLost);
        assert_eq!(err.code(), -4);
    }

    #[test]
    fn unknown_surface_formats_are_skipped() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::ASTC_4X4_SRGB_BLOCK,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let converted = surface_formats_from_vk(&formats);
        assert_eq!(
            converted,
            vec![SurfaceFormat::new(Format::B8G8R8A8Srgb, ColorSpace::SrgbNonlinear)]
        );
    }

    #[test]
    fn severity_flags_follow_level() {
        let flags = severities_to_vk(MessageSeverity::WARNING | MessageSeverity::ERROR);
        assert!(flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
        assert!(!flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
    }
}
