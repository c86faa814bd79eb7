//! Object graph creation against the mock driver: instance requirements,
//! adapter selection, swapchain negotiation and cleanup on failure.

mod common;

use frame_rhi::adapter::QueueFamilySupport;
use frame_rhi::swapchain::SharingMode;
use frame_rhi::{
    AdapterType, Backend, BackendKind, ColorSpace, DebugLevel, ErrorKind, Format, Instance,
    InstanceInfo, MockAdapter, MockDriver, PresentMode, SurfaceInfo, SwapChainInfo,
};

#[test]
fn custom_surface_init_receives_the_instance() {
    let driver = MockDriver::new();
    let instance = Instance::new(&InstanceInfo {
        backend: Backend::Mock(driver.clone()),
        ..InstanceInfo::default()
    })
    .unwrap();
    assert_eq!(instance.backend(), BackendKind::Mock);

    let expected_instance = instance.raw_handle();
    let surface = instance
        .create_surface(SurfaceInfo::custom(move |raw_instance| {
            assert_eq!(raw_instance, expected_instance);
            0x5EED
        }))
        .unwrap();
    assert_eq!(surface.raw_handle(), 0x5EED);
}

#[test]
fn null_custom_surface_is_rejected() {
    let instance = Instance::new(&InstanceInfo {
        backend: Backend::Mock(MockDriver::new()),
        ..InstanceInfo::default()
    })
    .unwrap();

    let err = instance.create_surface(SurfaceInfo::custom(|_| 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InitializationFailed);

    let err = instance.create_surface(SurfaceInfo::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InitializationFailed);
}

#[test]
fn full_graph_on_default_adapter() {
    let gpu = common::gpu(MockDriver::new());
    assert_eq!(gpu.device.adapter().name, "Mock Adapter");
    assert!(gpu.device.adapter().queue_families.is_shared());

    let scene = common::scene(&gpu.device, 640, 480);
    let swapchain = &scene.swapchain;
    assert_eq!(swapchain.extent(), glam::UVec2::new(640, 480));
    assert_eq!(swapchain.image_count(), 2);
    assert_eq!(swapchain.format(), Format::B8G8R8A8Srgb);
    assert_eq!(swapchain.surface_format().color_space, ColorSpace::SrgbNonlinear);
    assert_eq!(swapchain.present_mode(), PresentMode::Mailbox);
    assert_eq!(swapchain.image_views().len(), 2);
    assert_eq!(scene.frame_buffers.len(), 2);
    assert_eq!(scene.render_pass.color_format(), Format::B8G8R8A8Srgb);
}

#[test]
fn dropping_everything_releases_driver_objects() {
    let driver = MockDriver::new();
    {
        let gpu = common::gpu(driver.clone());
        let _scene = common::scene(&gpu.device, 800, 600);
        assert!(driver.live_objects() > 0);
    }
    assert_eq!(driver.live_objects(), 0);
}

#[test]
fn missing_instance_extension_is_named() {
    let driver = MockDriver::builder()
        .adapter(MockAdapter::default())
        .instance_extensions(["VK_KHR_surface"])
        .build();

    let err = Instance::new(&InstanceInfo {
        backend: Backend::Mock(driver),
        required_extensions: vec!["VK_KHR_surface".to_string(), "VK_KHR_imaginary".to_string()],
        ..InstanceInfo::default()
    })
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExtensionNotPresent);
    assert_eq!(err.message(), "Extension VK_KHR_imaginary not found");
}

#[test]
fn validation_needs_the_layer() {
    let driver = MockDriver::builder()
        .adapter(MockAdapter::default())
        .instance_layers(Vec::<String>::new())
        .build();

    let err = Instance::new(&InstanceInfo {
        backend: Backend::Mock(driver.clone()),
        debug_level: DebugLevel::Warning,
        ..InstanceInfo::default()
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LayerNotPresent);
    assert_eq!(err.message(), "Layer VK_LAYER_KHRONOS_validation not found");

    // Without validation the same driver is fine
    Instance::new(&InstanceInfo {
        backend: Backend::Mock(driver),
        debug_level: DebugLevel::None,
        ..InstanceInfo::default()
    })
    .unwrap();
}

#[test]
fn no_suitable_adapter() {
    let no_swapchain = MockAdapter::new("Headless", AdapterType::Discrete, 16384).with_extensions(Vec::<String>::new());
    let no_present = MockAdapter::new("Compute only", AdapterType::Discrete, 16384).with_queue_families(vec![
        QueueFamilySupport {
            graphics: true,
            present: false,
        },
    ]);
    let driver = MockDriver::builder().adapter(no_swapchain).adapter(no_present).build();

    let instance = Instance::new(&InstanceInfo {
        backend: Backend::Mock(driver),
        ..InstanceInfo::default()
    })
    .unwrap();
    let surface = instance.create_surface(SurfaceInfo::custom(|_| 1)).unwrap();

    let err = instance.create_device(&surface).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InitializationFailed);
}

#[test]
fn discrete_adapter_wins_equal_limits() {
    let driver = MockDriver::builder()
        .adapter(MockAdapter::new("Integrated", AdapterType::Integrated, 8192))
        .adapter(MockAdapter::new("Discrete", AdapterType::Discrete, 8192))
        .build();

    let gpu = common::gpu(driver);
    assert_eq!(gpu.device.adapter().name, "Discrete");
    assert_eq!(gpu.device.adapter().adapter_type, AdapterType::Discrete);
}

#[test]
fn split_queue_families_are_found() {
    let adapter = MockAdapter::default().with_queue_families(vec![
        QueueFamilySupport {
            graphics: true,
            present: false,
        },
        QueueFamilySupport {
            graphics: false,
            present: true,
        },
    ]);
    let gpu = common::gpu(MockDriver::builder().adapter(adapter).build());

    let families = gpu.device.adapter().queue_families;
    assert_eq!((families.graphics, families.present), (0, 1));

    let swapchain = gpu.device.create_swapchain(&SwapChainInfo::new(320, 240)).unwrap();
    assert_eq!(swapchain.sharing_mode(), SharingMode::Concurrent([0, 1]));
}

#[test]
fn failed_image_view_releases_partial_swapchain() {
    let gpu = common::gpu(MockDriver::new());
    let baseline = gpu.driver.live_objects();

    gpu.driver.fail_image_view_creation(1);
    let err = gpu.device.create_swapchain(&SwapChainInfo::new(640, 480)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfDeviceMemory);
    assert_eq!(gpu.driver.live_objects(), baseline);

    // The failure is one-shot
    let swapchain = gpu.device.create_swapchain(&SwapChainInfo::new(640, 480)).unwrap();
    assert_eq!(swapchain.image_views().len(), 2);
}

#[test]
fn requested_extent_is_clamped() {
    let gpu = common::gpu(MockDriver::new());
    let swapchain = gpu.device.create_swapchain(&SwapChainInfo::new(10_000, 0)).unwrap();
    assert_eq!(swapchain.extent(), glam::UVec2::new(4096, 1));
}

#[test]
fn default_instance_needs_only_the_base_surface_extension() {
    let driver = MockDriver::builder()
        .adapter(MockAdapter::default())
        .instance_extensions(["VK_KHR_surface"])
        .build();

    let instance = Instance::new(&InstanceInfo {
        backend: Backend::Mock(driver),
        ..InstanceInfo::default()
    })
    .unwrap();
    assert_eq!(instance.backend(), BackendKind::Mock);
}
