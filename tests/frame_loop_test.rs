//! Frame loop pacing, swapchain invalidation and recovery on the mock driver.

mod common;

use std::thread;
use std::time::Duration;

use frame_rhi::{
    CompletionMode, ErrorKind, FrameLoop, MockAdapter, MockDriver, PresentStatus, SwapChainInfo,
};

#[test]
fn draw_frame_presents_and_draws() {
    let gpu = common::gpu(MockDriver::new());
    let scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 2, Some(Duration::from_secs(1))).unwrap();

    for expected_slot in [0, 1, 0, 1, 0] {
        assert_eq!(frames.current_slot(), expected_slot);
        let status = frames
            .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
            .unwrap();
        assert_eq!(status, PresentStatus::Optimal);
    }

    assert_eq!(frames.frames_presented(), 5);
    assert_eq!(gpu.driver.present_count(), 5);
    assert_eq!(gpu.driver.submitted_count(), 5);
    assert_eq!(gpu.driver.draws_completed(), 5);
}

#[test]
fn acquired_images_cycle_through_the_chain() {
    let gpu = common::gpu(MockDriver::new());
    let scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 3, None).unwrap();

    let mut images = Vec::new();
    for _ in 0..4 {
        let frame = frames.begin_frame(&gpu.device, &scene.swapchain).unwrap();
        images.push(frame.image_index());
        let buffer = &scene.command_buffers[frame.image_index() as usize];
        frames.submit(&gpu.device, &frame, &[buffer]).unwrap();
        frames.present(&gpu.device, &scene.swapchain, frame).unwrap();
    }
    assert_eq!(images, [0, 1, 0, 1]);
}

#[test]
fn too_few_command_buffers_is_rejected() {
    let gpu = common::gpu(MockDriver::new());
    let scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 2, None).unwrap();

    let err = frames
        .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers[..1])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(gpu.driver.present_count(), 0);
}

#[test]
fn zero_frames_in_flight_is_rejected() {
    let gpu = common::gpu(MockDriver::new());
    let err = FrameLoop::new(&gpu.device, 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[test]
fn cpu_blocks_when_every_frame_is_in_flight() {
    let driver = MockDriver::builder()
        .adapter(MockAdapter::default())
        .completion(CompletionMode::Manual)
        .build();
    let gpu = common::gpu(driver);
    let scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 2, Some(Duration::from_millis(20))).unwrap();

    for _ in 0..2 {
        frames
            .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
            .unwrap();
    }
    assert_eq!(gpu.driver.pending_submissions(), 2);

    // Slot 0 is still on the GPU
    let err = frames.begin_frame(&gpu.device, &scene.swapchain).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(frames.current_slot(), 0);

    let driver = gpu.driver.clone();
    let retire = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        assert!(driver.retire_next());
    });

    frames.set_fence_timeout(Some(Duration::from_secs(5)));
    let status = frames
        .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
        .unwrap();
    assert_eq!(status, PresentStatus::Optimal);
    retire.join().unwrap();

    assert_eq!(gpu.driver.completed_count(), 1);
    assert_eq!(gpu.driver.pending_submissions(), 2);

    gpu.device.wait_idle().unwrap();
    assert_eq!(gpu.driver.pending_submissions(), 0);
    frames.wait_all().unwrap();
}

#[test]
fn stale_swapchain_is_recreated() {
    let gpu = common::gpu(MockDriver::new());
    let mut scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 2, Some(Duration::from_secs(1))).unwrap();

    frames
        .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
        .unwrap();

    gpu.driver.invalidate_swapchains();
    let err = frames
        .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SwapchainOutOfDate);

    // The failed acquire must not leave its slot waiting forever
    gpu.device.wait_idle().unwrap();
    scene = common::scene(&gpu.device, 800, 600);
    for _ in 0..4 {
        frames
            .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
            .unwrap();
    }
    assert_eq!(gpu.driver.present_count(), 5);
}

#[test]
fn stale_swapchain_at_present_keeps_the_loop_usable() {
    let gpu = common::gpu(MockDriver::new());
    let mut scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 2, Some(Duration::from_secs(1))).unwrap();

    let frame = frames.begin_frame(&gpu.device, &scene.swapchain).unwrap();
    let buffer = &scene.command_buffers[frame.image_index() as usize];
    frames.submit(&gpu.device, &frame, &[buffer]).unwrap();

    gpu.driver.invalidate_swapchains();
    let err = frames.present(&gpu.device, &scene.swapchain, frame).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SwapchainOutOfDate);
    assert_eq!(frames.current_slot(), 1);

    gpu.device.wait_idle().unwrap();
    scene = common::scene(&gpu.device, 640, 480);
    for _ in 0..3 {
        frames
            .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
            .unwrap();
    }
}

#[test]
fn suboptimal_present_is_reported() {
    let gpu = common::gpu(MockDriver::new());
    let scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 2, None).unwrap();

    gpu.driver.set_suboptimal(true);
    let frame = frames.begin_frame(&gpu.device, &scene.swapchain).unwrap();
    assert!(frame.is_suboptimal());
    let buffer = &scene.command_buffers[frame.image_index() as usize];
    frames.submit(&gpu.device, &frame, &[buffer]).unwrap();
    assert_eq!(
        frames.present(&gpu.device, &scene.swapchain, frame).unwrap(),
        PresentStatus::Suboptimal
    );

    gpu.driver.set_suboptimal(false);
    let status = frames
        .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
        .unwrap();
    assert_eq!(status, PresentStatus::Optimal);
}

#[test]
fn new_swapchain_after_resize_has_new_extent() {
    let gpu = common::gpu(MockDriver::new());
    let first = gpu.device.create_swapchain(&SwapChainInfo::new(640, 480)).unwrap();
    gpu.driver.invalidate_swapchains();
    drop(first);

    let second = gpu.device.create_swapchain(&SwapChainInfo::new(1024, 768)).unwrap();
    assert_eq!(second.extent(), glam::UVec2::new(1024, 768));
}

#[test]
fn failed_submit_leaves_the_slot_usable() {
    let gpu = common::gpu(MockDriver::new());
    let scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 1, Some(Duration::from_secs(1))).unwrap();

    let unrecorded = scene.pool.allocate_command_buffer().unwrap();
    let frame = frames.begin_frame(&gpu.device, &scene.swapchain).unwrap();
    let err = frames.submit(&gpu.device, &frame, &[&unrecorded]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(frames.current_slot(), 0);

    for _ in 0..3 {
        let status = frames
            .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
            .unwrap();
        assert_eq!(status, PresentStatus::Optimal);
    }
    assert_eq!(gpu.driver.present_count(), 3);
    assert_eq!(frames.frames_presented(), 3);
}

#[test]
fn acquire_times_out_while_images_are_withheld() {
    let gpu = common::gpu(MockDriver::new());
    let scene = common::scene(&gpu.device, 640, 480);
    let mut frames = FrameLoop::new(&gpu.device, 2, Some(Duration::from_millis(20))).unwrap();

    gpu.driver.withhold_images(true);
    let err = scene
        .swapchain
        .acquire_next_image(None, None, Some(Duration::ZERO))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let err = frames.begin_frame(&gpu.device, &scene.swapchain).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(frames.current_slot(), 0);

    gpu.driver.withhold_images(false);
    for _ in 0..3 {
        frames
            .draw_frame(&gpu.device, &scene.swapchain, &scene.command_buffers)
            .unwrap();
    }
    assert_eq!(gpu.driver.present_count(), 3);
}
