// Frame loop - pipelined acquire/submit/present
//
// Each frame slot owns an in-flight fence plus image-available and
// render-finished semaphores. Before a slot is reused its fence is waited on,
// so the CPU never runs more than `frames_in_flight` frames ahead of the GPU.

use std::time::Duration;

use crate::command::CommandBuffer;
use crate::device::{Device, PresentInfo, PresentStatus, SubmitInfo};
use crate::error::{Error, ErrorKind, Result};
use crate::swapchain::SwapChain;
use crate::sync::{Fence, Semaphore};

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Sync objects for one frame slot.
#[derive(Debug)]
pub struct FrameSync {
    pub image_available: Semaphore,
    pub render_finished: Semaphore,
    pub in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: &Device) -> Result<Self> {
        Ok(Self {
            image_available: device.create_semaphore()?,
            render_finished: device.create_semaphore()?,
            // Start signaled so the first use of the slot does not block
            in_flight: device.create_fence(true)?,
        })
    }
}

/// A frame between `begin_frame` and `present`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an acquired frame must be submitted and presented"]
pub struct Frame {
    slot: usize,
    image_index: u32,
    suboptimal: bool,
}

impl Frame {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Swapchain image to render into. Unrelated to the slot index.
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn is_suboptimal(&self) -> bool {
        self.suboptimal
    }
}

#[derive(Debug)]
pub struct FrameLoop {
    frames: Vec<FrameSync>,
    current: usize,
    fence_timeout: Option<Duration>,
    presented: u64,
}

impl FrameLoop {
    /// `fence_timeout` bounds every wait on an in-flight fence; `None`
    /// waits forever.
    pub fn new(device: &Device, frames_in_flight: usize, fence_timeout: Option<Duration>) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                "Frame loop needs at least one frame in flight",
            ));
        }

        let frames = (0..frames_in_flight)
            .map(|_| FrameSync::new(device))
            .collect::<Result<Vec<_>>>()?;

        log::info!("Frame loop with {} frames in flight", frames_in_flight);
        Ok(Self {
            frames,
            current: 0,
            fence_timeout,
            presented: 0,
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Slot the next `begin_frame` will use.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn slot(&self, index: usize) -> Option<&FrameSync> {
        self.frames.get(index)
    }

    pub fn fence_timeout(&self) -> Option<Duration> {
        self.fence_timeout
    }

    pub fn set_fence_timeout(&mut self, timeout: Option<Duration>) {
        self.fence_timeout = timeout;
    }

    /// Frames handed to presentation so far.
    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    /// Wait for the slot's previous frame, reset its fence, acquire an image.
    ///
    /// A timed-out wait fails with `Timeout` and leaves the loop untouched.
    pub fn begin_frame(&mut self, device: &Device, swapchain: &SwapChain) -> Result<Frame> {
        let slot = self.current;
        let sync = &self.frames[slot];

        sync.in_flight.wait(self.fence_timeout)?;
        sync.in_flight.reset()?;

        let acquired = swapchain.acquire_next_image(Some(&sync.image_available), None, self.fence_timeout);
        match acquired {
            Ok(image) => Ok(Frame {
                slot,
                image_index: image.index,
                suboptimal: image.suboptimal,
            }),
            Err(err) => {
                // Nothing will signal the reset fence now
                self.reset_slot(device, slot)?;
                Err(err)
            }
        }
    }

    /// Submit `command_buffers` for `frame`, waiting on image availability
    /// and signaling render completion plus the slot's fence.
    pub fn submit(&mut self, device: &Device, frame: &Frame, command_buffers: &[&CommandBuffer]) -> Result<()> {
        let sync = &self.frames[frame.slot];
        let submitted = device.submit(
            &SubmitInfo {
                wait_semaphores: &[&sync.image_available],
                signal_semaphores: &[&sync.render_finished],
                command_buffers,
            },
            Some(&sync.in_flight),
        );

        // The acquire already signaled image_available and no submission
        // will wait on it, so the slot gets fresh sync objects.
        if submitted.is_err() {
            self.reset_slot(device, frame.slot)?;
        }
        submitted
    }

    /// Present `frame` once rendering finished and move to the next slot.
    pub fn present(&mut self, device: &Device, swapchain: &SwapChain, frame: Frame) -> Result<PresentStatus> {
        let sync = &self.frames[frame.slot];
        let status = device.present(&PresentInfo {
            wait_semaphores: &[&sync.render_finished],
            swapchains: &[swapchain],
            image_index: frame.image_index,
        });

        // The submission is in flight either way
        self.current = (self.current + 1) % self.frames.len();
        self.presented += 1;
        status
    }

    /// One full frame using a command buffer pre-recorded per swapchain image.
    pub fn draw_frame(
        &mut self,
        device: &Device,
        swapchain: &SwapChain,
        command_buffers: &[CommandBuffer],
    ) -> Result<PresentStatus> {
        if command_buffers.len() < swapchain.image_count() as usize {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                format!(
                    "{} command buffers for {} swapchain images",
                    command_buffers.len(),
                    swapchain.image_count()
                ),
            ));
        }

        let frame = self.begin_frame(device, swapchain)?;
        let buffer = &command_buffers[frame.image_index() as usize];
        self.submit(device, &frame, &[buffer])?;
        self.present(device, swapchain, frame)
    }

    /// Wait for every in-flight frame, e.g. before tearing down resources.
    pub fn wait_all(&self) -> Result<()> {
        for sync in &self.frames {
            sync.in_flight.wait(self.fence_timeout)?;
        }
        Ok(())
    }

    /// Replace a slot's semaphores and fence after a frame was abandoned
    /// half way. The new fence starts signaled.
    fn reset_slot(&mut self, device: &Device, slot: usize) -> Result<()> {
        log::debug!("Resetting sync objects of frame slot {}", slot);
        self.frames[slot] = FrameSync::new(device)?;
        Ok(())
    }
}
