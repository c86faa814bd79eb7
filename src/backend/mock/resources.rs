// Simulated GPU resources: pipeline state, command recording, sync objects

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{LiveToken, MockDriver};
use crate::command::{BeginRenderPassInfo, DrawInfo};
use crate::error::{Error, ErrorKind, Result};
use crate::handle::assert_fits;
use crate::handle::{COMMAND_BUFFER_CAPACITY, FENCE_CAPACITY, SEMAPHORE_CAPACITY};
use crate::pipeline::Pipeline;
use crate::sync::FenceStatus;

/// Driver objects with no behavior beyond being alive.
macro_rules! mock_object {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug)]
            pub(crate) struct $name {
                _live: LiveToken,
            }

            impl $name {
                pub(crate) fn new(driver: &MockDriver) -> Self {
                    Self {
                        _live: driver.track(),
                    }
                }
            }
        )*
    };
}

mock_object!(MockShader, MockRenderPass, MockPipeline, MockFrameBuffer);

#[derive(Debug)]
pub(crate) struct MockCommandPool {
    driver: MockDriver,
    _live: LiveToken,
}

impl MockCommandPool {
    pub(crate) fn new(driver: &MockDriver, resettable: bool) -> Self {
        log::debug!("[mock] command pool (resettable: {})", resettable);
        Self {
            driver: driver.clone(),
            _live: driver.track(),
        }
    }

    pub(crate) fn allocate(&self) -> MockCommandBuffer {
        MockCommandBuffer {
            commands: Vec::new(),
            _live: self.driver.track(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockCommand {
    BeginRenderPass,
    EndRenderPass,
    BindPipeline,
    Draw,
}

#[derive(Debug)]
pub(crate) struct MockCommandBuffer {
    commands: Vec<MockCommand>,
    _live: LiveToken,
}

assert_fits!(MockCommandBuffer, COMMAND_BUFFER_CAPACITY);

impl MockCommandBuffer {
    pub(crate) fn begin(&mut self) {
        self.commands.clear();
    }

    pub(crate) fn end(&mut self) -> Result<()> {
        log::trace!("[mock] recorded {} commands", self.commands.len());
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.commands.clear();
    }

    pub(crate) fn begin_render_pass(&mut self, info: &BeginRenderPassInfo<'_>) {
        info.render_pass.inner().mock();
        info.frame_buffer.inner().mock();
        self.commands.push(MockCommand::BeginRenderPass);
    }

    pub(crate) fn end_render_pass(&mut self) {
        self.commands.push(MockCommand::EndRenderPass);
    }

    pub(crate) fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        pipeline.inner().mock();
        self.commands.push(MockCommand::BindPipeline);
    }

    pub(crate) fn draw(&mut self, info: &DrawInfo) {
        log::trace!(
            "[mock] draw {} vertices from {}",
            info.vertex_count,
            info.first_vertex
        );
        self.commands.push(MockCommand::Draw);
    }

    pub(crate) fn draw_count(&self) -> u64 {
        self.commands
            .iter()
            .filter(|command| **command == MockCommand::Draw)
            .count() as u64
    }
}

/// Binary semaphore: at most one pending signal, consumed by one wait.
#[derive(Debug)]
pub(crate) struct MockSemaphore {
    pending: AtomicBool,
    _live: LiveToken,
}

assert_fits!(MockSemaphore, SEMAPHORE_CAPACITY);

impl MockSemaphore {
    pub(crate) fn new(driver: &MockDriver) -> Self {
        Self {
            pending: AtomicBool::new(false),
            _live: driver.track(),
        }
    }

    pub(crate) fn signal(&self) -> Result<()> {
        if self.pending.swap(true, Ordering::SeqCst) {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                "Semaphore signaled again before its previous signal was waited on",
            ));
        }
        Ok(())
    }

    pub(crate) fn consume(&self) -> Result<()> {
        if !self.pending.swap(false, Ordering::SeqCst) {
            return Err(Error::new(
                ErrorKind::ValidationFailed,
                "Wait on a semaphore that has no pending signal",
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct FenceState {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl FenceState {
    fn new(signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(signaled),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    pub(crate) fn signal(&self) {
        *self.signaled.lock() = true;
        self.cond.notify_all();
    }

    fn reset(&self) {
        *self.signaled.lock() = false;
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut signaled = self.signaled.lock();

        while !*signaled {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut signaled, deadline).timed_out() && !*signaled {
                        return Err(Error::new(
                            ErrorKind::Timeout,
                            format!("Fence not signaled within {:?}", timeout.unwrap_or_default()),
                        ));
                    }
                }
                None => self.cond.wait(&mut signaled),
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct MockFence {
    state: Arc<FenceState>,
    _live: LiveToken,
}

assert_fits!(MockFence, FENCE_CAPACITY);

impl MockFence {
    pub(crate) fn new(driver: &MockDriver, signaled: bool) -> Self {
        Self {
            state: Arc::new(FenceState::new(signaled)),
            _live: driver.track(),
        }
    }

    pub(crate) fn state(&self) -> &FenceState {
        &self.state
    }

    pub(crate) fn shared_state(&self) -> Arc<FenceState> {
        Arc::clone(&self.state)
    }

    pub(crate) fn status(&self) -> FenceStatus {
        if self.state.is_signaled() {
            FenceStatus::Signaled
        } else {
            FenceStatus::Unsignaled
        }
    }

    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        self.state.wait(timeout)
    }

    pub(crate) fn reset(&self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fence_wait_times_out_then_succeeds_after_signal() {
        let driver = MockDriver::new();
        let fence = MockFence::new(&driver, false);

        let err = fence.wait(Some(Duration::from_millis(10))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(fence.status(), FenceStatus::Unsignaled);

        let state = fence.shared_state();
        let signaler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            state.signal();
        });
        fence.wait(Some(Duration::from_secs(5))).unwrap();
        signaler.join().unwrap();
        assert_eq!(fence.status(), FenceStatus::Signaled);

        fence.reset();
        assert_eq!(fence.status(), FenceStatus::Unsignaled);
    }

    #[test]
    fn zero_timeout_polls() {
        let driver = MockDriver::new();
        let signaled = MockFence::new(&driver, true);
        assert!(signaled.wait(Some(Duration::ZERO)).is_ok());

        let unsignaled = MockFence::new(&driver, false);
        assert!(unsignaled.wait(Some(Duration::ZERO)).is_err());
    }

    #[test]
    fn semaphore_signals_pair_with_waits() {
        let driver = MockDriver::new();
        let semaphore = MockSemaphore::new(&driver);

        assert_eq!(semaphore.consume().unwrap_err().kind(), ErrorKind::ValidationFailed);
        semaphore.signal().unwrap();
        assert_eq!(semaphore.signal().unwrap_err().kind(), ErrorKind::ValidationFailed);
        semaphore.consume().unwrap();
    }
}
