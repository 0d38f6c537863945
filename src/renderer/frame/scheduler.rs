use color_eyre::Result;
use crate::renderer::core::error::SurfaceStatus;
use crate::renderer::frame::cursor::{Acquired, FrameCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// What happened to one pass through the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReport {
    /// The frame reached the presentation engine. A non-optimal status asks for a rebuild
    /// before the next frame.
    Presented(SurfaceStatus),
    /// Acquire found the swapchain unusable; nothing was recorded or submitted.
    Stale(SurfaceStatus),
}

/// The device-facing steps of one frame, addressed by slot index
pub trait FrameOps {
    /// Block until the slot's previous submission has finished
    fn wait_for_slot(&mut self, slot: usize);

    fn acquire(&mut self, slot: usize) -> Result<Acquired>;

    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    fn record(&mut self, slot: usize, image_index: u32) -> Result<()>;

    fn update_uniforms(&mut self, slot: usize) -> Result<()>;

    fn submit(&mut self, slot: usize) -> Result<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<SurfaceStatus>;
}

/// Drives frames through acquire, record, submit and present over a fixed set of slots
#[derive(Debug)]
pub struct FrameScheduler {
    cursor: FrameCursor,
    state: FrameState,
}

impl FrameScheduler {
    pub fn new(flight_count: usize) -> Self {
        Self {
            cursor: FrameCursor::new(flight_count),
            state: FrameState::Idle,
        }
    }

    pub fn current_slot(&self) -> usize {
        self.cursor.current()
    }

    pub fn flight_count(&self) -> usize {
        self.cursor.flight_count()
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn run_frame(&mut self, ops: &mut impl FrameOps) -> Result<FrameReport> {
        let result = self.step(ops);
        self.transition(FrameState::Idle);
        result
    }

    fn step(&mut self, ops: &mut impl FrameOps) -> Result<FrameReport> {
        let slot = self.cursor.current();

        self.transition(FrameState::Acquiring);
        ops.wait_for_slot(slot);

        let (image_index, acquire_status) = match ops.acquire(slot)? {
            Acquired::Image(index, status) => (index, status),
            Acquired::Stale(status) => {
                // The fence stays signalled, so the next attempt on this slot does not block
                log::debug!("Acquire reported {:?} on slot {}, skipping frame", status, slot);
                return Ok(FrameReport::Stale(status));
            }
        };
        ops.reset_slot(slot)?;

        self.transition(FrameState::Recording);
        ops.record(slot, image_index)?;
        ops.update_uniforms(slot)?;

        self.transition(FrameState::Submitted);
        ops.submit(slot)?;

        self.transition(FrameState::Presenting);
        let present_status = ops.present(slot, image_index)?;

        self.cursor.advance();

        let status = if present_status.needs_recreation() {
            present_status
        } else {
            acquire_status
        };
        Ok(FrameReport::Presented(status))
    }

    fn transition(&mut self, next: FrameState) {
        log::trace!("Frame slot {}: {:?} -> {:?}", self.cursor.current(), self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::eyre;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Reset(usize),
        Record(usize, u32),
        Uniforms(usize),
        Submit(usize),
        Present(usize, u32),
    }

    /// Pretends to be a device, handing out images round-robin and tracking slot ownership
    struct FakeDevice {
        calls: Vec<Call>,
        image_count: u32,
        next_image: u32,
        // Scripted acquire results; `None` stands for a fatal driver error
        acquire_results: Vec<Option<Acquired>>,
        present_status: SurfaceStatus,
        // Per slot: submitted and not yet waited on
        in_flight: Vec<bool>,
    }

    impl FakeDevice {
        fn new(flight_count: usize, image_count: u32) -> Self {
            Self {
                calls: Vec::new(),
                image_count,
                next_image: 0,
                acquire_results: Vec::new(),
                present_status: SurfaceStatus::Optimal,
                in_flight: vec![false; flight_count],
            }
        }

        fn draws(&self) -> usize {
            self.calls.iter().filter(|c| matches!(c, Call::Record(..))).count()
        }
    }

    impl FrameOps for FakeDevice {
        fn wait_for_slot(&mut self, slot: usize) {
            self.calls.push(Call::Wait(slot));
            self.in_flight[slot] = false;
        }

        fn acquire(&mut self, slot: usize) -> Result<Acquired> {
            self.calls.push(Call::Acquire(slot));
            if !self.acquire_results.is_empty() {
                return self.acquire_results.remove(0).ok_or_else(|| eyre!("device lost"));
            }
            let index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(Acquired::Image(index, SurfaceStatus::Optimal))
        }

        fn reset_slot(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Reset(slot));
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> Result<()> {
            assert!(!self.in_flight[slot], "slot {} recorded while still in flight", slot);
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn update_uniforms(&mut self, slot: usize) -> Result<()> {
            assert!(!self.in_flight[slot], "slot {} uniforms written while in flight", slot);
            self.calls.push(Call::Uniforms(slot));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> Result<()> {
            assert!(!self.in_flight[slot], "slot {} submitted twice without a wait", slot);
            self.in_flight[slot] = true;
            self.calls.push(Call::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> Result<SurfaceStatus> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.present_status)
        }
    }

    #[test]
    fn frame_runs_steps_in_order() {
        let mut scheduler = FrameScheduler::new(2);
        let mut device = FakeDevice::new(2, 3);

        let report = scheduler.run_frame(&mut device).unwrap();

        assert_eq!(report, FrameReport::Presented(SurfaceStatus::Optimal));
        assert_eq!(
            device.calls,
            [
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Uniforms(0),
                Call::Submit(0),
                Call::Present(0, 0),
            ],
        );
        assert_eq!(scheduler.current_slot(), 1);
        assert_eq!(scheduler.state(), FrameState::Idle);
    }

    #[test]
    fn slots_are_never_reused_while_in_flight() {
        let mut scheduler = FrameScheduler::new(2);
        let mut device = FakeDevice::new(2, 3);

        for _ in 0..10 {
            scheduler.run_frame(&mut device).unwrap();
        }

        let submitted_slots = device.calls
            .iter()
            .filter_map(|c| match c {
                Call::Submit(slot) => Some(*slot),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(submitted_slots, [0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(device.draws(), 10);
    }

    #[test]
    fn out_of_date_acquire_skips_the_frame() {
        let mut scheduler = FrameScheduler::new(2);
        let mut device = FakeDevice::new(2, 3);
        scheduler.run_frame(&mut device).unwrap();
        device.calls.clear();

        device.acquire_results.push(Some(Acquired::Stale(SurfaceStatus::OutOfDate)));
        let report = scheduler.run_frame(&mut device).unwrap();

        assert_eq!(report, FrameReport::Stale(SurfaceStatus::OutOfDate));
        assert_eq!(device.calls, [Call::Wait(1), Call::Acquire(1)]);
        assert_eq!(device.draws(), 0);
        assert_eq!(scheduler.current_slot(), 1);
        assert_eq!(scheduler.state(), FrameState::Idle);
    }

    #[test]
    fn suboptimal_acquire_still_draws() {
        let mut scheduler = FrameScheduler::new(1);
        let mut device = FakeDevice::new(1, 2);
        device.acquire_results.push(Some(Acquired::Image(1, SurfaceStatus::Suboptimal)));

        let report = scheduler.run_frame(&mut device).unwrap();

        assert_eq!(report, FrameReport::Presented(SurfaceStatus::Suboptimal));
        assert_eq!(device.draws(), 1);
    }

    #[test]
    fn stale_present_is_reported_for_next_frame() {
        let mut scheduler = FrameScheduler::new(2);
        let mut device = FakeDevice::new(2, 2);
        device.present_status = SurfaceStatus::OutOfDate;

        let report = scheduler.run_frame(&mut device).unwrap();

        assert_eq!(report, FrameReport::Presented(SurfaceStatus::OutOfDate));
        assert_eq!(scheduler.current_slot(), 1);
    }

    #[test]
    fn fatal_acquire_returns_to_idle() {
        let mut scheduler = FrameScheduler::new(2);
        let mut device = FakeDevice::new(2, 2);
        device.acquire_results.push(None);

        assert!(scheduler.run_frame(&mut device).is_err());
        assert_eq!(scheduler.state(), FrameState::Idle);
        assert_eq!(scheduler.current_slot(), 0);
        assert_eq!(device.draws(), 0);
    }
}
