use ash::prelude::VkResult;
use ash::vk;
use crate::renderer::core::error::{FatalError, SurfaceStatus};

/// Frames in flight never exceed the number of swapchain images, and there is always at least one
pub fn resolve_flight_count(requested: usize, image_count: usize) -> usize {
    requested.min(image_count).max(1)
}

/// Round-robin index over frame slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
    flight_count: usize,
}

impl FrameCursor {
    pub fn new(flight_count: usize) -> Self {
        Self {
            current: 0,
            flight_count: flight_count.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn flight_count(&self) -> usize {
        self.flight_count
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.flight_count;
    }
}

/// Result of asking the swapchain for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// An image to draw into; `Suboptimal` still draws but schedules a rebuild
    Image(u32, SurfaceStatus),
    /// Nothing was acquired; the swapchain must be rebuilt first
    Stale(SurfaceStatus),
}

pub fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<Acquired, FatalError> {
    match result {
        Ok((index, false)) => Ok(Acquired::Image(index, SurfaceStatus::Optimal)),
        Ok((index, true)) => Ok(Acquired::Image(index, SurfaceStatus::Suboptimal)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::Stale(SurfaceStatus::OutOfDate)),
        Err(vk::Result::ERROR_SURFACE_LOST_KHR) => Ok(Acquired::Stale(SurfaceStatus::Lost)),
        Err(e) => Err(FatalError::AcquireFailed(e)),
    }
}

pub fn classify_present(result: VkResult<bool>) -> Result<SurfaceStatus, FatalError> {
    match result {
        Ok(false) => Ok(SurfaceStatus::Optimal),
        Ok(true) => Ok(SurfaceStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::OutOfDate),
        Err(vk::Result::ERROR_SURFACE_LOST_KHR) => Ok(SurfaceStatus::Lost),
        Err(e) => Err(FatalError::PresentFailed(e)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDecision {
    /// No resize since the last rebuild
    Unchanged,
    /// The window has no area; keep skipping frames
    Wait,
    Recreate(vk::Extent2D),
}

/// Collects resize notifications between frames.
/// A zero-area size holds recreation back until a usable size is reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeGate {
    latest: Option<vk::Extent2D>,
    pending: bool,
    // Set when the surface itself asked for a rebuild, regardless of size
    forced: bool,
}

impl ResizeGate {
    pub fn notify(&mut self, width: u32, height: u32) {
        self.latest = Some(vk::Extent2D { width, height });
        self.pending = true;
    }

    /// Force a rebuild on the next poll, keeping the last notified size
    pub fn request(&mut self) {
        self.pending = true;
        self.forced = true;
    }

    pub fn is_minimized(&self) -> bool {
        self.latest.is_some_and(|e| e.width == 0 || e.height == 0)
    }

    /// `current` is the extent of the live swapchain. A notification that matches it
    /// does not cause a rebuild unless one was requested.
    pub fn poll(&mut self, current: Option<vk::Extent2D>) -> ResizeDecision {
        if !self.pending {
            return ResizeDecision::Unchanged;
        }
        if self.is_minimized() {
            return ResizeDecision::Wait;
        }
        self.pending = false;
        let forced = std::mem::take(&mut self.forced);
        let extent = self.latest.unwrap_or_default();
        if !forced && current == Some(extent) {
            return ResizeDecision::Unchanged;
        }
        ResizeDecision::Recreate(extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flight_count_is_capped_by_image_count() {
        assert_eq!(resolve_flight_count(5, 3), 3);
        assert_eq!(resolve_flight_count(2, 3), 2);
        assert_eq!(resolve_flight_count(0, 3), 1);
        assert_eq!(resolve_flight_count(2, 0), 1);
    }

    #[test]
    fn cursor_wraps_around_flight_count() {
        let mut cursor = FrameCursor::new(3);
        let visited = (0..7)
            .map(|_| {
                let current = cursor.current();
                cursor.advance();
                current
            })
            .collect::<Vec<_>>();
        assert_eq!(visited, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn acquire_results_are_classified() {
        assert_eq!(classify_acquire(Ok((2, false))), Ok(Acquired::Image(2, SurfaceStatus::Optimal)));
        assert_eq!(classify_acquire(Ok((0, true))), Ok(Acquired::Image(0, SurfaceStatus::Suboptimal)));
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            Ok(Acquired::Stale(SurfaceStatus::OutOfDate)),
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Ok(Acquired::Stale(SurfaceStatus::Lost)),
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(FatalError::AcquireFailed(vk::Result::ERROR_DEVICE_LOST)),
        );
    }

    #[test]
    fn present_results_are_classified() {
        assert_eq!(classify_present(Ok(false)), Ok(SurfaceStatus::Optimal));
        assert_eq!(classify_present(Ok(true)), Ok(SurfaceStatus::Suboptimal));
        assert_eq!(classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)), Ok(SurfaceStatus::OutOfDate));
        assert_eq!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)), Ok(SurfaceStatus::Lost));
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY)),
            Err(FatalError::PresentFailed(vk::Result::ERROR_OUT_OF_HOST_MEMORY)),
        );
    }

    #[test]
    fn zero_area_resize_waits_for_usable_size() {
        let current = Some(vk::Extent2D { width: 640, height: 480 });
        let mut gate = ResizeGate::default();
        assert_eq!(gate.poll(current), ResizeDecision::Unchanged);

        gate.notify(0, 0);
        assert!(gate.is_minimized());
        assert_eq!(gate.poll(current), ResizeDecision::Wait);
        assert_eq!(gate.poll(current), ResizeDecision::Wait);

        gate.notify(800, 600);
        assert_eq!(gate.poll(current), ResizeDecision::Recreate(vk::Extent2D { width: 800, height: 600 }));
        assert_eq!(gate.poll(current), ResizeDecision::Unchanged);
    }

    #[test]
    fn one_zero_dimension_is_enough_to_wait() {
        let mut gate = ResizeGate::default();
        gate.notify(1024, 0);
        assert_eq!(gate.poll(None), ResizeDecision::Wait);
    }

    #[test]
    fn resize_to_current_extent_is_ignored() {
        let current = vk::Extent2D { width: 800, height: 600 };
        let mut gate = ResizeGate::default();

        gate.notify(800, 600);
        assert_eq!(gate.poll(Some(current)), ResizeDecision::Unchanged);
        assert_eq!(gate.poll(Some(current)), ResizeDecision::Unchanged);
    }

    #[test]
    fn requested_rebuild_ignores_matching_extent() {
        let current = vk::Extent2D { width: 640, height: 480 };
        let mut gate = ResizeGate::default();
        gate.notify(640, 480);
        assert_eq!(gate.poll(Some(current)), ResizeDecision::Unchanged);

        gate.request();
        assert_eq!(gate.poll(Some(current)), ResizeDecision::Recreate(current));
        assert_eq!(gate.poll(Some(current)), ResizeDecision::Unchanged);
    }

    #[test]
    fn requested_rebuild_without_notification_uses_zero_hint() {
        let mut gate = ResizeGate::default();
        gate.request();
        assert_eq!(gate.poll(None), ResizeDecision::Recreate(vk::Extent2D::default()));
    }
}
