use ash::vk;
use color_eyre::Result;
use crate::renderer::core::error::{FatalError, QueueKind, SkipReason, SurfaceStatus};
use crate::renderer::frame::cursor::{ResizeDecision, ResizeGate};

/// `None` when either dimension is zero
pub fn usable_extent(extent: vk::Extent2D) -> Option<vk::Extent2D> {
    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// The device-facing steps of rebuilding everything that depends on the swapchain.
/// Frame synchronization objects are not part of it and survive every rebuild.
pub trait RebuildOps {
    /// Current drawable size reported by the platform
    fn drawable_size(&self) -> vk::Extent2D;

    /// Extent of the live swapchain, if there is one
    fn current_extent(&self) -> Option<vk::Extent2D>;

    fn wait_idle(&mut self) -> Result<()>;

    fn free_command_buffers(&mut self);

    fn release_framebuffers(&mut self);

    fn destroy_pipeline(&mut self);

    /// Drop the swapchain and create a new surface. Returns whether the present
    /// queue family can still present to it.
    fn reacquire_surface(&mut self) -> Result<bool>;

    /// Build a new swapchain at `extent`, handing the old one over when `chain_old` is set
    fn create_swapchain(&mut self, extent: vk::Extent2D, chain_old: bool) -> Result<()>;

    fn create_pipeline(&mut self) -> Result<()>;

    fn init_framebuffers(&mut self) -> Result<()>;

    fn allocate_command_buffers(&mut self) -> Result<()>;
}

/// Decides when the swapchain has to be rebuilt and runs the rebuild in a fixed order
#[derive(Debug, Clone, Copy, Default)]
pub struct Recreation {
    resize: ResizeGate,
    surface_lost: bool,
}

impl Recreation {
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        self.resize.notify(width, height);
    }

    /// Called before a frame is scheduled. `Some` means the frame must be skipped.
    pub fn before_frame(&mut self, ops: &mut impl RebuildOps) -> Result<Option<SkipReason>> {
        match self.resize.poll(ops.current_extent()) {
            ResizeDecision::Unchanged => Ok(None),
            ResizeDecision::Wait => Ok(Some(SkipReason::Minimized)),
            ResizeDecision::Recreate(extent) => {
                if self.rebuild(extent, ops)? {
                    Ok(None)
                } else {
                    Ok(Some(SkipReason::Minimized))
                }
            }
        }
    }

    /// A presented frame reported a surface that should be rebuilt before the next one
    pub fn after_present(&mut self, status: SurfaceStatus) {
        if status.needs_recreation() {
            log::debug!("Present reported {:?}, rebuilding before next frame", status);
            self.schedule(status);
        }
    }

    /// Acquire found the swapchain unusable. Rebuilds right away unless the window has no area.
    pub fn after_stale(
        &mut self,
        status: SurfaceStatus,
        ops: &mut impl RebuildOps,
    ) -> Result<SkipReason> {
        self.schedule(status);
        if let ResizeDecision::Recreate(extent) = self.resize.poll(ops.current_extent()) {
            if self.rebuild(extent, ops)? {
                return Ok(SkipReason::SwapchainRecreated);
            }
        }
        Ok(SkipReason::Minimized)
    }

    /// Rebuild using `hint`, or the platform's drawable size when `hint` has no area.
    /// Returns `false` without touching anything while the drawable area is zero.
    pub fn rebuild(&mut self, hint: vk::Extent2D, ops: &mut impl RebuildOps) -> Result<bool> {
        let Some(extent) = usable_extent(hint).or_else(|| usable_extent(ops.drawable_size())) else {
            log::debug!("Drawable area is zero, deferring swapchain rebuild");
            self.resize.request();
            return Ok(false);
        };

        ops.wait_idle()?;

        // Release everything that references the old extent or format
        ops.free_command_buffers();
        ops.release_framebuffers();
        ops.destroy_pipeline();

        let chain_old = if self.surface_lost {
            // Nothing built on the lost surface may outlive it
            if !ops.reacquire_surface()? {
                return Err(FatalError::MissingQueueFamily(QueueKind::Present).into());
            }
            self.surface_lost = false;
            false
        } else {
            true
        };

        ops.create_swapchain(extent, chain_old)?;
        ops.create_pipeline()?;
        ops.init_framebuffers()?;
        ops.allocate_command_buffers()?;

        log::info!("Swapchain rebuilt at {}x{}", extent.width, extent.height);
        Ok(true)
    }

    fn schedule(&mut self, status: SurfaceStatus) {
        if status == SurfaceStatus::Lost {
            self.surface_lost = true;
        }
        self.resize.request();
    }
}
