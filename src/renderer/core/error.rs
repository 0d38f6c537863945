use ash::vk;
use thiserror::Error;

/// Unrecoverable failures. These travel inside an `eyre::Report` so callers can
/// `downcast_ref::<FatalError>()` when they care about the cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("No physical device is available")]
    NoPhysicalDevice,

    #[error("No queue family supports {0}")]
    MissingQueueFamily(QueueKind),

    #[error("Surface reports no supported formats")]
    NoSurfaceFormats,

    #[error("Surface reports no supported present modes")]
    NoPresentModes,

    #[error("No memory type matches filter {type_filter:#b} with properties {properties:?}")]
    NoMatchingMemoryType {
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    },

    #[error("Unsupported layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    #[error("Graphics pipeline creation failed: {0}")]
    PipelineCreation(vk::Result),

    #[error("Failed to acquire swapchain image: {0}")]
    AcquireFailed(vk::Result),

    #[error("Failed to present swapchain image: {0}")]
    PresentFailed(vk::Result),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Graphics,
    Present,
    Compute,
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueKind::Graphics => write!(f, "graphics"),
            QueueKind::Present => write!(f, "presentation"),
            QueueKind::Compute => write!(f, "compute"),
        }
    }
}

/// Health of the presentation surface as reported by acquire or present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    Optimal,
    /// Still presentable, but the swapchain should be rebuilt soon
    Suboptimal,
    OutOfDate,
    Lost,
}

impl SurfaceStatus {
    pub fn needs_recreation(self) -> bool {
        !matches!(self, SurfaceStatus::Optimal)
    }
}

/// Why a frame was skipped without drawing. Every variant is recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Acquire reported the swapchain stale; it has been rebuilt
    SwapchainRecreated,
    /// The window has zero area; recreation waits for a non-zero resize
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    Skipped(SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Report;

    #[test]
    fn fatal_error_survives_eyre_wrapping() {
        let report = Report::new(FatalError::MissingQueueFamily(QueueKind::Graphics));
        assert_eq!(
            report.downcast_ref::<FatalError>(),
            Some(&FatalError::MissingQueueFamily(QueueKind::Graphics)),
        );
        assert_eq!(report.to_string(), "No queue family supports graphics");
    }

    #[test]
    fn only_optimal_surface_skips_recreation() {
        assert!(!SurfaceStatus::Optimal.needs_recreation());
        assert!(SurfaceStatus::Suboptimal.needs_recreation());
        assert!(SurfaceStatus::OutOfDate.needs_recreation());
        assert!(SurfaceStatus::Lost.needs_recreation());
    }
}
