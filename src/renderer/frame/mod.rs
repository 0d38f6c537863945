/// Per-frame state: slots cycled round-robin, the state machine that drives them,
/// swapchain recreation, and their Vulkan implementations.

pub mod cursor;
pub mod rebuilder;
pub mod recorder;
pub mod recreate;
pub mod scheduler;
pub mod slot;
