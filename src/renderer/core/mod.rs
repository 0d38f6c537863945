/// "Core" refers to high-level objects that are used to manage the state of the renderer.
/// They own the Vulkan instance, the surface and the logical device that everything else borrows.

pub mod config;
pub mod device;
pub mod error;
pub mod instance;
pub mod queue;
pub mod surface;
