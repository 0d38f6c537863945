/// "Internals" refers to low-level objects that are used to implement the "Resources" objects.

pub mod buffer;
pub mod command_pool;
pub mod descriptor;
pub mod one_shot;
pub mod swapchain;
