use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::renderer::core::device::DeviceContext;

/// Pool for the per-frame command buffers. Buffers are reset individually every frame
/// and freed wholesale when the swapchain is rebuilt.
pub struct FrameCommandPool {
    pool: vk::CommandPool,
    device: Arc<ash::Device>,
}

impl FrameCommandPool {
    pub fn new(ctx: &DeviceContext) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue.family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe {
            ctx.logical.create_command_pool(&pool_info, None)?
        };

        Ok(Self {
            pool,
            device: ctx.logical.clone(),
        })
    }

    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        Ok(unsafe {
            self.device.allocate_command_buffers(&allocate_info)?
        })
    }

    /// The buffers must not be pending on any queue
    pub fn free(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.pool, command_buffers);
        }
    }
}

impl Drop for FrameCommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
