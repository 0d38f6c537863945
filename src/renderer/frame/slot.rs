use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::renderer::core::device::DeviceContext;
use crate::renderer::internals::buffer::MemoryBuffer;
use crate::renderer::internals::descriptor::UniformDescriptorPool;
use crate::renderer::resources::uniform::UniformBufferObject;

/// One reusable bundle of per-frame state. The host owns it between its fence signalling
/// and the next submit; the device owns it from submit until the fence signals again.
pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    pub descriptor_set: vk::DescriptorSet,
    pub uniform_buffer: MemoryBuffer,

    // Signals when the swapchain image is ready to be rendered into
    pub image_available: vk::Semaphore,

    // Signals when rendering commands have finished and the image can be presented
    pub render_finished: vk::Semaphore,

    // Signals the host when all of this slot's commands have finished execution
    pub in_flight: vk::Fence,

    device: Arc<ash::Device>,
}

impl FrameSlot {
    pub fn new(
        ctx: &DeviceContext,
        command_buffer: vk::CommandBuffer,
        descriptor_set: vk::DescriptorSet,
        descriptor_pool: &UniformDescriptorPool,
    ) -> Result<Self> {
        let device = ctx.logical.clone();

        let uniform_buffer = MemoryBuffer::new(
            ctx,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            UniformBufferObject::size(),
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        descriptor_pool.write_uniform(descriptor_set, uniform_buffer.buffer, UniformBufferObject::size());

        let image_available = unsafe {
            device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        let render_finished = match unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) } {
            Ok(semaphore) => semaphore,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(e.into());
            }
        };
        // Signalled so the very first wait on this slot returns immediately
        let in_flight = match unsafe {
            device.create_fence(
                &vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED),
                None,
            )
        } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe {
                    device.destroy_semaphore(render_finished, None);
                    device.destroy_semaphore(image_available, None);
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            command_buffer,
            descriptor_set,
            uniform_buffer,
            image_available,
            render_finished,
            in_flight,
            device,
        })
    }

    pub fn write_uniforms(&mut self, ubo: &UniformBufferObject) -> Result<()> {
        self.uniform_buffer.write(std::slice::from_ref(ubo), 0)?;
        Ok(())
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.in_flight, None);
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_semaphore(self.image_available, None);
        }
    }
}
