use ash::vk;
use color_eyre::Result;
use crate::renderer::core::error::SurfaceStatus;
use crate::renderer::frame::cursor::{classify_acquire, classify_present, Acquired};
use crate::renderer::frame::scheduler::FrameOps;
use crate::renderer::frame::slot::FrameSlot;
use crate::renderer::internals::swapchain::Swapchain;
use crate::renderer::pipeline::RenderPipeline;
use crate::renderer::resources::mesh::Mesh;
use crate::renderer::resources::uniform::UniformBufferObject;

/// Opaque black
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Everything one frame touches on the device, borrowed for the duration of that frame
pub struct VulkanFrame<'a> {
    pub device: &'a ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain: &'a Swapchain,
    pub pipeline: &'a RenderPipeline,
    pub mesh: &'a Mesh,
    pub slots: &'a mut [FrameSlot],
    pub uniforms: UniformBufferObject,
}

impl FrameOps for VulkanFrame<'_> {
    fn wait_for_slot(&mut self, slot: usize) {
        let fence = self.slots[slot].in_flight;
        unsafe {
            if let Err(e) = self.device.wait_for_fences(&[fence], true, u64::MAX) {
                log::warn!("Waiting on frame fence {} failed: {}", slot, e);
            }
        }
    }

    fn acquire(&mut self, slot: usize) -> Result<Acquired> {
        let result = unsafe {
            self.swapchain.loader.acquire_next_image(
                self.swapchain.handle,
                u64::MAX,
                self.slots[slot].image_available,
                vk::Fence::null(),
            )
        };
        Ok(classify_acquire(result)?)
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let frame = &self.slots[slot];
        unsafe {
            self.device.reset_fences(&[frame.in_flight])?;
            self.device.reset_command_buffer(frame.command_buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    fn record(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let frame = &self.slots[slot];
        let cmd = frame.command_buffer;
        let extent = self.swapchain.extent();

        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe {
            self.device.begin_command_buffer(cmd, &begin_info)?;
        }

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.pipeline.render_pass)
            .framebuffer(self.swapchain.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };

        unsafe {
            self.device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            self.pipeline.bind_pipeline(cmd);
            self.pipeline.bind_descriptor_sets(cmd, 0, &[frame.descriptor_set]);
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[scissor]);
            self.device.cmd_set_line_width(cmd, 1.0);
        }
        self.mesh.draw(self.device, cmd);
        unsafe {
            self.device.cmd_end_render_pass(cmd);
            self.device.end_command_buffer(cmd)?;
        }
        Ok(())
    }

    fn update_uniforms(&mut self, slot: usize) -> Result<()> {
        self.slots[slot].write_uniforms(&self.uniforms)
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        let frame = &self.slots[slot];
        let wait_semaphores = [frame.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.render_finished];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.device.queue_submit(self.graphics_queue, &[submit], frame.in_flight)?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<SurfaceStatus> {
        let wait_semaphores = [self.slots[slot].render_finished];
        let swapchains = [self.swapchain.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let result = unsafe {
            self.swapchain.loader.queue_present(self.present_queue, &present_info)
        };
        Ok(classify_present(result)?)
    }
}
