use ash::vk;
use color_eyre::eyre::{OptionExt, Result};
use crate::renderer::core::config::RenderConfig;
use crate::renderer::core::device::DeviceContext;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::surface::{Surface, SurfaceProvider};
use crate::renderer::frame::recreate::RebuildOps;
use crate::renderer::frame::slot::FrameSlot;
use crate::renderer::internals::command_pool::FrameCommandPool;
use crate::renderer::internals::swapchain::{Swapchain, SwapchainParams};
use crate::renderer::pipeline::RenderPipeline;
use crate::renderer::resources::shader::ShaderSet;

/// Everything a swapchain rebuild touches, borrowed from the renderer for its duration
pub struct VulkanRebuild<'a> {
    pub config: &'a RenderConfig,
    pub provider: &'a dyn SurfaceProvider,
    pub instance: &'a RenderInstance,
    pub surface: &'a mut Surface,
    pub device: &'a DeviceContext,
    pub shaders: &'a ShaderSet,
    pub command_pool: &'a FrameCommandPool,
    pub slots: &'a mut [FrameSlot],
    pub swapchain: &'a mut Option<Swapchain>,
    pub pipeline: &'a mut Option<RenderPipeline>,
}

impl RebuildOps for VulkanRebuild<'_> {
    fn drawable_size(&self) -> vk::Extent2D {
        self.provider.drawable_size()
    }

    fn current_extent(&self) -> Option<vk::Extent2D> {
        self.swapchain.as_ref().map(Swapchain::extent)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }

    fn free_command_buffers(&mut self) {
        let command_buffers = self.slots
            .iter()
            .map(|slot| slot.command_buffer)
            .filter(|cmd| *cmd != vk::CommandBuffer::null())
            .collect::<Vec<_>>();
        self.command_pool.free(&command_buffers);
        for slot in self.slots.iter_mut() {
            slot.command_buffer = vk::CommandBuffer::null();
        }
    }

    fn release_framebuffers(&mut self) {
        if let Some(swapchain) = self.swapchain.as_mut() {
            swapchain.release_framebuffers();
        }
    }

    fn destroy_pipeline(&mut self) {
        *self.pipeline = None;
    }

    fn reacquire_surface(&mut self) -> Result<bool> {
        *self.swapchain = None;
        self.surface.reacquire(self.provider, self.instance)?;
        Ok(self.surface.supports_present(
            self.device.physical,
            self.device.present_queue().family_index,
        ))
    }

    fn create_swapchain(&mut self, extent: vk::Extent2D, chain_old: bool) -> Result<()> {
        let params = SwapchainParams::negotiate(
            &self.surface.query_support(self.device.physical)?,
            self.config,
            extent,
        )?;
        let old_swapchain = match self.swapchain.as_ref() {
            Some(swapchain) if chain_old => swapchain.handle,
            _ => vk::SwapchainKHR::null(),
        };
        let swapchain = Swapchain::new(self.instance, self.device, self.surface, params, old_swapchain)?;
        // The retired swapchain goes away only once its replacement exists
        *self.swapchain = Some(swapchain);
        Ok(())
    }

    fn create_pipeline(&mut self) -> Result<()> {
        let swapchain = self.swapchain.as_ref().ok_or_eyre("Swapchain is missing")?;
        *self.pipeline = Some(RenderPipeline::new(self.device, swapchain.format(), self.shaders)?);
        Ok(())
    }

    fn init_framebuffers(&mut self) -> Result<()> {
        let pipeline = self.pipeline.as_ref().ok_or_eyre("Pipeline is missing")?;
        let swapchain = self.swapchain.as_mut().ok_or_eyre("Swapchain is missing")?;
        swapchain.init_framebuffers(pipeline.render_pass)
    }

    fn allocate_command_buffers(&mut self) -> Result<()> {
        let command_buffers = self.command_pool.allocate(self.slots.len() as u32)?;
        for (slot, command_buffer) in self.slots.iter_mut().zip(command_buffers) {
            slot.command_buffer = command_buffer;
        }
        Ok(())
    }
}
