pub mod core;
pub mod frame;
pub mod internals;
pub mod pipeline;
pub mod resources;

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::time::Instant;
use ash::vk;
use color_eyre::eyre::{OptionExt, Result};
use crate::renderer::core::config::RenderConfig;
use crate::renderer::core::device::DeviceContext;
use crate::renderer::core::error::FrameOutcome;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::surface::{Surface, SurfaceProvider};
use crate::renderer::frame::cursor::resolve_flight_count;
use crate::renderer::frame::rebuilder::VulkanRebuild;
use crate::renderer::frame::recorder::VulkanFrame;
use crate::renderer::frame::recreate::{usable_extent, Recreation};
use crate::renderer::frame::scheduler::{FrameReport, FrameScheduler};
use crate::renderer::frame::slot::FrameSlot;
use crate::renderer::internals::command_pool::FrameCommandPool;
use crate::renderer::internals::descriptor::UniformDescriptorPool;
use crate::renderer::internals::one_shot::OneShotSubmitter;
use crate::renderer::internals::swapchain::{Swapchain, SwapchainParams};
use crate::renderer::pipeline::RenderPipeline;
use crate::renderer::resources::mesh::Mesh;
use crate::renderer::resources::shader::ShaderSet;
use crate::renderer::resources::texture::{Texture, TextureData};
use crate::renderer::resources::uniform::UniformBufferObject;

/// Owns the whole rendering stack. Fields are released in the reverse order they were
/// built in; `Drop` spells that order out.
pub struct Renderer {
    config: RenderConfig,
    provider: Arc<dyn SurfaceProvider>,
    scheduler: FrameScheduler,
    recreation: Recreation,
    first_frame: Option<Instant>,

    slots: ManuallyDrop<Vec<FrameSlot>>,
    descriptor_pool: ManuallyDrop<UniformDescriptorPool>,
    command_pool: ManuallyDrop<FrameCommandPool>,
    pipeline: Option<RenderPipeline>,
    swapchain: Option<Swapchain>,
    texture: ManuallyDrop<Option<Texture>>,
    mesh: ManuallyDrop<Mesh>,
    shaders: ManuallyDrop<ShaderSet>,
    submitter: ManuallyDrop<OneShotSubmitter>,
    device: ManuallyDrop<DeviceContext>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<RenderInstance>,
}

impl Renderer {
    pub fn new(
        provider: Arc<dyn SurfaceProvider>,
        config: RenderConfig,
        texture: Option<TextureData<'_>>,
    ) -> Result<Self> {
        let instance = RenderInstance::new(&config, Some(provider.as_ref()))?;
        let surface = Surface::new(provider.as_ref(), &instance)?;
        let device = DeviceContext::new(&instance, Some(&surface))?;
        let submitter = OneShotSubmitter::new(&device)?;

        let shaders = ShaderSet::new(
            &config.vertex_shader_path,
            &config.fragment_shader_path,
            device.logical.clone(),
        )?;
        let mesh = Mesh::new_quad(&device, &submitter)?;
        let texture = texture
            .map(|data| Texture::from_rgba8(&device, &submitter, data.pixels, data.width, data.height))
            .transpose()?;

        let requested_extent = usable_extent(provider.drawable_size()).unwrap_or(config.default_extent);
        let params = SwapchainParams::negotiate(
            &surface.query_support(device.physical)?,
            &config,
            requested_extent,
        )?;
        let mut swapchain = Swapchain::new(&instance, &device, &surface, params, vk::SwapchainKHR::null())?;
        let pipeline = RenderPipeline::new(&device, swapchain.format(), &shaders)?;
        swapchain.init_framebuffers(pipeline.render_pass)?;

        let flight_count = resolve_flight_count(config.max_frames_in_flight, swapchain.image_count());
        log::info!(
            "Frames in flight: {} (requested {}, {} swapchain images)",
            flight_count,
            config.max_frames_in_flight,
            swapchain.image_count(),
        );

        let command_pool = FrameCommandPool::new(&device)?;
        let descriptor_pool = UniformDescriptorPool::new(&device, flight_count as u32)?;
        let command_buffers = command_pool.allocate(flight_count as u32)?;
        let descriptor_sets = descriptor_pool.allocate(shaders.descriptor_set_layout, flight_count as u32)?;
        let slots = command_buffers
            .into_iter()
            .zip(descriptor_sets)
            .map(|(command_buffer, descriptor_set)| {
                FrameSlot::new(&device, command_buffer, descriptor_set, &descriptor_pool)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            provider,
            scheduler: FrameScheduler::new(flight_count),
            recreation: Recreation::default(),
            first_frame: None,

            slots: ManuallyDrop::new(slots),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            command_pool: ManuallyDrop::new(command_pool),
            pipeline: Some(pipeline),
            swapchain: Some(swapchain),
            texture: ManuallyDrop::new(texture),
            mesh: ManuallyDrop::new(mesh),
            shaders: ManuallyDrop::new(shaders),
            submitter: ManuallyDrop::new(submitter),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// Record a new framebuffer size. Takes effect before the next frame is drawn.
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        log::debug!("Resize notification: {}x{}", width, height);
        self.recreation.notify_resize(width, height);
    }

    pub fn flight_count(&self) -> usize {
        self.scheduler.flight_count()
    }

    pub fn draw_frame(&mut self) -> Result<FrameOutcome> {
        if let Some(reason) = self.with_recreation(|recreation, ops| recreation.before_frame(ops))? {
            return Ok(FrameOutcome::Skipped(reason));
        }

        let swapchain = self.swapchain.as_ref().ok_or_eyre("Swapchain is missing")?;
        let pipeline = self.pipeline.as_ref().ok_or_eyre("Pipeline is missing")?;

        let first_frame = *self.first_frame.get_or_insert_with(Instant::now);
        let uniforms = UniformBufferObject::compute(
            first_frame.elapsed().as_secs_f32(),
            self.config.rotation_speed,
            swapchain.extent(),
        );

        let mut frame = VulkanFrame {
            device: &self.device.logical,
            graphics_queue: self.device.graphics_queue.handle,
            present_queue: self.device.present_queue().handle,
            swapchain,
            pipeline,
            mesh: &self.mesh,
            slots: &mut self.slots,
            uniforms,
        };
        let report = self.scheduler.run_frame(&mut frame)?;

        match report {
            FrameReport::Presented(status) => {
                self.recreation.after_present(status);
                Ok(FrameOutcome::Presented)
            }
            FrameReport::Stale(status) => {
                let reason = self.with_recreation(|recreation, ops| recreation.after_stale(status, ops))?;
                Ok(FrameOutcome::Skipped(reason))
            }
        }
    }

    /// Rebuild everything that depends on the swapchain, using the provider's current size.
    /// Returns `false` without touching anything while the drawable area is zero.
    pub fn recreate_swapchain(&mut self) -> Result<bool> {
        self.with_recreation(|recreation, ops| recreation.rebuild(vk::Extent2D::default(), ops))
    }

    fn with_recreation<T>(
        &mut self,
        f: impl FnOnce(&mut Recreation, &mut VulkanRebuild<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut recreation = self.recreation;
        let mut ops = VulkanRebuild {
            config: &self.config,
            provider: self.provider.as_ref(),
            instance: &self.instance,
            surface: &mut self.surface,
            device: &self.device,
            shaders: &self.shaders,
            command_pool: &self.command_pool,
            slots: &mut self.slots,
            swapchain: &mut self.swapchain,
            pipeline: &mut self.pipeline,
        };
        let result = f(&mut recreation, &mut ops);
        self.recreation = recreation;
        result
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during teardown: {}", e);
        }
        unsafe {
            ManuallyDrop::drop(&mut self.slots);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.command_pool);
        }
        if let Some(swapchain) = self.swapchain.as_mut() {
            swapchain.release_framebuffers();
        }
        self.pipeline = None;
        self.swapchain = None;
        unsafe {
            ManuallyDrop::drop(&mut self.texture);
            ManuallyDrop::drop(&mut self.mesh);
            ManuallyDrop::drop(&mut self.shaders);
            ManuallyDrop::drop(&mut self.submitter);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }
    }
}
