use std::sync::Arc;
use ash::prelude::VkResult;
use ash::vk;
use color_eyre::Result;
use smallvec::{smallvec, SmallVec};
use crate::renderer::core::config::RenderConfig;
use crate::renderer::core::device::DeviceContext;
use crate::renderer::core::error::FatalError;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::queue::QueueFamilyIndices;
use crate::renderer::core::surface::{Surface, SurfaceSupport};

/// Prefer the exact (format, color space) pair; otherwise take whatever the surface lists first
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
        .or_else(|| formats.first())
        .copied()
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> Option<vk::PresentModeKHR> {
    if modes.contains(&preferred) {
        Some(preferred)
    } else {
        modes.first().copied()
    }
}

/// A current extent of `u32::MAX` means the surface lets the swapchain decide
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: requested.width.max(min.width).min(max.width),
        height: requested.height.max(min.height).min(max.height),
    }
}

/// One more than the minimum so the driver never stalls us while it holds an image.
/// A maximum of 0 means there is no upper bound.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let min = capabilities.min_image_count;
    let max = capabilities.max_image_count;
    if max == 0 {
        min + 1
    } else {
        (min + 1).min(max).max(min)
    }
}

/// Images are only shared between families when graphics and present differ
pub fn image_sharing(
    queue_families: &QueueFamilyIndices,
) -> (vk::SharingMode, SmallVec<[u32; 2]>) {
    match (queue_families.graphics, queue_families.present) {
        (Some(graphics), Some(present)) if graphics != present => {
            (vk::SharingMode::CONCURRENT, smallvec![graphics, present])
        }
        _ => (vk::SharingMode::EXCLUSIVE, SmallVec::new()),
    }
}

/// The negotiated shape of a swapchain
#[derive(Debug, Clone, Copy)]
pub struct SwapchainParams {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainParams {
    /// `requested_extent` is only consulted when the surface leaves the extent undefined
    pub fn negotiate(
        support: &SurfaceSupport,
        config: &RenderConfig,
        requested_extent: vk::Extent2D,
    ) -> Result<Self> {
        support.ensure_presentable()?;

        let capabilities = &support.capabilities;
        let surface_format = choose_surface_format(&support.formats, config.preferred_surface_format)
            .ok_or(FatalError::NoSurfaceFormats)?;
        let present_mode = choose_present_mode(&support.present_modes, config.preferred_present_mode)
            .ok_or(FatalError::NoPresentModes)?;
        let pre_transform = if capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            capabilities.current_transform
        };

        Ok(Self {
            surface_format,
            present_mode,
            extent: choose_extent(capabilities, requested_extent),
            image_count: choose_image_count(capabilities),
            pre_transform,
        })
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub loader: ash::khr::swapchain::Device,
    pub params: SwapchainParams,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,

    device: Arc<ash::Device>,
}

impl Swapchain {
    /// Build a swapchain for `surface`. Pass the handle being replaced as `old_swapchain`
    /// (or null) so the driver can hand resources over; the caller destroys the old one afterwards.
    pub fn new(
        ins: &RenderInstance,
        ctx: &DeviceContext,
        surface: &Surface,
        params: SwapchainParams,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let image_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
        let (image_sharing_mode, queue_family_indices) = image_sharing(&ctx.queue_families);

        let loader = ash::khr::swapchain::Device::new(&ins.instance, &ctx.logical);
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(params.image_count)
            .image_format(params.surface_format.format)
            .image_color_space(params.surface_format.color_space)
            .image_extent(params.extent)
            .image_usage(image_usage)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(params.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(params.present_mode)
            .clipped(true)
            .image_array_layers(1)
            .old_swapchain(old_swapchain);

        let handle = unsafe {
            loader.create_swapchain(&swapchain_info, None)?
        };

        let (images, image_views) = match Self::create_swapchain_images(
            handle,
            &loader,
            params.surface_format.format,
            &ctx.logical,
        ) {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(e);
            }
        };

        log::info!(
            "Created swapchain: {}x{}, {:?} / {:?}, {:?}, {} images (requested {}), {:?} sharing",
            params.extent.width,
            params.extent.height,
            params.surface_format.format,
            params.surface_format.color_space,
            params.present_mode,
            images.len(),
            params.image_count,
            image_sharing_mode,
        );

        Ok(Self {
            handle,
            loader,
            params,
            images,
            image_views,
            framebuffers: Vec::new(),
            device: ctx.logical.clone(),
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.params.extent
    }

    pub fn format(&self) -> vk::Format {
        self.params.surface_format.format
    }

    /// One framebuffer per image view, sized to the swapchain extent
    pub fn init_framebuffers(&mut self, render_pass: vk::RenderPass) -> Result<()> {
        self.release_framebuffers();

        let extent = self.params.extent;
        for view in &self.image_views {
            let attachments = [*view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe {
                self.device.create_framebuffer(&framebuffer_info, None)?
            };
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    pub fn release_framebuffers(&mut self) {
        for framebuffer in self.framebuffers.drain(..) {
            unsafe {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }

    fn create_swapchain_images(
        swapchain: vk::SwapchainKHR,
        loader: &ash::khr::swapchain::Device,
        format: vk::Format,
        device: &ash::Device,
    ) -> Result<(Vec<vk::Image>, Vec<vk::ImageView>)> {
        let images = unsafe {
            loader.get_swapchain_images(swapchain)?
        };
        let image_views = create_each(
            &images,
            |image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image(*image);
                unsafe { device.create_image_view(&view_info, None) }
            },
            |view| unsafe { device.destroy_image_view(view, None) },
        )?;

        Ok((images, image_views))
    }
}

/// Create one object per input. On the first failure the objects created so far are
/// handed to `destroy` before the error is returned.
pub fn create_each<I, T>(
    inputs: &[I],
    mut create: impl FnMut(&I) -> VkResult<T>,
    mut destroy: impl FnMut(T),
) -> VkResult<Vec<T>> {
    let mut created = Vec::with_capacity(inputs.len());
    for input in inputs {
        match create(input) {
            Ok(object) => created.push(object),
            Err(e) => {
                created.into_iter().rev().for_each(&mut destroy);
                return Err(e);
            }
        }
    }
    Ok(created)
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.release_framebuffers();
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRGB: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    const BGRA: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    fn capabilities(
        min_image_count: u32,
        max_image_count: u32,
        current_extent: vk::Extent2D,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count,
            max_image_count,
            current_extent,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn undefined_extent() -> vk::Extent2D {
        vk::Extent2D { width: u32::MAX, height: u32::MAX }
    }

    #[test]
    fn prefers_requested_surface_format() {
        let chosen = choose_surface_format(&[BGRA, SRGB], SRGB).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn falls_back_to_first_surface_format() {
        let other_space = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        };
        let chosen = choose_surface_format(&[BGRA, other_space], SRGB).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert!(choose_surface_format(&[], SRGB).is_none());
    }

    #[test]
    fn prefers_fifo_then_first_mode() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, vk::PresentModeKHR::FIFO), Some(vk::PresentModeKHR::FIFO));

        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, vk::PresentModeKHR::FIFO), Some(vk::PresentModeKHR::IMMEDIATE));
    }

    #[test]
    fn defined_extent_wins_over_request() {
        let caps = capabilities(2, 3, vk::Extent2D { width: 1024, height: 768 });
        let extent = choose_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(extent, vk::Extent2D { width: 1024, height: 768 });
    }

    #[test]
    fn undefined_extent_is_clamped() {
        let caps = capabilities(2, 3, undefined_extent());
        assert_eq!(
            choose_extent(&caps, vk::Extent2D { width: 800, height: 600 }),
            vk::Extent2D { width: 800, height: 600 },
        );
        assert_eq!(
            choose_extent(&caps, vk::Extent2D { width: 10_000, height: 0 }),
            vk::Extent2D { width: 4096, height: 1 },
        );
    }

    #[test]
    fn image_count_stays_within_bounds() {
        for min in 1..6 {
            for max in [0, min, min + 1, min + 4] {
                let count = choose_image_count(&capabilities(min, max, undefined_extent()));
                assert!(count >= min, "min {} max {} -> {}", min, max, count);
                if max > 0 {
                    assert!(count <= max, "min {} max {} -> {}", min, max, count);
                }
            }
        }
        assert_eq!(choose_image_count(&capabilities(2, 0, undefined_extent())), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3, undefined_extent())), 3);
    }

    #[test]
    fn negotiation_is_repeatable() {
        let support = SurfaceSupport {
            capabilities: capabilities(2, 8, vk::Extent2D { width: 640, height: 480 }),
            formats: vec![BGRA, SRGB],
            present_modes: vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
        };
        let config = RenderConfig::default();
        let first = SwapchainParams::negotiate(&support, &config, config.default_extent).unwrap();
        let second = SwapchainParams::negotiate(&support, &config, config.default_extent).unwrap();

        assert_eq!(first.surface_format.format, second.surface_format.format);
        assert_eq!(first.surface_format.color_space, second.surface_format.color_space);
        assert_eq!(first.present_mode, second.present_mode);
        assert_eq!(first.extent, second.extent);
        assert_eq!(first.image_count, 3);
    }

    #[test]
    fn sharing_depends_on_family_overlap() {
        let same = QueueFamilyIndices { graphics: Some(0), present: Some(0), compute: None };
        let (mode, families) = image_sharing(&same);
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());

        let split = QueueFamilyIndices { graphics: Some(0), present: Some(2), compute: None };
        let (mode, families) = image_sharing(&split);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families.as_slice(), &[0, 2]);
    }

    #[test]
    fn failed_creation_destroys_earlier_objects() {
        let mut destroyed = Vec::new();
        let result = create_each(
            &[1, 2, 3, 4],
            |n| if *n == 3 { Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) } else { Ok(*n * 10) },
            |object| destroyed.push(object),
        );

        assert_eq!(result, Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert_eq!(destroyed, [20, 10]);
    }

    #[test]
    fn successful_creation_destroys_nothing() {
        let mut destroyed = Vec::<u32>::new();
        let result = create_each(&[1u32, 2], |n| Ok(*n), |object| destroyed.push(object));

        assert_eq!(result, Ok(vec![1, 2]));
        assert!(destroyed.is_empty());
    }
}
