use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::{eyre, Result};
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator},
    MemoryLocation,
};
use crate::renderer::core::device::DeviceContext;
use crate::renderer::internals::buffer::MemoryBuffer;
use crate::renderer::internals::one_shot::OneShotSubmitter;

/// Bytes per texel of the only supported texture format
const BYTES_PER_PIXEL: u64 = 4;

/// Decoded RGBA8 pixels handed in by the application
#[derive(Debug, Clone, Copy)]
pub struct TextureData<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// A device-local, shader-readable RGBA8 image
pub struct Texture {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,

    allocation: Option<Allocation>, // GPU-only memory block
    memory_allocator: Arc<Mutex<Allocator>>,
    device: Arc<ash::Device>,
}

impl Texture {
    /// Upload decoded RGBA8 pixels. The image ends up in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn from_rgba8(
        ctx: &DeviceContext,
        submitter: &OneShotSubmitter,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let expected_len = rgba8_len(width, height);
        if width == 0 || height == 0 || pixels.len() as u64 != expected_len {
            return Err(eyre!(
                "Texture data is {} bytes but {}x{} RGBA8 needs {}",
                pixels.len(),
                width,
                height,
                expected_len,
            ));
        }

        let mut staging_buffer = MemoryBuffer::new_staging(ctx, expected_len)?;
        staging_buffer.write(pixels, 0)?;

        let extent = vk::Extent2D { width, height };
        let mut texture = Self::new(ctx, vk::Format::R8G8B8A8_SRGB, extent)?;
        texture.upload(&staging_buffer, submitter)?;
        texture.view = texture.create_view()?;

        log::debug!("Uploaded {}x{} texture", width, height);
        Ok(texture)
    }

    // The allocation of the returned image is NOT yet populated with any data
    fn new(
        ctx: &DeviceContext,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let device = ctx.logical.clone();
        let memory_allocator = ctx.memory_allocator();

        let image = {
            let info = vk::ImageCreateInfo::default()
                .format(format)
                .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
                .extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .image_type(vk::ImageType::TYPE_2D)
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);
            unsafe { device.create_image(&info, None)? }
        };

        let reqs = unsafe { device.get_image_memory_requirements(image) };
        let allocation = memory_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?
            .allocate(&AllocationCreateDesc {
                name: "Texture",
                requirements: reqs,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::DedicatedImage(image),
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e.into());
            }
        };

        let texture = Self {
            image,
            view: vk::ImageView::null(),
            format,
            extent,
            allocation: Some(allocation),
            memory_allocator,
            device,
        };

        if let Some(allocation) = &texture.allocation {
            unsafe {
                texture.device.bind_image_memory(image, allocation.memory(), allocation.offset())?;
            }
        }

        Ok(texture)
    }

    fn upload(
        &mut self,
        staging_buffer: &MemoryBuffer,
        submitter: &OneShotSubmitter,
    ) -> Result<()> {
        submitter.transition_image_layout(
            self.image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        submitter.copy_buffer_to_image(staging_buffer.buffer, self.image, self.extent)?;
        submitter.transition_image_layout(
            self.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;
        Ok(())
    }

    fn create_view(&self) -> Result<vk::ImageView> {
        let info = vk::ImageViewCreateInfo::default()
            .view_type(vk::ImageViewType::TYPE_2D)
            .image(self.image)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
                aspect_mask: vk::ImageAspectFlags::COLOR,
            });
        Ok(unsafe { self.device.create_image_view(&info, None)? })
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            match self.memory_allocator.lock() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        log::error!("Failed to free texture allocation: {}", e);
                    }
                }
                Err(e) => log::error!("Memory allocator lock poisoned: {}", e),
            }
        }
    }
}

/// Byte length of tightly packed RGBA8 pixels
pub fn rgba8_len(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * BYTES_PER_PIXEL
}

/// Generated fallback texture: `cells` x `cells` squares of alternating gray levels
pub fn checkerboard(size: u32, cells: u32) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity(rgba8_len(size, size) as usize);
    for y in 0..size {
        for x in 0..size {
            let shade = if ((x / cell) + (y / cell)) % 2 == 0 { 0xE0 } else { 0x40 };
            pixels.extend_from_slice(&[shade, shade, shade, 0xFF]);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_is_rgba8() {
        let pixels = checkerboard(16, 4);
        assert_eq!(pixels.len(), 16 * 16 * 4);
        assert!(pixels.chunks(4).all(|p| p[3] == 0xFF));
    }

    #[test]
    fn rgba8_len_does_not_wrap_for_large_images() {
        assert_eq!(rgba8_len(2, 3), 24);
        assert_eq!(rgba8_len(32768, 32768), 1 << 32);
        assert_eq!(rgba8_len(u32::MAX, 1), u32::MAX as u64 * 4);
    }

    #[test]
    fn checkerboard_alternates_between_cells() {
        let pixels = checkerboard(8, 2);
        let texel = |x: usize, y: usize| pixels[(y * 8 + x) * 4];

        assert_eq!(texel(0, 0), texel(3, 3));
        assert_ne!(texel(0, 0), texel(4, 0));
        assert_ne!(texel(0, 0), texel(0, 4));
        assert_eq!(texel(0, 0), texel(4, 4));
    }
}
