//! Device-level checks that need a Vulkan driver but no window.
//! Run with `cargo test -- --ignored` on a machine with a GPU.

use ash::vk;
use quadra::renderer::core::config::RenderConfig;
use quadra::renderer::core::device::DeviceContext;
use quadra::renderer::core::error::FatalError;
use quadra::renderer::core::instance::RenderInstance;
use quadra::renderer::internals::buffer::MemoryBuffer;
use quadra::renderer::internals::one_shot::OneShotSubmitter;
use quadra::renderer::resources::texture::{checkerboard, Texture};
use quadra::renderer::resources::vertex::{QUAD_VERTICES, Vertex};

fn headless() -> (RenderInstance, DeviceContext) {
    let config = RenderConfig {
        enable_validation: false,
        ..RenderConfig::default()
    };
    let ins = RenderInstance::new(&config, None).expect("Vulkan instance");
    assert!(!ins.validation_enabled());
    let ctx = DeviceContext::new(&ins, None).expect("Vulkan device");
    (ins, ctx)
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn staged_vertex_upload_reads_back_identical() {
    let (_ins, ctx) = headless();
    let submitter = OneShotSubmitter::new(&ctx).unwrap();

    let device_local = MemoryBuffer::new_device_local(
        &ctx,
        &submitter,
        vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
        &QUAD_VERTICES,
    )
    .unwrap();
    assert_eq!(device_local.size, 80);
    assert!(device_local.memory_flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));

    let readback = MemoryBuffer::new(
        &ctx,
        vk::BufferUsageFlags::TRANSFER_DST,
        device_local.size,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )
    .unwrap();
    submitter
        .copy_buffer(device_local.buffer, readback.buffer, device_local.size)
        .unwrap();

    let expected: &[u8] = bytemuck::cast_slice::<Vertex, u8>(&QUAD_VERTICES);
    assert_eq!(readback.mapped_bytes().unwrap(), expected);
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn buffer_memory_covers_requested_size_and_properties() {
    let (_ins, ctx) = headless();
    let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

    let mut buffer = MemoryBuffer::new(&ctx, vk::BufferUsageFlags::UNIFORM_BUFFER, 192, wanted).unwrap();
    assert!(buffer.memory_size >= buffer.size);
    assert!(buffer.memory_flags.contains(wanted));
    assert!(buffer.is_mapped());

    buffer.write(&[7u8; 192], 0).unwrap();
    assert!(buffer.mapped_bytes().unwrap().iter().all(|b| *b == 7));
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn writing_past_the_end_is_rejected() {
    let (_ins, ctx) = headless();
    let mut staging = MemoryBuffer::new_staging(&ctx, 16).unwrap();
    assert!(staging.write(&[0u8; 32], 0).is_err());
    assert!(staging.write(&[0u8; 8], 12).is_err());
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn texture_upload_runs_both_layout_transitions() {
    let (_ins, ctx) = headless();
    let submitter = OneShotSubmitter::new(&ctx).unwrap();

    let pixels = checkerboard(64, 8);
    let texture = Texture::from_rgba8(&ctx, &submitter, &pixels, 64, 64).unwrap();
    assert_eq!(texture.extent, vk::Extent2D { width: 64, height: 64 });
    assert_ne!(texture.view, vk::ImageView::null());
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn unsupported_transition_is_fatal() {
    let (_ins, ctx) = headless();
    let submitter = OneShotSubmitter::new(&ctx).unwrap();
    let texture = Texture::from_rgba8(&ctx, &submitter, &checkerboard(4, 2), 4, 4).unwrap();

    let err = submitter
        .transition_image_layout(
            texture.image,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<FatalError>(),
        Some(&FatalError::UnsupportedLayoutTransition {
            old: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            new: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        }),
    );
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn mismatched_pixel_count_is_rejected() {
    let (_ins, ctx) = headless();
    let submitter = OneShotSubmitter::new(&ctx).unwrap();
    assert!(Texture::from_rgba8(&ctx, &submitter, &[0u8; 12], 2, 2).is_err());
}
