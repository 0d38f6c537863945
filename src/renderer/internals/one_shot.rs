use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::Result;
use crate::renderer::core::device::DeviceContext;
use crate::renderer::core::error::FatalError;

/// Access masks and pipeline stages for one side of an image barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierScope {
    pub access: vk::AccessFlags,
    pub stage: vk::PipelineStageFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBarrier {
    pub src: BarrierScope,
    pub dst: BarrierScope,
}

/// The only layout transitions the renderer performs. Anything else is a programming error.
pub fn layout_barrier(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Result<LayoutBarrier, FatalError> {
    match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(LayoutBarrier {
            src: BarrierScope {
                access: vk::AccessFlags::NONE,
                stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            },
            dst: BarrierScope {
                access: vk::AccessFlags::TRANSFER_WRITE,
                stage: vk::PipelineStageFlags::TRANSFER,
            },
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(LayoutBarrier {
            src: BarrierScope {
                access: vk::AccessFlags::TRANSFER_WRITE,
                stage: vk::PipelineStageFlags::TRANSFER,
            },
            dst: BarrierScope {
                access: vk::AccessFlags::SHADER_READ,
                stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            },
        }),
        (old, new) => Err(FatalError::UnsupportedLayoutTransition { old, new }),
    }
}

/// Synchronous single-use command execution on the graphics queue.
/// Only meant for setup-time uploads and layout transitions, never for per-frame work.
pub struct OneShotSubmitter {
    fence: vk::Fence,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,

    queue: vk::Queue,
    device: Arc<ash::Device>,
}

impl OneShotSubmitter {
    pub fn new(ctx: &DeviceContext) -> Result<Self> {
        let device = ctx.logical.clone();

        let fence = unsafe {
            device.create_fence(&vk::FenceCreateInfo::default(), None)?
        };

        let command_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue.family_index)
            // Short-lived buffers that are reset individually after every submission
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = match unsafe { device.create_command_pool(&command_pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_fence(fence, None) };
                return Err(e.into());
            }
        };

        let command_buffer_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .command_buffer_count(1)
            .level(vk::CommandBufferLevel::PRIMARY);
        let command_buffer = match unsafe { device.allocate_command_buffers(&command_buffer_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe {
                    device.destroy_command_pool(command_pool, None);
                    device.destroy_fence(fence, None);
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            fence,
            command_pool,
            command_buffer,
            queue: ctx.graphics_queue.handle,
            device,
        })
    }

    /// Record one operation with `func`, submit it and block until the device has finished
    pub fn immediate_submit<F>(
        &self,
        func: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer, &ash::Device) -> Result<()>,
    {
        let cmd = self.command_buffer;

        // This command buffer will be used exactly once before resetting
        let cmd_begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device.begin_command_buffer(cmd, &cmd_begin_info)?;
        }

        func(cmd, &self.device)?;

        unsafe {
            self.device.end_command_buffer(cmd)?;
        }

        let cmds = [cmd];
        let submit = vk::SubmitInfo::default()
            .command_buffers(&cmds);
        unsafe {
            self.device.queue_submit(self.queue, &[submit], self.fence)?;
        }

        unsafe {
            if let Err(e) = self.device.wait_for_fences(&[self.fence], true, u64::MAX) {
                log::warn!("Waiting on one-shot submission fence failed: {}", e);
            }
            self.device.reset_fences(&[self.fence])?;
            self.device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        }

        Ok(())
    }

    pub fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    ) -> Result<()> {
        self.immediate_submit(|cmd, device| {
            let region = vk::BufferCopy::default()
                .src_offset(0)
                .dst_offset(0)
                .size(size);
            unsafe {
                device.cmd_copy_buffer(cmd, src, dst, &[region]);
            }
            Ok(())
        })
    }

    /// Copy tightly packed pixels into mip 0 of a color image in `TRANSFER_DST_OPTIMAL`
    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        extent: vk::Extent2D,
    ) -> Result<()> {
        self.immediate_submit(|cmd, device| {
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D::default())
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                });
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    src,
                    dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            Ok(())
        })
    }

    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<()> {
        // Look the pair up before recording so an unknown transition never reaches the queue
        let barrier = layout_barrier(old_layout, new_layout)?;

        self.immediate_submit(|cmd, device| {
            let image_barrier = vk::ImageMemoryBarrier::default()
                .src_access_mask(barrier.src.access)
                .dst_access_mask(barrier.dst.access)
                .old_layout(old_layout)
                .new_layout(new_layout)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    barrier.src.stage,
                    barrier.dst.stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[image_barrier],
                );
            }
            Ok(())
        })
    }
}

impl Drop for OneShotSubmitter {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_fence(self.fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_to_transfer_dst() {
        let barrier = layout_barrier(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ).unwrap();

        assert_eq!(barrier.src.access, vk::AccessFlags::NONE);
        assert_eq!(barrier.src.stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(barrier.dst.access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.dst.stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn transfer_dst_to_shader_read() {
        let barrier = layout_barrier(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ).unwrap();

        assert_eq!(barrier.src.access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.src.stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(barrier.dst.access, vk::AccessFlags::SHADER_READ);
        assert_eq!(barrier.dst.stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unknown_pairs_are_rejected() {
        let unsupported = [
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR),
        ];
        for (old, new) in unsupported {
            assert_eq!(
                layout_barrier(old, new),
                Err(FatalError::UnsupportedLayoutTransition { old, new }),
            );
        }
    }
}
