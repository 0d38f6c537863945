use ash::vk;
use color_eyre::Result;
use crate::renderer::core::device::DeviceContext;
use crate::renderer::internals::buffer::MemoryBuffer;
use crate::renderer::internals::one_shot::OneShotSubmitter;
use crate::renderer::resources::vertex::{Vertex, QUAD_INDICES, QUAD_VERTICES};

/// Indexed geometry living in device-local memory
pub struct Mesh {
    pub vertex_buffer: MemoryBuffer,
    pub index_buffer: MemoryBuffer,
    pub index_count: u32,
}

impl Mesh {
    pub fn new(
        ctx: &DeviceContext,
        submitter: &OneShotSubmitter,
        vertices: &[Vertex],
        indices: &[u16],
    ) -> Result<Self> {
        let vertex_buffer = MemoryBuffer::new_device_local(
            ctx,
            submitter,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vertices,
        )?;
        let index_buffer = MemoryBuffer::new_device_local(
            ctx,
            submitter,
            vk::BufferUsageFlags::INDEX_BUFFER,
            indices,
        )?;

        log::debug!(
            "Uploaded mesh: {} vertices ({} bytes), {} indices",
            vertices.len(),
            vertex_buffer.size,
            indices.len(),
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn new_quad(
        ctx: &DeviceContext,
        submitter: &OneShotSubmitter,
    ) -> Result<Self> {
        Self::new(ctx, submitter, &QUAD_VERTICES, &QUAD_INDICES)
    }

    /// Bind both buffers and issue one draw covering every index
    pub fn draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT16);
            device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
        }
    }
}
