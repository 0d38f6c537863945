use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, Result};
use crate::renderer::core::device::DeviceContext;
use crate::renderer::core::error::FatalError;
use crate::renderer::internals::one_shot::OneShotSubmitter;

/// First memory type allowed by `type_filter` whose flags contain all of `properties`.
/// This is first-fit on purpose: drivers list their preferred types first.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32, FatalError> {
    (0..memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32))
        .find(|&i| {
            type_filter & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(FatalError::NoMatchingMemoryType {
            type_filter,
            properties,
        })
}

/// A buffer with its own device memory allocation.
/// Host-visible memory is mapped once and stays mapped until drop.
pub struct MemoryBuffer {
    pub buffer: vk::Buffer,
    /// Requested size in bytes
    pub size: u64,
    /// Size of the bound allocation, never less than `size`
    pub memory_size: u64,
    pub usage: vk::BufferUsageFlags,
    pub memory_type_index: u32,
    pub memory_flags: vk::MemoryPropertyFlags,

    memory: vk::DeviceMemory,
    mapped: Option<NonNull<u8>>,
    device: Arc<ash::Device>,
}

impl MemoryBuffer {
    pub fn new(
        ctx: &DeviceContext,
        usage: vk::BufferUsageFlags,
        size: u64,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let device = ctx.logical.clone();

        let buffer = {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            unsafe { device.create_buffer(&buffer_info, None)? }
        };

        let requirements = unsafe {
            device.get_buffer_memory_requirements(buffer)
        };
        let memory_type_index = match ctx.find_memory_type(requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        let memory_flags = ctx.memory_properties.memory_types[memory_type_index as usize].property_flags;

        let memory = {
            let allocate_info = vk::MemoryAllocateInfo::default()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type_index);
            match unsafe { device.allocate_memory(&allocate_info, None) } {
                Ok(memory) => memory,
                Err(e) => {
                    unsafe { device.destroy_buffer(buffer, None) };
                    return Err(e.into());
                }
            }
        };

        let mut this = Self {
            buffer,
            size,
            memory_size: requirements.size,
            usage,
            memory_type_index,
            memory_flags,
            memory,
            mapped: None,
            device,
        };

        unsafe {
            this.device.bind_buffer_memory(this.buffer, this.memory, 0)?;
        }

        if memory_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            let ptr = unsafe {
                this.device.map_memory(this.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?
            };
            this.mapped = NonNull::new(ptr.cast::<u8>());
        }

        log::debug!(
            "Created buffer: {} bytes ({} bound), usage {:?}, memory type {} {:?}",
            size,
            requirements.size,
            usage,
            memory_type_index,
            memory_flags,
        );

        Ok(this)
    }

    /// A host-visible, host-coherent buffer used as the source of a transfer
    pub fn new_staging(ctx: &DeviceContext, size: u64) -> Result<Self> {
        Self::new(
            ctx,
            vk::BufferUsageFlags::TRANSFER_SRC,
            size,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Upload `data` into a new device-local buffer through a temporary staging buffer
    pub fn new_device_local<T: Copy>(
        ctx: &DeviceContext,
        submitter: &OneShotSubmitter,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self> {
        let size = std::mem::size_of_val(data) as u64;
        if size == 0 {
            return Err(eyre!("Cannot upload an empty buffer"));
        }

        let mut staging = Self::new_staging(ctx, size)?;
        staging.write(data, 0)?;

        let buffer = Self::new(
            ctx,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            size,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        submitter.copy_buffer(staging.buffer, buffer.buffer, size)?;

        Ok(buffer)
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn write<T: Copy>(
        &mut self,
        data: &[T],
        start_offset: usize,
    ) -> Result<presser::CopyRecord> {
        let mut region = self.mapped_region()?;
        Ok(presser::copy_from_slice_to_offset(
            data,
            &mut region,
            start_offset,
        )?)
    }

    /// Contents of a mapped buffer. `None` for device-local memory.
    pub fn mapped_bytes(&self) -> Option<&[u8]> {
        self.mapped.map(|ptr| unsafe {
            std::slice::from_raw_parts(ptr.as_ptr(), self.size as usize)
        })
    }

    fn mapped_region(&mut self) -> Result<MappedRegion<'_>> {
        let ptr = self.mapped
            .ok_or_else(|| eyre!("Cannot write to buffer that is not host-visible"))?;
        Ok(MappedRegion {
            ptr,
            len: self.size as usize,
            _buffer: PhantomData,
        })
    }
}

impl Drop for MemoryBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.free_memory(self.memory, None);
            self.device.destroy_buffer(self.buffer, None);
        }
    }
}

/// Borrowed view of a persistently mapped allocation
struct MappedRegion<'a> {
    ptr: NonNull<u8>,
    len: usize,
    _buffer: PhantomData<&'a mut MemoryBuffer>,
}

// SAFETY: the pointer comes from `vkMapMemory` over an allocation at least `len` bytes
// long, and the mutable borrow of the owning buffer keeps it mapped and unaliased.
unsafe impl presser::Slab for MappedRegion<'_> {
    fn base_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    fn base_ptr_mut(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.len
    }
}
