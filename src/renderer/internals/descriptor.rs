use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::renderer::core::device::DeviceContext;

pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl DescriptorSetLayoutBuilder<'_> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        descriptor_count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(descriptor_count)
            .stage_flags(stages);

        self.bindings.push(binding);
        self
    }

    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'_>] {
        &self.bindings
    }

    pub fn build(
        self,
        device: &ash::Device,
    ) -> Result<vk::DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&self.bindings);
        Ok(unsafe {
            device.create_descriptor_set_layout(&layout_info, None)?
        })
    }
}

impl Default for DescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool sized for exactly one uniform-buffer descriptor set per frame slot.
/// Sets live as long as the pool; they are never freed individually.
pub struct UniformDescriptorPool {
    pool: vk::DescriptorPool,
    device: Arc<ash::Device>,
}

impl UniformDescriptorPool {
    pub fn new(ctx: &DeviceContext, set_count: u32) -> Result<Self> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: set_count,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(set_count);
        let pool = unsafe {
            ctx.logical.create_descriptor_pool(&pool_info, None)?
        };

        Ok(Self {
            pool,
            device: ctx.logical.clone(),
        })
    }

    /// Allocate `count` sets that all share `layout`
    pub fn allocate(
        &self,
        layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; count as usize];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        Ok(unsafe {
            self.device.allocate_descriptor_sets(&allocate_info)?
        })
    }

    /// Point binding 0 of `set` at `range` bytes of `buffer`
    pub fn write_uniform(
        &self,
        set: vk::DescriptorSet,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) {
        let buffer_info = [vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }
}

impl Drop for UniformDescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_bindings_in_order() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::VERTEX)
            .add_binding(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT);
        let bindings = builder.bindings();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }
}
