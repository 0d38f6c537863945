use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{Result, WrapErr};
use crate::renderer::internals::descriptor::DescriptorSetLayoutBuilder;

/// Entry point shared by both stages
pub const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// Vertex and fragment modules plus the descriptor-set layout they expect
pub struct ShaderSet {
    pub vert_mod: vk::ShaderModule,
    pub frag_mod: vk::ShaderModule,
    pub descriptor_set_layout: vk::DescriptorSetLayout,
    device: Arc<ash::Device>,
}

impl ShaderSet {
    pub fn new(
        vertex_path: &Path,
        fragment_path: &Path,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let vert_mod = create_shader_module(vertex_path, &device)?;
        let frag_mod = match create_shader_module(fragment_path, &device) {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.destroy_shader_module(vert_mod, None) };
                return Err(e);
            }
        };

        let descriptor_set_layout = match Self::uniform_layout().build(&device) {
            Ok(layout) => layout,
            Err(e) => {
                unsafe {
                    device.destroy_shader_module(vert_mod, None);
                    device.destroy_shader_module(frag_mod, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            vert_mod,
            frag_mod,
            descriptor_set_layout,
            device,
        })
    }

    /// Binding 0: the per-frame transforms, read by the vertex stage only
    pub fn uniform_layout<'a>() -> DescriptorSetLayoutBuilder<'a> {
        DescriptorSetLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::VERTEX)
    }

    pub fn stage_infos(&self) -> [vk::PipelineShaderStageCreateInfo<'static>; 2] {
        [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.vert_mod)
                .name(SHADER_ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.frag_mod)
                .name(SHADER_ENTRY_POINT),
        ]
    }
}

impl Drop for ShaderSet {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            self.device.destroy_shader_module(self.vert_mod, None);
            self.device.destroy_shader_module(self.frag_mod, None);
        }
    }
}

fn create_shader_module(filepath: &Path, device: &ash::Device) -> Result<vk::ShaderModule> {
    let code = load_spirv(filepath)?;

    let shader_module_info = vk::ShaderModuleCreateInfo::default()
        .code(&code);

    let shader_module = unsafe {
        device.create_shader_module(&shader_module_info, None)?
    };

    log::debug!("Loaded shader module {}", filepath.display());
    Ok(shader_module)
}

/// Read a SPIR-V blob as properly aligned words
pub fn load_spirv(filepath: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(filepath)
        .wrap_err_with(|| format!("Failed to open shader {}", filepath.display()))?;
    ash::util::read_spv(&mut file)
        .wrap_err_with(|| format!("Invalid SPIR-V in {}", filepath.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::config::RenderConfig;

    #[test]
    fn built_shaders_are_valid_spirv() {
        let config = RenderConfig::default();
        for path in [&config.vertex_shader_path, &config.fragment_shader_path] {
            let words = load_spirv(path).unwrap();
            assert_eq!(words[0], 0x0723_0203, "bad magic in {}", path.display());
        }
    }

    #[test]
    fn missing_shader_is_an_error() {
        let err = load_spirv(Path::new("does/not/exist.spv")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.spv"));
    }

    #[test]
    fn uniform_layout_targets_vertex_stage() {
        let layout = ShaderSet::uniform_layout();
        let bindings = layout.bindings();

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].descriptor_count, 1);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
