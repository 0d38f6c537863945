use std::path::PathBuf;
use ash::vk;

/// Contains configuration options for the renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub application_name: String,

    /// Requested number of frames in flight, capped by the swapchain image count
    pub max_frames_in_flight: usize,

    pub preferred_surface_format: vk::SurfaceFormatKHR,
    pub preferred_present_mode: vk::PresentModeKHR,

    /// Only used when the surface leaves the extent up to the swapchain
    pub default_extent: vk::Extent2D,

    pub enable_validation: bool,

    pub vertex_shader_path: PathBuf,
    pub fragment_shader_path: PathBuf,

    /// Model rotation rate in radians per second
    pub rotation_speed: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            application_name: "quadra".into(),
            max_frames_in_flight: 2,
            preferred_surface_format: vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            preferred_present_mode: vk::PresentModeKHR::FIFO,
            default_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            enable_validation: cfg!(debug_assertions),
            vertex_shader_path: concat!(env!("OUT_DIR"), "/shaders/quad.vert.spv").into(),
            fragment_shader_path: concat!(env!("OUT_DIR"), "/shaders/quad.frag.spv").into(),
            rotation_speed: 90f32.to_radians(),
        }
    }
}
