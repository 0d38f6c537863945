use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Per-frame transforms read by the vertex stage
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    const EYE: Vec3 = Vec3::new(2.0, 2.0, 2.0);
    const FOV_Y_DEGREES: f32 = 45.0;
    const Z_NEAR: f32 = 0.1;
    const Z_FAR: f32 = 10.0;

    /// Model spins about +Z at `rotation_speed` rad/s; the camera is fixed.
    pub fn compute(
        elapsed_secs: f32,
        rotation_speed: f32,
        extent: vk::Extent2D,
    ) -> Self {
        let model = Mat4::from_rotation_z(elapsed_secs * rotation_speed);
        let view = Mat4::look_at_rh(Self::EYE, Vec3::ZERO, Vec3::Z);

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let mut proj = Mat4::perspective_rh(
            Self::FOV_Y_DEGREES.to_radians(),
            aspect,
            Self::Z_NEAR,
            Self::Z_FAR,
        );
        // Clip space Y points down
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }

    pub const fn size() -> vk::DeviceSize {
        size_of::<Self>() as vk::DeviceSize
    }
}
