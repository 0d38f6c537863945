use std::ffi::CStr;
use ash::vk;
use color_eyre::Result;
use crate::renderer::core::error::FatalError;
use crate::renderer::core::instance::RenderInstance;

/// The platform layer's side of presentation. The windowing code implements this
/// and hands it to the renderer at construction time.
pub trait SurfaceProvider {
    /// Instance extensions the platform needs to create a surface
    fn required_extensions(&self) -> Result<Vec<&'static CStr>>;

    /// Create a new presentation surface for `instance`
    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;

    /// Current drawable size in physical pixels
    fn drawable_size(&self) -> vk::Extent2D;
}

/// Everything the driver reports about presenting to a surface from a given device
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn ensure_presentable(&self) -> Result<()> {
        if self.formats.is_empty() {
            return Err(FatalError::NoSurfaceFormats.into());
        }
        if self.present_modes.is_empty() {
            return Err(FatalError::NoPresentModes.into());
        }
        Ok(())
    }
}

pub struct Surface {
    pub handle: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

impl Surface {
    pub fn new(
        provider: &dyn SurfaceProvider,
        ins: &RenderInstance,
    ) -> Result<Self> {
        let handle = provider.create_surface(&ins.entry, &ins.instance)?;
        let loader = ash::khr::surface::Instance::new(&ins.entry, &ins.instance);
        Ok(Self { handle, loader })
    }

    /// Drop the current handle and ask the platform for a fresh one.
    /// The caller must have destroyed every swapchain built on the old handle.
    pub fn reacquire(
        &mut self,
        provider: &dyn SurfaceProvider,
        ins: &RenderInstance,
    ) -> Result<()> {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        self.handle = vk::SurfaceKHR::null();
        self.handle = provider.create_surface(&ins.entry, &ins.instance)?;
        log::info!("Re-acquired presentation surface");
        Ok(())
    }

    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> bool {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.handle)
                .unwrap_or(false)
        }
    }

    pub fn query_support(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<SurfaceSupport> {
        let (capabilities, formats, present_modes) = unsafe {
            (
                self.loader.get_physical_device_surface_capabilities(physical_device, self.handle)?,
                self.loader.get_physical_device_surface_formats(physical_device, self.handle)?,
                self.loader.get_physical_device_surface_present_modes(physical_device, self.handle)?,
            )
        };
        Ok(SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        if self.handle != vk::SurfaceKHR::null() {
            unsafe {
                self.loader.destroy_surface(self.handle, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support(formats: usize, modes: usize) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default(); formats],
            present_modes: vec![vk::PresentModeKHR::FIFO; modes],
        }
    }

    #[test]
    fn empty_formats_are_fatal() {
        let err = support(0, 1).ensure_presentable().unwrap_err();
        assert_eq!(err.downcast_ref::<FatalError>(), Some(&FatalError::NoSurfaceFormats));
    }

    #[test]
    fn empty_present_modes_are_fatal() {
        let err = support(2, 0).ensure_presentable().unwrap_err();
        assert_eq!(err.downcast_ref::<FatalError>(), Some(&FatalError::NoPresentModes));
    }

    #[test]
    fn populated_support_is_presentable() {
        assert!(support(1, 1).ensure_presentable().is_ok());
    }
}
