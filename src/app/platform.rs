use std::ffi::CStr;
use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;
use crate::renderer::core::surface::SurfaceProvider;

/// Presents into a winit window
pub struct WindowSurface {
    window: Arc<Window>,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl SurfaceProvider for WindowSurface {
    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        let display_handle = self.window.display_handle()?;
        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())?;
        Ok(extensions
            .iter()
            // SAFETY: ash-window hands out pointers to static, nul-terminated extension names
            .map(|ext| unsafe { CStr::from_ptr(*ext) })
            .collect())
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let display_handle = self.window.display_handle()?;
        let window_handle = self.window.window_handle()?;
        Ok(unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )?
        })
    }

    fn drawable_size(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}
