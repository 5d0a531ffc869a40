// Window surface
//
// Connects a window to the instance. Owns the VkSurfaceKHR and the loader
// used to query and destroy it.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use super::context::PresentationSurface;
use super::error::{BackendError, Result};
use super::instance::VulkanInstance;

pub struct WindowSurface {
    surface: vk::SurfaceKHR,
    loader: ash::extensions::khr::Surface,
}

impl WindowSurface {
    /// Create a surface for `window`. Must be dropped before `instance`.
    pub fn new<W>(instance: &VulkanInstance, window: &W) -> Result<Self>
    where
        W: HasRawDisplayHandle + HasRawWindowHandle,
    {
        let surface = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.instance(),
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .map_err(|e| BackendError::SurfaceCreation(e.to_string()))?;

        let loader = ash::extensions::khr::Surface::new(instance.entry(), instance.instance());

        Ok(Self { surface, loader })
    }
}

impl PresentationSurface for WindowSurface {
    fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> VkResult<bool> {
        unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                self.surface,
            )
        }
    }

    fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }
    }

    fn formats(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.surface)
        }
    }

    fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
        }
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        log::info!("Destroying window surface...");
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}
