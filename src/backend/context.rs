// Collaborator interfaces
//
// The selection and presentation-chain logic only talks to Vulkan through
// these traits. `VulkanInstance`, `VulkanDevice` and `WindowSurface` are the
// real implementations; tests drive the same code with recording fakes.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

/// Instance-level entry points: enumeration, per-device queries and
/// logical-device creation.
pub trait GraphicsContext {
    type Device: LogicalDevice;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;

    fn physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties;

    fn physical_device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceFeatures;

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;

    /// Names of the device extensions the physical device reports.
    fn device_extension_names(&self, physical_device: vk::PhysicalDevice)
        -> VkResult<Vec<String>>;

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_create_infos: &[vk::DeviceQueueCreateInfo],
        extensions: &[&CStr],
    ) -> VkResult<Self::Device>;
}

/// Device-level primitives used by the presentation chain.
///
/// Every handle passed back in must have been created by the same device.
pub trait LogicalDevice {
    fn queue(&self, family_index: u32, queue_index: u32) -> vk::Queue;

    fn create_swapchain(&self, create_info: &vk::SwapchainCreateInfoKHR)
        -> VkResult<vk::SwapchainKHR>;

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    fn create_image_view(&self, create_info: &vk::ImageViewCreateInfo)
        -> VkResult<vk::ImageView>;

    fn destroy_image_view(&self, view: vk::ImageView);

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    fn wait_idle(&self) -> VkResult<()>;

    /// Destroy the logical device. Called exactly once, by its owner.
    fn destroy(&mut self);
}

/// The window-system target a physical device presents into.
pub trait PresentationSurface {
    fn handle(&self) -> vk::SurfaceKHR;

    fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> VkResult<bool>;

    fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;

    fn formats(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>>;

    fn present_modes(&self, physical_device: vk::PhysicalDevice)
        -> VkResult<Vec<vk::PresentModeKHR>>;
}

/// Windowing layer: the current drawable size in pixels.
pub trait DrawableSize {
    fn drawable_size(&self) -> vk::Extent2D;
}

impl<T: DrawableSize + ?Sized> DrawableSize for Arc<T> {
    fn drawable_size(&self) -> vk::Extent2D {
        (**self).drawable_size()
    }
}

impl DrawableSize for vk::Extent2D {
    fn drawable_size(&self) -> vk::Extent2D {
        *self
    }
}

impl DrawableSize for winit::window::Window {
    fn drawable_size(&self) -> vk::Extent2D {
        let size = self.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}
