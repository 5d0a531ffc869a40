// Backend errors
//
// Every failure in device selection and presentation-chain construction is
// fatal at this layer. Nothing is retried; the caller decides what to do.

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The Vulkan loader library could not be found or loaded.
    #[error("Failed to load Vulkan library: {0}")]
    Loader(String),

    #[error("Failed to create Vulkan instance: {0}")]
    InstanceCreation(vk::Result),

    #[error("Failed to create window surface: {0}")]
    SurfaceCreation(String),

    /// Enumeration or a device/surface query failed.
    #[error("Graphics context query failed ({what}): {result}")]
    Context { what: &'static str, result: vk::Result },

    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A required instance or device extension is not reported as available.
    #[error("Required extension not available: {0}")]
    MissingExtension(String),

    #[error("Failed to create logical device: {0}")]
    DeviceCreation(vk::Result),

    #[error("Failed to create swapchain: {0}")]
    SwapchainCreation(vk::Result),

    #[error("Failed to create image view for swapchain image {index}: {result}")]
    ImageViewCreation { index: usize, result: vk::Result },
}

impl BackendError {
    /// Shorthand used with `map_err` on context queries.
    pub(crate) fn context(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Context { what, result }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
