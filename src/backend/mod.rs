// Backend module - Vulkan device selection and presentation
//
// Design: the selection/chain logic is written against the traits in
// `context`; `instance`, `surface` and `device::VulkanDevice` back them
// with ash.

pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod physical;
pub mod surface;
pub mod swapchain;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{DrawableSize, GraphicsContext, LogicalDevice, PresentationSurface};
pub use device::{QueueHandles, SelectedDevice, VulkanDevice};
pub use error::{BackendError, Result};
pub use instance::VulkanInstance;
pub use lifecycle::Presenter;
pub use physical::{
    select_device, AcceleratorCandidate, DeviceSelection, PresentationSupport,
    QueueFamilyAssignment,
};
pub use surface::WindowSurface;
pub use swapchain::{ChainImage, PresentationChain};
