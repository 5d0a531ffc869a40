// Logical device
//
// Responsibilities:
// - One queue-create entry per distinct assigned queue family
// - Required device extension check (VK_KHR_swapchain)
// - Queue handle lookup per role
// - Capability report after creation

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CStr;
use std::fmt::Write;

use super::context::{GraphicsContext, LogicalDevice};
use super::error::{BackendError, Result};
use super::physical::{
    AcceleratorCandidate, DeviceSelection, PresentationSupport, QueueFamilyAssignment,
};

/// Every queue is requested at the same priority. Static so the pointer in
/// the create info stays valid for as long as anyone holds it.
static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Device extensions the presentation chain cannot work without.
pub fn required_extensions() -> [&'static CStr; 1] {
    [ash::extensions::khr::Swapchain::name()]
}

/// Queue handles per role. A role with no assigned family has no queue;
/// roles sharing a family share the same handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueHandles {
    pub graphics: Option<vk::Queue>,
    pub compute: Option<vk::Queue>,
    pub present: Option<vk::Queue>,
    pub transfer: Option<vk::Queue>,
}

/// The chosen physical device, its logical device and queues.
pub struct SelectedDevice<D: LogicalDevice> {
    device: D,
    candidate: AcceleratorCandidate,
    queue_families: QueueFamilyAssignment,
    queues: QueueHandles,
    support: PresentationSupport,
}

impl<D: LogicalDevice> SelectedDevice<D> {
    /// Create the logical device for a selection and fetch its queues.
    pub fn create<C>(context: &C, selection: DeviceSelection) -> Result<Self>
    where
        C: GraphicsContext<Device = D>,
    {
        let DeviceSelection {
            candidate,
            queues: queue_families,
            support,
        } = selection;

        let extensions = required_extensions();
        if let Some(missing) = extensions
            .iter()
            .find(|ext| !candidate.supports_extension(ext))
        {
            return Err(BackendError::MissingExtension(
                missing.to_string_lossy().into_owned(),
            ));
        }

        let queue_create_infos = queue_create_infos(&queue_families);
        let device = context
            .create_device(candidate.handle(), &queue_create_infos, &extensions)
            .map_err(BackendError::DeviceCreation)?;

        let queues = fetch_queues(&device, &queue_families);

        let selected = Self {
            device,
            candidate,
            queue_families,
            queues,
            support,
        };

        log::info!("{}", selected.capability_report());

        Ok(selected)
    }

    pub fn logical(&self) -> &D {
        &self.device
    }

    pub fn candidate(&self) -> &AcceleratorCandidate {
        &self.candidate
    }

    pub fn queue_families(&self) -> &QueueFamilyAssignment {
        &self.queue_families
    }

    pub fn queues(&self) -> &QueueHandles {
        &self.queues
    }

    /// Wait for the device to finish all submitted work (e.g. before a
    /// chain rebuild or cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .wait_idle()
            .map_err(BackendError::context("device wait idle"))
    }

    /// Human-readable summary of the chosen GPU, its queue roles and the
    /// present modes the surface offered at selection time.
    pub fn capability_report(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "Chosen GPU: {}", self.candidate.name());
        let _ = writeln!(report, "Queues available:");
        for (role, queue) in [
            ("graphics", self.queues.graphics),
            ("compute", self.queues.compute),
            ("present", self.queues.present),
            ("transfer", self.queues.transfer),
        ] {
            let state = if queue.is_some() { "yes" } else { "no" };
            let _ = writeln!(report, "    {} queue: {}", role, state);
        }
        let _ = write!(report, "Present modes available:");
        for name in self.support.present_modes.iter().filter_map(|&m| present_mode_name(m)) {
            let _ = write!(report, "\n    {}", name);
        }
        report
    }
}

impl<D: LogicalDevice> Drop for SelectedDevice<D> {
    fn drop(&mut self) {
        log::info!("Destroying logical device...");
        let _ = self.device.wait_idle();
        self.device.destroy();
    }
}

/// One entry per distinct assigned family, one queue each.
pub fn queue_create_infos(queues: &QueueFamilyAssignment) -> Vec<vk::DeviceQueueCreateInfo> {
    queues
        .distinct_families()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

fn fetch_queues<D: LogicalDevice>(device: &D, families: &QueueFamilyAssignment) -> QueueHandles {
    let distinct: Vec<(u32, vk::Queue)> = families
        .distinct_families()
        .into_iter()
        .map(|family| (family, device.queue(family, 0)))
        .collect();

    let lookup = |family: Option<u32>| {
        family.and_then(|f| {
            distinct
                .iter()
                .find(|(index, _)| *index == f)
                .map(|&(_, queue)| queue)
        })
    };

    QueueHandles {
        graphics: lookup(families.graphics),
        compute: lookup(families.compute),
        present: lookup(families.present),
        transfer: lookup(families.transfer),
    }
}

fn present_mode_name(mode: vk::PresentModeKHR) -> Option<&'static str> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some("IMMEDIATE"),
        vk::PresentModeKHR::MAILBOX => Some("MAILBOX"),
        vk::PresentModeKHR::FIFO => Some("FIFO"),
        vk::PresentModeKHR::FIFO_RELAXED => Some("FIFO_RELAXED"),
        _ => None,
    }
}

/// ash-backed logical device with its swapchain loader
pub struct VulkanDevice {
    pub device: ash::Device,
    pub swapchain_loader: ash::extensions::khr::Swapchain,
}

impl VulkanDevice {
    pub fn new(instance: &ash::Instance, device: ash::Device) -> Self {
        let swapchain_loader = ash::extensions::khr::Swapchain::new(instance, &device);
        Self {
            device,
            swapchain_loader,
        }
    }
}

// The handles passed in below were all created from this device by the
// presentation chain, which is the only caller.
impl LogicalDevice for VulkanDevice {
    fn queue(&self, family_index: u32, queue_index: u32) -> vk::Queue {
        unsafe { self.device.get_device_queue(family_index, queue_index) }
    }

    fn create_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR,
    ) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader.create_swapchain(create_info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn create_image_view(
        &self,
        create_info: &vk::ImageViewCreateInfo,
    ) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(create_info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn destroy(&mut self) {
        unsafe { self.device.destroy_device(None) }
    }
}
