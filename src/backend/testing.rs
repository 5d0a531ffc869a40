// Recording test doubles for the collaborator traits.
//
// Every create/destroy call lands in a shared journal so tests can assert on
// what was created, what was released, and in which order.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::{Cell, RefCell, RefMut};
use std::ffi::{c_char, CStr};
use std::rc::Rc;

use super::context::{DrawableSize, GraphicsContext, LogicalDevice, PresentationSurface};

const QUEUE_BASE: u64 = 0x100;
const IMAGE_BASE: u64 = 0x1000;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreateDevice {
        families: Vec<u32>,
        queue_counts: Vec<u32>,
        priorities: Vec<f32>,
        extensions: Vec<String>,
    },
    CreateSwapchain {
        min_image_count: u32,
        width: u32,
        height: u32,
        format: vk::Format,
        color_space: vk::ColorSpaceKHR,
        present_mode: vk::PresentModeKHR,
        sharing_mode: vk::SharingMode,
    },
    CreateImageView {
        image: u64,
        view: u64,
    },
    DestroyImageView(u64),
    DestroySwapchain(u64),
    WaitIdle,
    DestroyDevice,
    DestroySurface,
    DestroyContext,
    DestroyWindow,
}

pub type Journal = Rc<RefCell<Vec<Event>>>;

/// Knobs shared by the context and every device it creates.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub fail_enumeration: bool,
    pub fail_device_creation: bool,
    pub fail_swapchain: bool,
    pub image_count: usize,
    pub fail_view_at: Option<usize>,
    pub fail_present_query: bool,
    pub fail_support_query: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            fail_enumeration: false,
            fail_device_creation: false,
            fail_swapchain: false,
            image_count: 3,
            fail_view_at: None,
            fail_present_query: false,
            fail_support_query: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeGpu {
    pub name: String,
    pub geometry_shader: bool,
    pub families: Vec<vk::QueueFlags>,
    pub present_families: Vec<u32>,
    pub extensions: Vec<String>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
}

impl FakeGpu {
    /// One all-purpose family that can present, swapchain extension, sRGB.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            geometry_shader: true,
            families: vec![
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            ],
            present_families: vec![0],
            extensions: vec!["VK_KHR_swapchain".to_string()],
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
        }
    }

    pub fn with_families(mut self, families: &[vk::QueueFlags]) -> Self {
        self.families = families.to_vec();
        self
    }

    pub fn with_present_families(mut self, families: &[u32]) -> Self {
        self.present_families = families.to_vec();
        self
    }

    pub fn without_geometry_shader(mut self) -> Self {
        self.geometry_shader = false;
        self
    }

    pub fn without_extensions(mut self) -> Self {
        self.extensions.clear();
        self
    }

    pub fn with_formats(mut self, formats: &[vk::SurfaceFormatKHR]) -> Self {
        self.formats = formats.to_vec();
        self
    }

    pub fn with_extent_range(mut self, min: (u32, u32), max: (u32, u32)) -> Self {
        self.capabilities.min_image_extent = vk::Extent2D {
            width: min.0,
            height: min.1,
        };
        self.capabilities.max_image_extent = vk::Extent2D {
            width: max.0,
            height: max.1,
        };
        self
    }
}

fn gpu_index(physical_device: vk::PhysicalDevice) -> usize {
    (physical_device.as_raw() - 1) as usize
}

pub struct FakeContext {
    gpus: Rc<Vec<FakeGpu>>,
    journal: Journal,
    behaviour: Rc<RefCell<Behaviour>>,
}

impl FakeContext {
    pub fn new(gpus: Vec<FakeGpu>) -> Self {
        Self {
            gpus: Rc::new(gpus),
            journal: Journal::default(),
            behaviour: Rc::default(),
        }
    }

    pub fn behaviour(&self) -> RefMut<'_, Behaviour> {
        self.behaviour.borrow_mut()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn surface(&self) -> FakeSurface {
        FakeSurface {
            gpus: self.gpus.clone(),
            journal: self.journal.clone(),
            behaviour: self.behaviour.clone(),
        }
    }

    pub fn window(&self, width: u32, height: u32) -> FakeWindow {
        FakeWindow {
            size: Rc::new(Cell::new(vk::Extent2D { width, height })),
            journal: self.journal.clone(),
        }
    }

    fn gpu(&self, physical_device: vk::PhysicalDevice) -> &FakeGpu {
        &self.gpus[gpu_index(physical_device)]
    }
}

impl Drop for FakeContext {
    fn drop(&mut self) {
        self.journal.borrow_mut().push(Event::DestroyContext);
    }
}

impl GraphicsContext for FakeContext {
    type Device = FakeDevice;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        if self.behaviour.borrow().fail_enumeration {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        Ok((1..=self.gpus.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    fn physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        let mut properties = vk::PhysicalDeviceProperties::default();
        let name = self.gpu(physical_device).name.as_bytes();
        for (dst, &src) in properties.device_name.iter_mut().zip(name) {
            *dst = src as c_char;
        }
        properties
    }

    fn physical_device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceFeatures {
        let geometry_shader = if self.gpu(physical_device).geometry_shader {
            vk::TRUE
        } else {
            vk::FALSE
        };
        vk::PhysicalDeviceFeatures {
            geometry_shader,
            ..Default::default()
        }
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.gpu(physical_device)
            .families
            .iter()
            .map(|&queue_flags| vk::QueueFamilyProperties {
                queue_flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    fn device_extension_names(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<String>> {
        Ok(self.gpu(physical_device).extensions.clone())
    }

    fn create_device(
        &self,
        _physical_device: vk::PhysicalDevice,
        queue_create_infos: &[vk::DeviceQueueCreateInfo],
        extensions: &[&CStr],
    ) -> VkResult<FakeDevice> {
        if self.behaviour.borrow().fail_device_creation {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        let priorities = queue_create_infos
            .iter()
            .flat_map(|info| unsafe {
                std::slice::from_raw_parts(info.p_queue_priorities, info.queue_count as usize)
            })
            .copied()
            .collect();

        self.journal.borrow_mut().push(Event::CreateDevice {
            families: queue_create_infos
                .iter()
                .map(|info| info.queue_family_index)
                .collect(),
            queue_counts: queue_create_infos.iter().map(|info| info.queue_count).collect(),
            priorities,
            extensions: extensions
                .iter()
                .map(|ext| ext.to_string_lossy().into_owned())
                .collect(),
        });

        Ok(FakeDevice {
            journal: self.journal.clone(),
            behaviour: self.behaviour.clone(),
            next_handle: Cell::new(0x10_000),
        })
    }
}

pub struct FakeDevice {
    journal: Journal,
    behaviour: Rc<RefCell<Behaviour>>,
    next_handle: Cell<u64>,
}

impl FakeDevice {
    fn next(&self) -> u64 {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        handle
    }
}

impl LogicalDevice for FakeDevice {
    fn queue(&self, family_index: u32, _queue_index: u32) -> vk::Queue {
        vk::Queue::from_raw(QUEUE_BASE + family_index as u64)
    }

    fn create_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR,
    ) -> VkResult<vk::SwapchainKHR> {
        if self.behaviour.borrow().fail_swapchain {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        self.journal.borrow_mut().push(Event::CreateSwapchain {
            min_image_count: create_info.min_image_count,
            width: create_info.image_extent.width,
            height: create_info.image_extent.height,
            format: create_info.image_format,
            color_space: create_info.image_color_space,
            present_mode: create_info.present_mode,
            sharing_mode: create_info.image_sharing_mode,
        });
        Ok(vk::SwapchainKHR::from_raw(self.next()))
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let count = self.behaviour.borrow().image_count as u64;
        Ok((0..count)
            .map(|i| vk::Image::from_raw(IMAGE_BASE + i))
            .collect())
    }

    fn create_image_view(
        &self,
        create_info: &vk::ImageViewCreateInfo,
    ) -> VkResult<vk::ImageView> {
        let image = create_info.image.as_raw();
        let index = (image - IMAGE_BASE) as usize;
        if self.behaviour.borrow().fail_view_at == Some(index) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        let view = self.next();
        self.journal
            .borrow_mut()
            .push(Event::CreateImageView { image, view });
        Ok(vk::ImageView::from_raw(view))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.journal
            .borrow_mut()
            .push(Event::DestroyImageView(view.as_raw()));
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.journal
            .borrow_mut()
            .push(Event::DestroySwapchain(swapchain.as_raw()));
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.journal.borrow_mut().push(Event::WaitIdle);
        Ok(())
    }

    fn destroy(&mut self) {
        self.journal.borrow_mut().push(Event::DestroyDevice);
    }
}

pub struct FakeSurface {
    gpus: Rc<Vec<FakeGpu>>,
    journal: Journal,
    behaviour: Rc<RefCell<Behaviour>>,
}

impl FakeSurface {
    fn gpu(&self, physical_device: vk::PhysicalDevice) -> &FakeGpu {
        &self.gpus[gpu_index(physical_device)]
    }

    fn support_query(&self) -> VkResult<()> {
        if self.behaviour.borrow().fail_support_query {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        Ok(())
    }
}

impl Drop for FakeSurface {
    fn drop(&mut self) {
        self.journal.borrow_mut().push(Event::DestroySurface);
    }
}

impl PresentationSurface for FakeSurface {
    fn handle(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0x5)
    }

    fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> VkResult<bool> {
        if self.behaviour.borrow().fail_present_query {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        Ok(self
            .gpu(physical_device)
            .present_families
            .contains(&queue_family_index))
    }

    fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.support_query()?;
        Ok(self.gpu(physical_device).capabilities)
    }

    fn formats(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.support_query()?;
        Ok(self.gpu(physical_device).formats.clone())
    }

    fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.support_query()?;
        Ok(self.gpu(physical_device).present_modes.clone())
    }
}

/// A window whose drawable size can be changed from the test.
pub struct FakeWindow {
    size: Rc<Cell<vk::Extent2D>>,
    journal: Journal,
}

impl FakeWindow {
    pub fn resize(&self, width: u32, height: u32) {
        self.size.set(vk::Extent2D { width, height });
    }
}

impl Drop for FakeWindow {
    fn drop(&mut self) {
        self.journal.borrow_mut().push(Event::DestroyWindow);
    }
}

impl DrawableSize for FakeWindow {
    fn drawable_size(&self) -> vk::Extent2D {
        self.size.get()
    }
}
