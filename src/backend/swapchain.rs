// Swapchain - Window presentation
//
// Builds the chain of images a renderer draws into and presents, plus one
// view per image. Format, present mode and extent are negotiated from a
// fresh PresentationSupport query on every build.

use ash::vk;
use std::sync::Arc;

use super::context::{DrawableSize, LogicalDevice, PresentationSurface};
use super::device::SelectedDevice;
use super::error::{BackendError, Result};
use super::physical::PresentationSupport;

/// Preferred surface format: 8-bit BGRA, sRGB non-linear color space.
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// A swapchain image and the view created for it.
#[derive(Debug, Clone, Copy)]
pub struct ChainImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

/// Swapchain plus per-image views, in presentation-engine index order.
///
/// Holds its device alive: the logical device cannot be destroyed while a
/// chain built from it still exists. Chains are only built by `Presenter`,
/// which drops them before the device, surface and context.
pub struct PresentationChain<D: LogicalDevice> {
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<ChainImage>,
    device: Arc<SelectedDevice<D>>,
}

impl<D: LogicalDevice> PresentationChain<D> {
    /// Build a chain for `surface` at the window's current drawable size.
    ///
    /// The chain keeps `device` alive, so it must be dropped before the
    /// context the device came from. `Presenter` is the owner that
    /// guarantees this.
    pub(crate) fn build<S, W>(
        device: &Arc<SelectedDevice<D>>,
        surface: &S,
        window: &W,
    ) -> Result<Self>
    where
        S: PresentationSurface,
        W: DrawableSize + ?Sized,
    {
        let support = PresentationSupport::query(surface, device.candidate().handle())?;
        let format = choose_surface_format(&support.formats).ok_or(BackendError::Context {
            what: "surface formats",
            result: vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
        })?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = resolve_extent(window.drawable_size(), &support.capabilities);
        let image_count = support.capabilities.min_image_count;

        let families = device.queue_families();
        if families.graphics != families.present {
            // Exclusive sharing needs an ownership transfer between the two
            // families; concurrent sharing is not implemented.
            log::warn!(
                "Graphics family {:?} and present family {:?} differ; swapchain uses exclusive sharing",
                families.graphics,
                families.present
            );
        }

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images min",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let logical = device.logical();
        let swapchain = logical
            .create_swapchain(&create_info)
            .map_err(BackendError::SwapchainCreation)?;

        // From here on everything created so far is released if a later
        // step fails.
        let mut pending = PendingChain {
            device: logical,
            swapchain,
            views: Vec::new(),
        };

        let images = logical
            .swapchain_images(swapchain)
            .map_err(BackendError::SwapchainCreation)?;

        for (index, &image) in images.iter().enumerate() {
            let view = logical
                .create_image_view(&color_view_info(image, format.format))
                .map_err(|result| BackendError::ImageViewCreation { index, result })?;
            pending.views.push(view);
        }

        let (swapchain, views) = pending.finish();

        log::info!("Created swapchain with {} images", images.len());

        Ok(Self {
            swapchain,
            format,
            present_mode,
            extent,
            images: images
                .into_iter()
                .zip(views)
                .map(|(image, view)| ChainImage { image, view })
                .collect(),
            device: Arc::clone(device),
        })
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Images in the order acquire-next-image indexes them.
    pub fn images(&self) -> &[ChainImage] {
        &self.images
    }

    pub fn device(&self) -> &SelectedDevice<D> {
        &self.device
    }
}

impl<D: LogicalDevice> Drop for PresentationChain<D> {
    fn drop(&mut self) {
        let logical = self.device.logical();
        for image in &self.images {
            logical.destroy_image_view(image.view);
        }
        logical.destroy_swapchain(self.swapchain);
    }
}

/// Partially built chain. Dropping it releases every view created so far
/// and then the swapchain.
struct PendingChain<'a, D: LogicalDevice> {
    device: &'a D,
    swapchain: vk::SwapchainKHR,
    views: Vec<vk::ImageView>,
}

impl<D: LogicalDevice> PendingChain<'_, D> {
    fn finish(mut self) -> (vk::SwapchainKHR, Vec<vk::ImageView>) {
        let swapchain = std::mem::replace(&mut self.swapchain, vk::SwapchainKHR::null());
        (swapchain, std::mem::take(&mut self.views))
    }
}

impl<D: LogicalDevice> Drop for PendingChain<'_, D> {
    fn drop(&mut self) {
        if self.swapchain == vk::SwapchainKHR::null() {
            return;
        }
        for &view in &self.views {
            self.device.destroy_image_view(view);
        }
        self.device.destroy_swapchain(self.swapchain);
    }
}

/// Prefer BGRA8 sRGB, otherwise take the first format offered.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first())
        .copied()
}

/// FIFO: vsync, no tearing, guaranteed available.
pub fn choose_present_mode(_available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    vk::PresentModeKHR::FIFO
}

/// Clamp the drawable size into the surface's supported extent range,
/// each dimension independently.
pub fn resolve_extent(
    drawable: vk::Extent2D,
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::Extent2D {
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: drawable.width.max(min.width).min(max.width),
        height: drawable.height.max(min.height).min(max.height),
    }
}

fn color_view_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}
