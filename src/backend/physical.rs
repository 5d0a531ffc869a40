// Physical device selection
//
// Enumerate -> resolve queue families -> query presentation support ->
// pick the first suitable candidate. Nothing here creates Vulkan objects.

use ash::vk;
use std::ffi::CStr;

use super::context::{GraphicsContext, PresentationSurface};
use super::error::{BackendError, Result};

/// A physical device and the static data fetched once at enumeration.
#[derive(Clone)]
pub struct AcceleratorCandidate {
    handle: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    queue_families: Vec<vk::QueueFamilyProperties>,
    extensions: Vec<String>,
}

impl AcceleratorCandidate {
    /// List every physical device visible to the context, in driver order.
    pub fn enumerate<C: GraphicsContext>(context: &C) -> Result<Vec<Self>> {
        let handles = context
            .enumerate_physical_devices()
            .map_err(BackendError::context("enumerate physical devices"))?;

        handles
            .into_iter()
            .map(|handle| Self::query(context, handle))
            .collect()
    }

    fn query<C: GraphicsContext>(context: &C, handle: vk::PhysicalDevice) -> Result<Self> {
        let extensions = context
            .device_extension_names(handle)
            .map_err(BackendError::context("enumerate device extensions"))?;

        Ok(Self {
            handle,
            properties: context.physical_device_properties(handle),
            features: context.physical_device_features(handle),
            queue_families: context.queue_family_properties(handle),
            extensions,
        })
    }

    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn name(&self) -> String {
        // device_name is a NUL-terminated fixed array filled by the driver
        let bytes: Vec<u8> = self
            .properties
            .device_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    pub fn queue_families(&self) -> &[vk::QueueFamilyProperties] {
        &self.queue_families
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        let name = name.to_string_lossy();
        self.extensions.iter().any(|ext| *ext == name)
    }
}

/// Queue family index per role. `None` means no family offers the role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyAssignment {
    pub graphics: Option<u32>,
    pub compute: Option<u32>,
    pub present: Option<u32>,
    pub transfer: Option<u32>,
}

impl QueueFamilyAssignment {
    /// Resolve queue families for `candidate` against `surface`.
    ///
    /// Graphics, compute and transfer take the *first* family exposing the
    /// flag. Present takes the *last* family reporting surface support. The
    /// asymmetry is kept as observed behaviour; on common drivers the two
    /// policies agree because one family does graphics and present.
    pub fn resolve<S>(candidate: &AcceleratorCandidate, surface: &S) -> Self
    where
        S: PresentationSurface,
    {
        let mut assignment = Self::default();

        for (index, family) in candidate.queue_families.iter().enumerate() {
            let index = index as u32;
            let flags = family.queue_flags;

            if assignment.graphics.is_none() && flags.contains(vk::QueueFlags::GRAPHICS) {
                assignment.graphics = Some(index);
            }
            if assignment.compute.is_none() && flags.contains(vk::QueueFlags::COMPUTE) {
                assignment.compute = Some(index);
            }
            if assignment.transfer.is_none() && flags.contains(vk::QueueFlags::TRANSFER) {
                assignment.transfer = Some(index);
            }

            match surface.supports_present(candidate.handle, index) {
                Ok(true) => assignment.present = Some(index),
                Ok(false) => {}
                Err(e) => log::warn!(
                    "Surface support query failed for {} family {}: {}",
                    candidate.name(),
                    index,
                    e
                ),
            }
        }

        assignment
    }

    /// Assigned family indices, deduplicated, in role order
    /// graphics, compute, present, transfer.
    pub fn distinct_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(4);
        for family in [self.graphics, self.compute, self.present, self.transfer]
            .into_iter()
            .flatten()
        {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Surface formats, present modes and capability ranges for one
/// (physical device, surface) pair. Never cached across a resize.
#[derive(Debug, Clone, Default)]
pub struct PresentationSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl PresentationSupport {
    pub fn query<S: PresentationSurface>(
        surface: &S,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        Ok(Self {
            capabilities: surface
                .capabilities(physical_device)
                .map_err(BackendError::context("surface capabilities"))?,
            formats: surface
                .formats(physical_device)
                .map_err(BackendError::context("surface formats"))?,
            present_modes: surface
                .present_modes(physical_device)
                .map_err(BackendError::context("surface present modes"))?,
        })
    }
}

/// Suitability verdict for one candidate.
pub fn is_suitable(
    candidate: &AcceleratorCandidate,
    queues: &QueueFamilyAssignment,
    support: &PresentationSupport,
) -> bool {
    candidate.features.geometry_shader == vk::TRUE
        && !support.present_modes.is_empty()
        && !support.formats.is_empty()
        && queues.graphics.is_some()
        && queues.present.is_some()
}

/// The chosen candidate together with the data it was judged on.
#[derive(Clone)]
pub struct DeviceSelection {
    pub candidate: AcceleratorCandidate,
    pub queues: QueueFamilyAssignment,
    pub support: PresentationSupport,
}

/// Pick the first suitable candidate in enumeration order. No ranking.
pub fn select_device<C, S>(context: &C, surface: &S) -> Result<DeviceSelection>
where
    C: GraphicsContext,
    S: PresentationSurface,
{
    for candidate in AcceleratorCandidate::enumerate(context)? {
        let queues = QueueFamilyAssignment::resolve(&candidate, surface);
        let support = PresentationSupport::query(surface, candidate.handle)?;
        let suitable = is_suitable(&candidate, &queues, &support);

        log::debug!(
            "Candidate {}: suitable={} queues={:?}",
            candidate.name(),
            suitable,
            queues
        );

        if suitable {
            return Ok(DeviceSelection {
                candidate,
                queues,
                support,
            });
        }
    }

    Err(BackendError::NoSuitableDevice)
}
