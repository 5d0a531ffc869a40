// Vulkan instance - graphics context
//
// Responsibilities:
// - Loader + instance creation with window-system extensions
// - Validation layer and debug messenger (owned, torn down with the instance)
// - Physical device queries and logical device creation

use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

use super::context::GraphicsContext;
use super::device::VulkanDevice;
use super::error::{BackendError, Result};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Debug utils loader and the messenger it created.
struct DebugMessenger {
    loader: ash::extensions::ext::DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Vulkan instance with automatic cleanup
pub struct VulkanInstance {
    debug: Option<DebugMessenger>,
    instance: ash::Instance,
    entry: Entry,
}

impl VulkanInstance {
    /// Create the instance.
    ///
    /// # Arguments
    /// * `app_name` - Application name for debugging
    /// * `enable_validation` - Request the Khronos validation layer and a debug messenger
    /// * `display` - Display the window surface will be created on
    pub fn new(app_name: &str, enable_validation: bool, display: RawDisplayHandle) -> Result<Self> {
        log::info!("Creating Vulkan instance: {}", app_name);

        let entry = unsafe { Entry::load() }.map_err(|e| BackendError::Loader(e.to_string()))?;

        let app_name_cstr =
            CString::new(app_name).unwrap_or_else(|_| CString::from(c"gpu-bootstrap"));
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"gpu-bootstrap")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let extensions = Self::required_extensions(&entry, enable_validation, display)?;
        let validation = enable_validation && Self::validation_layer_available(&entry)?;
        let layer_names: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(BackendError::InstanceCreation)?;

        let debug = if enable_validation {
            match Self::setup_debug_messenger(&entry, &instance) {
                Ok(debug) => Some(debug),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(BackendError::InstanceCreation(e));
                }
            }
        } else {
            None
        };

        Ok(Self {
            debug,
            instance,
            entry,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Window-system extensions plus debug utils, each checked against
    /// what the loader reports.
    fn required_extensions(
        entry: &Entry,
        enable_validation: bool,
        display: RawDisplayHandle,
    ) -> Result<Vec<*const c_char>> {
        let mut extensions = ash_window::enumerate_required_extensions(display)
            .map_err(BackendError::context("required surface extensions"))?
            .to_vec();
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        let available = entry
            .enumerate_instance_extension_properties(None)
            .map_err(BackendError::context("enumerate instance extensions"))?;

        for &requested in &extensions {
            let requested = unsafe { CStr::from_ptr(requested) };
            if !has_extension(&available, requested) {
                return Err(BackendError::MissingExtension(
                    requested.to_string_lossy().into_owned(),
                ));
            }
        }

        Ok(extensions)
    }

    fn validation_layer_available(entry: &Entry) -> Result<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(BackendError::context("enumerate instance layers"))?;

        let available = layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);
        if !available {
            log::warn!(
                "{} not available, continuing without validation",
                VALIDATION_LAYER.to_string_lossy()
            );
        }
        Ok(available)
    }

    fn setup_debug_messenger(entry: &Entry, instance: &ash::Instance) -> VkResult<DebugMessenger> {
        let loader = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;

        Ok(DebugMessenger { loader, messenger })
    }
}

impl GraphicsContext for VulkanInstance {
    type Device = VulkanDevice;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
    }

    fn physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        unsafe { self.instance.get_physical_device_properties(physical_device) }
    }

    fn physical_device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceFeatures {
        unsafe { self.instance.get_physical_device_features(physical_device) }
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(physical_device)
        }
    }

    fn device_extension_names(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<String>> {
        let properties = unsafe {
            self.instance
                .enumerate_device_extension_properties(physical_device)
        }?;

        Ok(properties
            .iter()
            .map(|ext| {
                unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect())
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_create_infos: &[vk::DeviceQueueCreateInfo],
        extensions: &[&CStr],
    ) -> VkResult<VulkanDevice> {
        let extension_names: Vec<*const c_char> =
            extensions.iter().map(|ext| ext.as_ptr()).collect();
        // No optional features enabled
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            self.instance
                .create_device(physical_device, &create_info, None)
        }?;

        Ok(VulkanDevice::new(&self.instance, device))
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");

        // Cleanup in reverse order
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Whether `name` is among the extensions the loader reported.
fn has_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available
        .iter()
        .any(|ext| (unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }) == name)
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
