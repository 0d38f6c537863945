use std::ffi::{c_char, CStr};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::Result;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use smallvec::SmallVec;
use crate::renderer::core::error::FatalError;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::queue::{Queue, QueueFamilyIndices};
use crate::renderer::core::surface::Surface;
use crate::renderer::internals::buffer::find_memory_type;

/// The selected accelerator, its logical device and queues.
/// Everything else in the renderer borrows from this and must be gone before it drops.
pub struct DeviceContext {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,

    pub queue_families: QueueFamilyIndices,
    pub graphics_queue: Queue,
    pub present_queue: Option<Queue>,
    pub compute_queue: Option<Queue>,

    memory_allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
}

/// What device selection needs to know about one enumerated device
#[derive(Debug, Clone, Copy)]
pub struct DeviceCandidate {
    pub device_type: vk::PhysicalDeviceType,
    pub has_required_extensions: bool,
}

/// Prefer the first discrete accelerator that carries the required extensions;
/// otherwise take the first enumerated device.
pub fn pick_device_index(candidates: &[DeviceCandidate]) -> Option<usize> {
    candidates
        .iter()
        .position(|c| {
            c.device_type == vk::PhysicalDeviceType::DISCRETE_GPU && c.has_required_extensions
        })
        .or(if candidates.is_empty() { None } else { Some(0) })
}

impl DeviceContext {
    pub fn new(
        ins: &RenderInstance,
        surface: Option<&Surface>,
    ) -> Result<Self> {
        let instance = &ins.instance;
        let required_extensions = Self::get_required_device_extensions(surface.is_some());

        let physical = Self::select_physical_device(instance, &required_extensions)?;
        let properties = unsafe { instance.get_physical_device_properties(physical) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical) };
        log::info!(
            "Selected physical device: {:?} ({:?})",
            properties.device_name_as_c_str().unwrap_or(c"<unknown>"),
            properties.device_type,
        );

        let queue_families = {
            let families = unsafe {
                instance.get_physical_device_queue_family_properties(physical)
            };
            let supports_present = surface.map(|surface| {
                move |index: u32| surface.supports_present(physical, index)
            });
            QueueFamilyIndices::resolve(
                &families,
                supports_present.as_ref().map(|f| f as &dyn Fn(u32) -> bool),
            )
        };
        let graphics_family = queue_families.graphics_index()?;
        if surface.is_some() {
            queue_families.present_index()?;
        }
        log::info!("Queue families: {:?}", queue_families);

        let logical = Self::create_logical_device(
            instance,
            physical,
            &queue_families,
            &required_extensions,
        )?;

        let graphics_queue = unsafe {
            Queue::new(graphics_family, logical.get_device_queue(graphics_family, 0))
        };
        let present_queue = queue_families.present.map(|index| unsafe {
            Queue::new(index, logical.get_device_queue(index, 0))
        });
        let compute_queue = queue_families.compute.map(|index| unsafe {
            Queue::new(index, logical.get_device_queue(index, 0))
        });

        let memory_allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: logical.clone(),
            physical_device: physical,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: false,
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { logical.destroy_device(None) };
                return Err(e.into());
            }
        };

        Ok(Self {
            logical: Arc::new(logical),
            physical,
            properties,
            memory_properties,
            queue_families,
            graphics_queue,
            present_queue,
            compute_queue,
            memory_allocator: ManuallyDrop::new(Arc::new(Mutex::new(memory_allocator))),
        })
    }

    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        Ok(find_memory_type(&self.memory_properties, type_filter, properties)?)
    }

    pub fn memory_allocator(&self) -> Arc<Mutex<Allocator>> {
        Arc::clone(&self.memory_allocator)
    }

    /// Queue used for presentation; the graphics queue when running headless
    pub fn present_queue(&self) -> &Queue {
        self.present_queue.as_ref().unwrap_or(&self.graphics_queue)
    }

    /// Global barrier used before any destructive operation
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.logical.device_wait_idle()?;
        }
        Ok(())
    }

    fn select_physical_device(
        instance: &ash::Instance,
        required_extensions: &[&CStr],
    ) -> Result<vk::PhysicalDevice> {
        let devices = unsafe { instance.enumerate_physical_devices()? };

        let candidates = devices
            .iter()
            .map(|device| {
                let props = unsafe { instance.get_physical_device_properties(*device) };
                let supported_extensions = unsafe {
                    instance.enumerate_device_extension_properties(*device)
                }.unwrap_or_default();

                let has_required_extensions = required_extensions.iter().all(|req_ext| {
                    let supported = supported_extensions
                        .iter()
                        .filter_map(|ext| ext.extension_name_as_c_str().ok())
                        .any(|sup_ext| sup_ext == *req_ext);
                    if !supported {
                        log::debug!(
                            "{:?} lacks device extension {:?}",
                            props.device_name_as_c_str().unwrap_or(c"<unknown>"),
                            req_ext,
                        );
                    }
                    supported
                });

                DeviceCandidate {
                    device_type: props.device_type,
                    has_required_extensions,
                }
            })
            .collect::<Vec<_>>();

        let index = pick_device_index(&candidates).ok_or(FatalError::NoPhysicalDevice)?;
        if candidates[index].device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
            log::info!("No suitable discrete GPU found, falling back to the first device");
        }
        Ok(devices[index])
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: &QueueFamilyIndices,
        required_extensions: &[&CStr],
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos = queue_families
            .unique()
            .into_iter()
            .map(|index| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(index)
                    .queue_priorities(&queue_priorities)
            })
            .collect::<SmallVec<[_; 3]>>();

        let enabled_extension_names = required_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();
        let enabled_features = vk::PhysicalDeviceFeatures::default();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names)
            .enabled_features(&enabled_features);

        Ok(unsafe {
            instance.create_device(physical_device, &device_create_info, None)?
        })
    }

    fn get_required_device_extensions(presenting: bool) -> Vec<&'static CStr> {
        let mut exts = Vec::new();
        if presenting {
            exts.push(ash::khr::swapchain::NAME);
        }

        #[cfg(target_os = "macos")]
        exts.push(ash::khr::portability_subset::NAME);

        exts
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            // Allocator blocks must be returned before the device goes away
            ManuallyDrop::drop(&mut self.memory_allocator);
            self.logical.destroy_device(None);
        }
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("physical", &self.physical)
            .field("queue_families", &self.queue_families)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(device_type: vk::PhysicalDeviceType, has_required_extensions: bool) -> DeviceCandidate {
        DeviceCandidate {
            device_type,
            has_required_extensions,
        }
    }

    #[test]
    fn prefers_capable_discrete_gpu() {
        let candidates = [
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, true),
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, false),
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, true),
        ];
        assert_eq!(pick_device_index(&candidates), Some(2));
    }

    #[test]
    fn falls_back_to_first_enumerated_device() {
        let candidates = [
            candidate(vk::PhysicalDeviceType::CPU, true),
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, true),
        ];
        assert_eq!(pick_device_index(&candidates), Some(0));
    }

    #[test]
    fn no_devices_means_no_pick() {
        assert_eq!(pick_device_index(&[]), None);
    }
}
