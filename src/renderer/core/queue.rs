use ash::vk;
use smallvec::SmallVec;
use crate::renderer::core::error::{FatalError, QueueKind};

pub struct Queue {
    pub family_index: u32,
    pub handle: vk::Queue,
}

impl Queue {
    pub fn new(
        family_index: u32,
        handle: vk::Queue,
    ) -> Self {
        Self {
            family_index,
            handle,
        }
    }
}

/// Queue families resolved on a physical device. Families may coincide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
}

impl QueueFamilyIndices {
    /// Assign the first family supporting each capability.
    /// `supports_present` is `None` when no surface is involved.
    pub fn resolve(
        families: &[vk::QueueFamilyProperties],
        supports_present: Option<&dyn Fn(u32) -> bool>,
    ) -> Self {
        let graphics = families
            .iter()
            .position(|q| q.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32);

        let present = supports_present.and_then(|supports_present| {
            (0..families.len() as u32).find(|i| supports_present(*i))
        });

        let compute = families
            .iter()
            .position(|q| q.queue_flags.contains(vk::QueueFlags::COMPUTE))
            .map(|i| i as u32);

        Self {
            graphics,
            present,
            compute,
        }
    }

    pub fn graphics_index(&self) -> Result<u32, FatalError> {
        self.graphics.ok_or(FatalError::MissingQueueFamily(QueueKind::Graphics))
    }

    pub fn present_index(&self) -> Result<u32, FatalError> {
        self.present.ok_or(FatalError::MissingQueueFamily(QueueKind::Present))
    }

    /// Every resolved family, each listed once
    pub fn unique(&self) -> SmallVec<[u32; 3]> {
        let mut unique = SmallVec::new();
        for index in [self.graphics, self.present, self.compute].into_iter().flatten() {
            if !unique.contains(&index) {
                unique.push(index);
            }
        }
        unique
    }

    /// Swapchain images are only shared when graphics and present live on different families
    pub fn graphics_and_present_coincide(&self) -> bool {
        self.graphics == self.present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn resolves_first_matching_families() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let present: &dyn Fn(u32) -> bool = &|i| i >= 2;
        let indices = QueueFamilyIndices::resolve(&families, Some(present));

        assert_eq!(indices.graphics, Some(2));
        assert_eq!(indices.present, Some(2));
        assert_eq!(indices.compute, Some(1));
        assert!(indices.graphics_and_present_coincide());
        assert_eq!(indices.unique().as_slice(), &[2, 1]);
    }

    #[test]
    fn present_may_live_on_a_separate_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let present: &dyn Fn(u32) -> bool = &|i| i == 1;
        let indices = QueueFamilyIndices::resolve(&families, Some(present));

        assert_eq!(indices.graphics_index(), Ok(0));
        assert_eq!(indices.present_index(), Ok(1));
        assert!(!indices.graphics_and_present_coincide());
        assert_eq!(indices.unique().as_slice(), &[0, 1]);
    }

    #[test]
    fn missing_graphics_family_is_reported() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::resolve(&families, None);

        assert_eq!(
            indices.graphics_index(),
            Err(FatalError::MissingQueueFamily(QueueKind::Graphics)),
        );
        assert_eq!(indices.present, None);
        assert_eq!(indices.compute, Some(0));
    }
}
