// Physical adapter selection
//
// Backends describe each physical adapter as an `AdapterCandidate`; the
// suitability test and scoring here are shared so every backend picks the
// same way.

use std::collections::BTreeSet;

use crate::error::{Error, ErrorKind, Result};

/// Bonus given to discrete GPUs when scoring.
pub const DISCRETE_GPU_BONUS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

/// Capabilities of one queue family as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilySupport {
    pub graphics: bool,
    /// Can present to the surface the device is being created for.
    pub present: bool,
}

/// Queue family indices chosen for submission and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Pick graphics and present families.
    ///
    /// A family that supports both is preferred; otherwise the first family
    /// supporting each capability is used.
    pub fn find(families: &[QueueFamilySupport]) -> Option<Self> {
        if let Some(shared) = families.iter().position(|f| f.graphics && f.present) {
            let index = shared as u32;
            return Some(Self {
                graphics: index,
                present: index,
            });
        }

        let graphics = families.iter().position(|f| f.graphics)?;
        let present = families.iter().position(|f| f.present)?;
        Some(Self {
            graphics: graphics as u32,
            present: present as u32,
        })
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, one queue is created per entry.
    pub fn unique(&self) -> BTreeSet<u32> {
        [self.graphics, self.present].into_iter().collect()
    }
}

/// Everything the selection algorithm needs to know about one adapter.
#[derive(Debug, Clone)]
pub struct AdapterCandidate<H> {
    /// Backend-specific physical adapter reference.
    pub handle: H,
    pub name: String,
    pub adapter_type: AdapterType,
    pub max_image_dimension_2d: u32,
    pub queue_families: Vec<QueueFamilySupport>,
    /// Required device extensions the adapter does not expose.
    pub missing_extensions: Vec<String>,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
}

impl<H> AdapterCandidate<H> {
    pub fn score(&self) -> u32 {
        score(self.adapter_type, self.max_image_dimension_2d)
    }

    /// Why this adapter cannot drive the surface, or `None` if it can.
    pub fn unsuitable_reason(&self) -> Option<String> {
        if !self.queue_families.iter().any(|f| f.graphics) {
            return Some("no graphics queue family".to_string());
        }
        if !self.queue_families.iter().any(|f| f.present) {
            return Some("no queue family can present to the surface".to_string());
        }
        if let Some(missing) = self.missing_extensions.first() {
            return Some(format!("missing device extension {missing}"));
        }
        if self.surface_format_count == 0 {
            return Some("surface exposes no formats".to_string());
        }
        if self.present_mode_count == 0 {
            return Some("surface exposes no present modes".to_string());
        }
        None
    }

    pub fn is_suitable(&self) -> bool {
        self.unsuitable_reason().is_none()
    }
}

/// Properties of the adapter a device was created on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub adapter_type: AdapterType,
    pub max_image_dimension_2d: u32,
    pub queue_families: QueueFamilies,
    pub score: u32,
}

/// Suitability score: discrete bonus plus the largest 2D image dimension.
pub fn score(adapter_type: AdapterType, max_image_dimension_2d: u32) -> u32 {
    let bonus = if adapter_type == AdapterType::Discrete {
        DISCRETE_GPU_BONUS
    } else {
        0
    };
    bonus.saturating_add(max_image_dimension_2d)
}

/// Select the highest scoring suitable adapter.
///
/// Ties keep the earliest candidate.
pub fn select<H>(candidates: Vec<AdapterCandidate<H>>) -> Result<(H, AdapterInfo)> {
    let mut best: Option<(u32, AdapterCandidate<H>)> = None;

    for candidate in candidates {
        if let Some(reason) = candidate.unsuitable_reason() {
            log::debug!("Adapter '{}' rejected: {}", candidate.name, reason);
            continue;
        }

        let score = candidate.score();
        log::debug!("Adapter '{}' ({:?}) score {}", candidate.name, candidate.adapter_type, score);

        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((score, candidate));
        }
    }

    let (score, chosen) = best.ok_or_else(|| {
        Error::new(ErrorKind::InitializationFailed, "Failed to find a suitable GPU")
    })?;

    let queue_families = QueueFamilies::find(&chosen.queue_families).ok_or_else(|| {
        Error::new(
            ErrorKind::InitializationFailed,
            format!("Adapter '{}' lost its queue families", chosen.name),
        )
    })?;

    log::info!("Selected GPU: {} (score {})", chosen.name, score);

    let info = AdapterInfo {
        name: chosen.name,
        adapter_type: chosen.adapter_type,
        max_image_dimension_2d: chosen.max_image_dimension_2d,
        queue_families,
        score,
    };
    Ok((chosen.handle, info))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, adapter_type: AdapterType, max_dim: u32) -> AdapterCandidate<&'static str> {
        AdapterCandidate {
            handle: "",
            name: name.to_string(),
            adapter_type,
            max_image_dimension_2d: max_dim,
            queue_families: vec![QueueFamilySupport {
                graphics: true,
                present: true,
            }],
            missing_extensions: Vec::new(),
            surface_format_count: 1,
            present_mode_count: 1,
        }
    }

    #[test]
    fn scoring_is_exact() {
        assert_eq!(score(AdapterType::Discrete, 2048), 3048);
        assert_eq!(score(AdapterType::Integrated, 4096), 4096);
        assert_eq!(score(AdapterType::Discrete, 8192), 9192);
        assert_eq!(score(AdapterType::Cpu, 0), 0);
    }

    #[test]
    fn integrated_with_larger_images_beats_small_discrete() {
        let mut discrete = candidate("discrete", AdapterType::Discrete, 2048);
        discrete.handle = "discrete";
        let mut integrated = candidate("integrated", AdapterType::Integrated, 4096);
        integrated.handle = "integrated";

        let (handle, info) = select(vec![discrete, integrated]).unwrap();
        assert_eq!(handle, "integrated");
        assert_eq!(info.score, 4096);
    }

    #[test]
    fn large_discrete_beats_integrated() {
        let mut integrated = candidate("integrated", AdapterType::Integrated, 4096);
        integrated.handle = "integrated";
        let mut discrete = candidate("discrete", AdapterType::Discrete, 8192);
        discrete.handle = "discrete";

        let (handle, info) = select(vec![integrated, discrete]).unwrap();
        assert_eq!(handle, "discrete");
        assert_eq!(info.score, 9192);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut first = candidate("first", AdapterType::Integrated, 4096);
        first.handle = "first";
        let mut second = candidate("second", AdapterType::Integrated, 4096);
        second.handle = "second";

        let (handle, _) = select(vec![first, second]).unwrap();
        assert_eq!(handle, "first");
    }

    #[test]
    fn unsuitable_adapters_are_skipped() {
        let mut no_present = candidate("no-present", AdapterType::Discrete, 16384);
        no_present.queue_families = vec![QueueFamilySupport {
            graphics: true,
            present: false,
        }];
        let mut missing_ext = candidate("missing-ext", AdapterType::Discrete, 16384);
        missing_ext.missing_extensions = vec!["VK_KHR_swapchain".to_string()];
        let mut no_formats = candidate("no-formats", AdapterType::Discrete, 16384);
        no_formats.surface_format_count = 0;
        let mut ok = candidate("ok", AdapterType::Cpu, 1024);
        ok.handle = "ok";

        assert!(missing_ext
            .unsuitable_reason()
            .unwrap()
            .contains("VK_KHR_swapchain"));

        let (handle, _) = select(vec![no_present, missing_ext, no_formats, ok]).unwrap();
        assert_eq!(handle, "ok");
    }

    #[test]
    fn no_suitable_adapter_is_initialization_failure() {
        let mut no_modes = candidate("no-modes", AdapterType::Discrete, 4096);
        no_modes.present_mode_count = 0;

        let err = select(vec![no_modes]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitializationFailed);
        assert!(select::<()>(Vec::new()).is_err());
    }

    #[test]
    fn split_queue_families() {
        let families = [
            QueueFamilySupport {
                graphics: true,
                present: false,
            },
            QueueFamilySupport {
                graphics: false,
                present: true,
            },
        ];
        let found = QueueFamilies::find(&families).unwrap();
        assert_eq!(found, QueueFamilies { graphics: 0, present: 1 });
        assert!(!found.is_shared());
        assert_eq!(found.unique().len(), 2);
    }

    #[test]
    fn shared_family_preferred() {
        let families = [
            QueueFamilySupport {
                graphics: true,
                present: false,
            },
            QueueFamilySupport {
                graphics: true,
                present: true,
            },
        ];
        let found = QueueFamilies::find(&families).unwrap();
        assert!(found.is_shared());
        assert_eq!(found.graphics, 1);
        assert_eq!(found.unique().len(), 1);
    }
}
