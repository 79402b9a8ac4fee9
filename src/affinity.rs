//! Pinning execution units to CPU cores.

use crate::engine::UnitId;

/// Where a unit ended up relative to the core it was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pinning {
    /// The unit ran on a caller-owned thread that was left alone.
    NotRequested,
    Pinned { core: usize },
    /// The OS refused the affinity change; the unit keeps running unpinned.
    Failed { core: usize },
    /// No core list is available on this platform.
    Unavailable,
}

/// Index into the core list for `unit`. Units wrap around when there are more units than cores.
pub fn core_index(unit: UnitId, cores: usize) -> Option<usize> {
    if cores == 0 {
        return None;
    }
    Some(unit as usize % cores)
}

/// Pin the calling thread to the core assigned to `unit`. Failure is logged and never fatal.
pub fn pin_current_thread(unit: UnitId) -> Pinning {
    let cores = core_affinity::get_core_ids().unwrap_or_default();
    let Some(core) = core_index(unit, cores.len()).map(|idx| cores[idx]) else {
        tracing::warn!(unit, "no CPU cores reported, running unpinned");
        return Pinning::Unavailable;
    };

    if core_affinity::set_for_current(core) {
        tracing::info!(unit, core = core.id, "unit pinned to core");
        Pinning::Pinned { core: core.id }
    } else {
        tracing::warn!(unit, core = core.id, "failed to pin unit to core, running unpinned");
        Pinning::Failed { core: core.id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_map_to_distinct_cores_then_wrap() {
        assert_eq!(core_index(1, 4), Some(1));
        assert_eq!(core_index(3, 4), Some(3));
        assert_eq!(core_index(4, 4), Some(0));
        assert_eq!(core_index(9, 4), Some(1));
    }

    #[test]
    fn no_cores_means_no_assignment() {
        assert_eq!(core_index(1, 0), None);
    }

    #[test]
    fn pinning_a_scratch_thread_reports_an_outcome() {
        let pinning = std::thread::spawn(|| pin_current_thread(1)).join().unwrap();
        assert_ne!(pinning, Pinning::NotRequested);
    }
}
