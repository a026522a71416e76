//! # Flow Field Scheduling
//!
//! Flow fields follow targets that move slowly relative to the grid, so they
//! are refreshed on a cadence (`flow.refresh_interval`) instead of every
//! tick. A window relocation forces the next cycle to refresh.

use std::collections::HashSet;

use swarm_compute::{ComputeResult, ResourceManager};
use swarm_shared::{FlowTarget, IVec3};

use crate::config::FlowConfig;

/// Window cells of every target class for one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowTargets {
    fields: [Vec<IVec3>; 3],
}

impl FlowTargets {
    /// Empty target sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a window cell to `target`.
    pub fn push(&mut self, target: FlowTarget, cell: IVec3) {
        self.fields[target.index()].push(cell);
    }

    /// Cells of `target`.
    #[must_use]
    pub fn cells(&self, target: FlowTarget) -> &[IVec3] {
        &self.fields[target.index()]
    }

    /// Deduplicates every field, keeps first-seen order and truncates to
    /// `max` cells.
    pub fn normalize(&mut self, max: usize) {
        for field in &mut self.fields {
            let mut seen = HashSet::with_capacity(field.len());
            field.retain(|cell| seen.insert(*cell));
            field.truncate(max);
        }
    }
}

/// Decides when flow fields are recomputed and runs the recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowScheduler {
    interval: u64,
    sweeps: u32,
    max_targets: usize,
    last_refresh: Option<u64>,
    forced: bool,
}

impl FlowScheduler {
    /// Scheduler for `config`.
    #[must_use]
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            interval: config.refresh_interval.max(1),
            sweeps: config.sweeps,
            max_targets: config.max_targets,
            last_refresh: None,
            forced: false,
        }
    }

    /// Makes the next [`Self::is_due`] true.
    pub fn force(&mut self) {
        self.forced = true;
    }

    /// Whether a refresh should run at `tick`.
    #[must_use]
    pub fn is_due(&self, tick: u64) -> bool {
        self.forced
            || self
                .last_refresh
                .map_or(true, |last| tick.saturating_sub(last) >= self.interval)
    }

    /// Recomputes every field from `targets` if due. Returns the number of
    /// fields that now hold a valid computation, `None` when not due.
    ///
    /// # Errors
    ///
    /// Backend errors; the failed field and the ones after it stay invalid.
    pub fn refresh(
        &mut self,
        manager: &mut ResourceManager,
        mut targets: FlowTargets,
        tick: u64,
    ) -> ComputeResult<Option<usize>> {
        if !self.is_due(tick) {
            return Ok(None);
        }
        self.forced = false;
        self.last_refresh = Some(tick);
        targets.normalize(self.max_targets);

        for target in FlowTarget::ALL {
            manager.invalidate_flow(target);
        }
        let mut valid = 0;
        for target in FlowTarget::ALL {
            let cells = targets.cells(target);
            manager.compute_flow(target, cells, self.sweeps)?;
            if !cells.is_empty() {
                valid += 1;
            }
        }
        tracing::debug!(
            "flow fields refreshed at tick {}: player {}, herd {}, food {}",
            tick,
            targets.cells(FlowTarget::Player).len(),
            targets.cells(FlowTarget::Herd).len(),
            targets.cells(FlowTarget::Food).len()
        );
        Ok(Some(valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_compute::{GridLayout, SoftwareBackend};

    fn manager() -> ResourceManager {
        let mut m = ResourceManager::new(Box::new(SoftwareBackend::new()));
        m.configure(GridLayout::new(16, 8).unwrap()).unwrap();
        m
    }

    #[test]
    fn test_normalize_dedupes_in_order() {
        let mut targets = FlowTargets::new();
        for x in [3, 1, 3, 2, 1] {
            targets.push(FlowTarget::Herd, IVec3::new(x, 0, 0));
        }
        targets.normalize(2);
        assert_eq!(
            targets.cells(FlowTarget::Herd),
            &[IVec3::new(3, 0, 0), IVec3::new(1, 0, 0)]
        );
    }

    #[test]
    fn test_cadence_and_force() {
        let mut m = manager();
        let mut scheduler = FlowScheduler::new(&FlowConfig {
            refresh_interval: 5,
            ..FlowConfig::default()
        });
        let mut targets = FlowTargets::new();
        targets.push(FlowTarget::Player, IVec3::new(4, 4, 4));

        assert_eq!(scheduler.refresh(&mut m, targets.clone(), 0).unwrap(), Some(1));
        assert_eq!(m.flow_mask(), 0b001);
        assert_eq!(scheduler.refresh(&mut m, targets.clone(), 4).unwrap(), None);
        assert!(scheduler.is_due(5));

        scheduler.force();
        assert!(scheduler.is_due(1));
        assert_eq!(scheduler.refresh(&mut m, FlowTargets::new(), 1).unwrap(), Some(0));
        assert_eq!(m.flow_mask(), 0);
        assert!(!scheduler.is_due(2));
    }
}
