//! Flyer attractor sensor.
//!
//! Attractor blocks (forage sites, homes) change rarely, so the world is
//! rescanned only every `selection.sensor_interval` ticks. Claims are
//! recomputed every cycle on the host: a forage site is claimed while a
//! gathering flyer is within the arrive radius.

use swarm_compute::GpuAttractor;
use swarm_shared::{AttractorKind, DVec3, IVec3};

use crate::world::{AttractorSite, WorldView};

/// Cached attractor sites around the scan center.
#[derive(Debug, Clone, Default)]
pub struct AttractorSensor {
    interval: u64,
    radius: i32,
    sites: Vec<AttractorSite>,
    last_scan: Option<u64>,
}

impl AttractorSensor {
    /// Sensor scanning `radius` blocks every `interval` ticks.
    #[must_use]
    pub fn new(interval: u64, radius: i32) -> Self {
        Self {
            interval: interval.max(1),
            radius,
            sites: Vec::new(),
            last_scan: None,
        }
    }

    /// Cached sites.
    #[must_use]
    pub fn sites(&self) -> &[AttractorSite] {
        &self.sites
    }

    /// Drops the cache so the next call rescans.
    pub fn invalidate(&mut self) {
        self.last_scan = None;
    }

    /// Rescans when due. Returns true when it did.
    pub fn rescan_if_due<W: WorldView + ?Sized>(
        &mut self,
        world: &W,
        center: IVec3,
        tick: u64,
    ) -> bool {
        if let Some(last) = self.last_scan {
            if tick.saturating_sub(last) < self.interval {
                return false;
            }
        }
        self.sites = world.attractor_sites(center, self.radius);
        self.last_scan = Some(tick);
        tracing::debug!("attractor scan found {} sites", self.sites.len());
        true
    }

    /// Device records relative to `anchor`, with claims from `gatherers`.
    #[must_use]
    pub fn to_device(&self, anchor: IVec3, gatherers: &[DVec3], arrive_radius: f64) -> Vec<GpuAttractor> {
        let radius_sq = arrive_radius * arrive_radius;
        self.sites
            .iter()
            .map(|site| {
                let center = site.position.center();
                let claimed = site.kind == AttractorKind::Forage
                    && gatherers
                        .iter()
                        .any(|g| g.distance_squared(center) <= radius_sq);
                GpuAttractor {
                    position: center.relative_to(anchor).extend(0.0),
                    meta: [site.kind.code(), u32::from(claimed), 0, 0],
                }
            })
            .collect()
    }
}
