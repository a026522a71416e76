//! Scent stimulus sensor: players and food sources near the scan center,
//! converted to window-relative injection records.

use swarm_compute::GpuStimulus;
use swarm_shared::{DVec3, IVec3, ScentChannel};

use crate::config::ScentConfig;
use crate::world::FoodSource;

/// Builds the per-tick stimulus batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScentSensor {
    range_sq: f64,
    max_stimuli: usize,
    player_magnitude: f32,
    food_magnitude: f32,
}

impl ScentSensor {
    /// Sensor for `config`.
    #[must_use]
    pub fn new(config: &ScentConfig) -> Self {
        Self {
            range_sq: config.stimulus_range * config.stimulus_range,
            max_stimuli: config.max_stimuli,
            player_magnitude: config.player_magnitude,
            food_magnitude: config.food_magnitude,
        }
    }

    /// Players emit on PLAYER, food on its own channel. Sources beyond the
    /// range are dropped and the batch is capped; players come first.
    #[must_use]
    pub fn collect(
        &self,
        center: DVec3,
        anchor: IVec3,
        players: &[DVec3],
        food: &[FoodSource],
    ) -> Vec<GpuStimulus> {
        let players = players
            .iter()
            .map(|p| (*p, ScentChannel::Player, self.player_magnitude));
        let food = food
            .iter()
            .filter(|f| f.channel.is_food())
            .map(|f| (f.position, f.channel, self.food_magnitude));

        players
            .chain(food)
            .filter(|(pos, _, _)| pos.distance_squared(center) <= self.range_sq)
            .take(self.max_stimuli)
            .map(|(pos, channel, magnitude)| {
                GpuStimulus::new(pos.relative_to(anchor), channel, magnitude)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(max_stimuli: usize) -> ScentSensor {
        ScentSensor::new(&ScentConfig {
            max_stimuli,
            stimulus_range: 10.0,
            ..ScentConfig::default()
        })
    }

    #[test]
    fn test_players_and_food_within_range() {
        let center = DVec3::new(100.0, 64.0, 100.0);
        let anchor = IVec3::new(96, 48, 96);
        let players = [DVec3::new(101.5, 64.0, 100.5), DVec3::new(300.0, 64.0, 0.0)];
        let food = [
            FoodSource {
                position: DVec3::new(98.0, 64.0, 99.0),
                channel: ScentChannel::Meat,
            },
            // not a food channel
            FoodSource {
                position: DVec3::new(98.0, 64.0, 99.0),
                channel: ScentChannel::Predator,
            },
        ];

        let batch = sensor(16).collect(center, anchor, &players, &food);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].position, [5.5, 16.0, 4.5, 5.0]);
        assert_eq!(batch[0].meta[0], ScentChannel::Player.index() as u32);
        assert_eq!(batch[1].position, [2.0, 16.0, 3.0, 2.0]);
        assert_eq!(batch[1].meta[0], ScentChannel::Meat.index() as u32);
    }

    #[test]
    fn test_batch_is_capped() {
        let center = DVec3::ZERO;
        let players = vec![DVec3::new(1.0, 0.0, 0.0); 20];
        let batch = sensor(4).collect(center, IVec3::ZERO, &players, &[]);
        assert_eq!(batch.len(), 4);
    }
}
