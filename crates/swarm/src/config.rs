//! # Configuration
//!
//! One TOML document, loaded once at startup. Every section falls back to
//! its defaults, so a partial file (or an empty one) is valid:
//!
//! ```toml
//! [gpu]
//! backend = "software"
//! min_actors = 20
//!
//! [scent]
//! size = 32
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use swarm_compute::{GridLayout, KernelTuning, ScentTuning};
use swarm_shared::constants::{
    CHUNK_SIZE, DEFAULT_RELOCATE_THRESHOLD, DEFAULT_SCENT_SIZE, DEFAULT_VOXEL_SIZE, LOD_DISTANCE,
    MAX_FLOW_TARGETS, SCENT_CEILING, SCENT_CHANNELS, SCENT_MAX_DIFFUSION,
};

use crate::error::{SwarmError, SwarmResult};

/// Which compute backend to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// wgpu device (falls back to disabled when no adapter exists)
    #[default]
    Wgpu,
    /// Reference kernels on the host CPU
    Software,
}

/// `[gpu]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Master switch
    pub enabled: bool,
    /// Backend to build
    pub backend: BackendChoice,
    /// Near candidates required before dispatching at all
    pub min_actors: usize,
    /// Run the pipeline every N host ticks
    pub update_interval: u64,
    /// Consecutive failed cycles before the subsystem disables itself
    pub max_consecutive_failures: u32,
    /// Seed for the per-frame wander seed stream
    pub seed: u64,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: BackendChoice::Wgpu,
            min_actors: 10,
            update_interval: 1,
            max_consecutive_failures: 3,
            seed: 0x5157_4152_4d00,
        }
    }
}

/// `[voxel]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelConfig {
    /// Window edge in blocks (multiple of 16)
    pub size: u32,
    /// Origin drift that forces a relocation
    pub relocate_threshold: i32,
    /// Chunk columns classified per tick
    pub chunks_per_tick: usize,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_VOXEL_SIZE,
            relocate_threshold: DEFAULT_RELOCATE_THRESHOLD,
            chunks_per_tick: 1,
        }
    }
}

/// `[scent]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScentConfig {
    /// Scent grid edge in cells
    pub size: u32,
    /// Intensity ceiling
    pub ceiling: f32,
    /// Marker written by emitting actors
    pub marker_strength: f32,
    /// Stimuli injected per tick
    pub max_stimuli: usize,
    /// Sources farther than this from the scan center are ignored
    pub stimulus_range: f64,
    /// Player stimulus magnitude
    pub player_magnitude: f32,
    /// Food source stimulus magnitude
    pub food_magnitude: f32,
    /// Diffusion rate per channel
    pub diffusion: [f32; SCENT_CHANNELS],
    /// Decay factor per channel
    pub decay: [f32; SCENT_CHANNELS],
}

impl Default for ScentConfig {
    fn default() -> Self {
        let tuning = ScentTuning::default();
        Self {
            size: DEFAULT_SCENT_SIZE,
            ceiling: SCENT_CEILING,
            marker_strength: 1.0,
            max_stimuli: 1024,
            stimulus_range: 64.0,
            player_magnitude: 5.0,
            food_magnitude: 2.0,
            diffusion: tuning.diffusion,
            decay: tuning.decay,
        }
    }
}

/// `[flow]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Ticks between flow field refreshes
    pub refresh_interval: u64,
    /// Relaxation sweeps (0 = grid diameter)
    pub sweeps: u32,
    /// Target cells kept per field
    pub max_targets: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            refresh_interval: 20,
            sweeps: 0,
            max_targets: MAX_FLOW_TARGETS,
        }
    }
}

/// `[selection]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Chunk distance from a player that still counts as near
    pub near_chunk_radius: i32,
    /// Cells an actor must stay inside the window edge
    pub window_margin: i32,
    /// Ticks between ownership cleanup sweeps
    pub cleanup_interval: u64,
    /// Ticks between attractor rescans
    pub sensor_interval: u64,
    /// Actors this close to a protected entity stay host-driven
    pub protected_radius: f64,
    /// Hostiles this close to a fearful actor make it flee
    pub panic_radius: f64,
    /// How far a fleeing actor aims away from the threat
    pub flee_distance: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            near_chunk_radius: 1,
            window_margin: 2,
            cleanup_interval: 40,
            sensor_interval: 40,
            protected_radius: 5.0,
            panic_radius: 8.0,
            flee_distance: 15.0,
        }
    }
}

/// `[behavior.walker]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerTuning {
    /// Acceleration toward the desired velocity (before mass)
    pub accel: f32,
    /// Friction on solid ground
    pub ground_friction: f32,
    /// Friction while airborne
    pub air_friction: f32,
    /// Chance per wander window to pick a heading
    pub wander_chance: f32,
}

impl Default for WalkerTuning {
    fn default() -> Self {
        let k = KernelTuning::default();
        Self {
            accel: k.walker_accel,
            ground_friction: k.walker_ground_friction,
            air_friction: k.walker_air_friction,
            wander_chance: k.wander_chance,
        }
    }
}

/// `[behavior.swimmer]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwimmerTuning {
    /// Drag in liquid
    pub drag: f32,
    /// Gravity when stranded
    pub stranded_gravity: f32,
    /// Surface and floor correction (before mass)
    pub depth_push: f32,
    /// Flocking radius
    pub flock_radius: f32,
}

impl Default for SwimmerTuning {
    fn default() -> Self {
        let k = KernelTuning::default();
        Self {
            drag: k.swimmer_drag,
            stranded_gravity: k.swimmer_stranded_gravity,
            depth_push: k.swimmer_depth_push,
            flock_radius: k.swimmer_flock_radius,
        }
    }
}

/// `[behavior.flyer]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlyerTuning {
    /// Drag
    pub drag: f32,
    /// Attractor steering weight
    pub attraction_force: f32,
    /// Arrival radius at attractors
    pub arrive_radius: f32,
    /// Chance per tick to leave a forage site
    pub gather_chance: f32,
    /// Hover frequency while gathering
    pub hover_freq: f32,
    /// Hover amplitude while gathering
    pub hover_amp: f32,
    /// Obstacle ray length
    pub avoid_lookahead: f32,
    /// Obstacle push weight (before mass)
    pub avoid_weight: f32,
}

impl Default for FlyerTuning {
    fn default() -> Self {
        let k = KernelTuning::default();
        Self {
            drag: k.flyer_drag,
            attraction_force: k.attraction_force,
            arrive_radius: k.arrive_radius,
            gather_chance: k.gather_chance,
            hover_freq: k.hover_freq,
            hover_amp: k.hover_amp,
            avoid_lookahead: k.avoid_lookahead,
            avoid_weight: k.avoid_weight,
        }
    }
}

/// `[behavior.ballistic]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallisticTuning {
    /// Item gravity
    pub item_gravity: f32,
    /// Experience orb gravity
    pub xp_gravity: f32,
    /// Experience orb homing speed
    pub xp_homing: f32,
    /// Experience orb homing radius
    pub xp_radius: f32,
}

impl Default for BallisticTuning {
    fn default() -> Self {
        let k = KernelTuning::default();
        Self {
            item_gravity: k.item_gravity,
            xp_gravity: k.xp_gravity,
            xp_homing: k.xp_homing,
            xp_radius: k.xp_radius,
        }
    }
}

/// `[behavior]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Distance beyond which actors skip flocking, seeking and emission
    pub lod_distance: f32,
    /// Fraction of the species overlay applied per tick
    pub overlay_blend: f32,
    /// Walker kernel
    pub walker: WalkerTuning,
    /// Swimmer kernel
    pub swimmer: SwimmerTuning,
    /// Flyer kernel
    pub flyer: FlyerTuning,
    /// Item and orb kernel
    pub ballistic: BallisticTuning,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            lod_distance: LOD_DISTANCE,
            overlay_blend: 0.1,
            walker: WalkerTuning::default(),
            swimmer: SwimmerTuning::default(),
            flyer: FlyerTuning::default(),
            ballistic: BallisticTuning::default(),
        }
    }
}

/// Complete orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Dispatch switches and thresholds
    pub gpu: GpuConfig,
    /// Voxel window
    pub voxel: VoxelConfig,
    /// Scent field and stimuli
    pub scent: ScentConfig,
    /// Flow fields
    pub flow: FlowConfig,
    /// Candidate selection and commands
    pub selection: SelectionConfig,
    /// Kernel tuning
    pub behavior: BehaviorConfig,
}

impl SwarmConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Config` on a parse error, `InvalidConfig` when validation fails.
    pub fn from_toml_str(text: &str) -> SwarmResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SwarmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read; see [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> SwarmResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SwarmError::Io(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("loaded swarm config from {}", path.display());
        Ok(config)
    }

    /// Rejects inconsistent values.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> SwarmResult<()> {
        let invalid = |msg: String| Err(SwarmError::InvalidConfig(msg));

        if self.voxel.size == 0 || self.scent.size == 0 {
            return invalid("voxel.size and scent.size must be non-zero".to_owned());
        }
        if self.voxel.size % CHUNK_SIZE as u32 != 0 {
            return invalid(format!(
                "voxel.size {} is not a multiple of {CHUNK_SIZE}",
                self.voxel.size
            ));
        }
        if self.scent.size > self.voxel.size {
            return invalid(format!(
                "scent.size {} exceeds voxel.size {}",
                self.scent.size, self.voxel.size
            ));
        }
        if self.voxel.chunks_per_tick == 0 {
            return invalid("voxel.chunks_per_tick must be non-zero".to_owned());
        }
        if self.gpu.update_interval == 0 {
            return invalid("gpu.update_interval must be non-zero".to_owned());
        }
        if self.flow.refresh_interval == 0 {
            return invalid("flow.refresh_interval must be non-zero".to_owned());
        }
        if self.scent.ceiling <= 0.0 {
            return invalid(format!("scent.ceiling {} must be positive", self.scent.ceiling));
        }
        for (i, rate) in self.scent.diffusion.iter().enumerate() {
            if !(0.0..=SCENT_MAX_DIFFUSION).contains(rate) {
                return invalid(format!("scent.diffusion[{i}] = {rate} outside [0, 0.5]"));
            }
        }
        for (i, decay) in self.scent.decay.iter().enumerate() {
            if !(*decay > 0.0 && *decay <= 1.0) {
                return invalid(format!("scent.decay[{i}] = {decay} outside (0, 1]"));
            }
        }
        Ok(())
    }

    /// Grid geometry of the voxel window and scent grid.
    ///
    /// # Errors
    ///
    /// `Compute` when the sizes are inconsistent.
    pub fn layout(&self) -> SwarmResult<GridLayout> {
        Ok(GridLayout::new(self.voxel.size, self.scent.size)?)
    }

    /// Scent pass tuning.
    #[must_use]
    pub fn scent_tuning(&self) -> ScentTuning {
        ScentTuning {
            diffusion: self.scent.diffusion,
            decay: self.scent.decay,
            ceiling: self.scent.ceiling,
        }
    }

    /// Behavior kernel tuning.
    #[must_use]
    pub fn kernel_tuning(&self) -> KernelTuning {
        let b = &self.behavior;
        KernelTuning {
            marker_strength: self.scent.marker_strength,
            scent_ceiling: self.scent.ceiling,
            overlay_blend: b.overlay_blend,
            lod_distance: b.lod_distance,
            walker_accel: b.walker.accel,
            walker_ground_friction: b.walker.ground_friction,
            walker_air_friction: b.walker.air_friction,
            wander_chance: b.walker.wander_chance,
            swimmer_drag: b.swimmer.drag,
            swimmer_stranded_gravity: b.swimmer.stranded_gravity,
            swimmer_depth_push: b.swimmer.depth_push,
            swimmer_flock_radius: b.swimmer.flock_radius,
            flyer_drag: b.flyer.drag,
            attraction_force: b.flyer.attraction_force,
            arrive_radius: b.flyer.arrive_radius,
            gather_chance: b.flyer.gather_chance,
            hover_freq: b.flyer.hover_freq,
            hover_amp: b.flyer.hover_amp,
            avoid_lookahead: b.flyer.avoid_lookahead,
            avoid_weight: b.flyer.avoid_weight,
            item_gravity: b.ballistic.item_gravity,
            xp_gravity: b.ballistic.xp_gravity,
            xp_homing: b.ballistic.xp_homing,
            xp_radius: b.ballistic.xp_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_shared::ScentChannel;

    #[test]
    fn test_empty_document_is_default() {
        let config = SwarmConfig::from_toml_str("").unwrap();
        assert_eq!(config, SwarmConfig::default());
        assert_eq!(config.kernel_tuning(), KernelTuning::default());
        assert_eq!(config.scent_tuning(), ScentTuning::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = SwarmConfig::from_toml_str(
            r#"
            [gpu]
            backend = "software"
            min_actors = 3

            [behavior.flyer]
            arrive_radius = 3.5
            "#,
        )
        .unwrap();
        assert_eq!(config.gpu.backend, BackendChoice::Software);
        assert_eq!(config.gpu.min_actors, 3);
        assert_eq!(config.gpu.update_interval, 1);
        assert_eq!(config.behavior.flyer.arrive_radius, 3.5);
        assert_eq!(config.behavior.flyer.drag, 0.98);
        assert_eq!(config.kernel_tuning().arrive_radius, 3.5);
    }

    #[test]
    fn test_default_scent_channels() {
        let config = SwarmConfig::default();
        assert_eq!(config.scent.diffusion[ScentChannel::Predator.index()], 0.25);
        assert_eq!(config.scent.diffusion[ScentChannel::Grain.index()], 0.05);
        assert_eq!(config.scent.decay[ScentChannel::Player.index()], 0.995);
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = SwarmConfig::from_toml_str("[gpu\nenabled = ").unwrap_err();
        assert!(matches!(err, SwarmError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "[voxel]\nsize = 0",
            "[voxel]\nsize = 100",
            "[voxel]\nsize = 32\n[scent]\nsize = 64",
            "[scent]\ndiffusion = [0.1, 0.1, 0.1, 0.1, 0.6, 0.1, 0.1, 0.1]",
            "[scent]\ndecay = [0.99, 0.99, 0.0, 0.99, 0.99, 0.99, 0.99, 0.99]",
            "[scent]\ndecay = [0.99, 0.99, 0.99, 0.99, 0.99, 0.99, 0.99, 1.5]",
            "[gpu]\nupdate_interval = 0",
        ];
        for case in cases {
            let err = SwarmConfig::from_toml_str(case).unwrap_err();
            assert!(matches!(err, SwarmError::InvalidConfig(_)), "{case}: {err:?}");
        }
    }

    #[test]
    fn test_layout_centers_scent_grid() {
        let config = SwarmConfig::from_toml_str("[voxel]\nsize = 32\n[scent]\nsize = 16").unwrap();
        let layout = config.layout().unwrap();
        assert_eq!(layout.voxel.size, 32);
        assert_eq!(layout.scent_offset, 8);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SwarmConfig::load("/nonexistent/swarm.toml").unwrap_err();
        assert!(matches!(err, SwarmError::Io(_)));
    }
}
