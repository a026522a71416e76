//! # Pipeline Constants
//!
//! Fixed numbers shared by the host, the CPU reference kernels and the
//! WGSL kernels. The WGSL sources repeat these literals; changing one here
//! means changing the matching shader constant.

// =============================================================================
// GRID GEOMETRY
// =============================================================================

/// Edge length of a world chunk column (blocks)
pub const CHUNK_SIZE: i32 = 16;

/// Default voxel window edge (blocks, multiple of 16)
pub const DEFAULT_VOXEL_SIZE: u32 = 128;

/// Default scent grid edge (cells)
pub const DEFAULT_SCENT_SIZE: u32 = 64;

/// Origin drift (blocks, any axis) that forces a window relocation
pub const DEFAULT_RELOCATE_THRESHOLD: i32 = 32;

// =============================================================================
// SCENT
// =============================================================================

/// Number of scent channels
pub const SCENT_CHANNELS: usize = 8;

/// Default intensity ceiling for every scent cell
pub const SCENT_CEILING: f32 = 16.0;

/// Baseline diffusion rate
pub const SCENT_BASE_DIFFUSION: f32 = 0.1;

/// Baseline decay factor
pub const SCENT_BASE_DECAY: f32 = 0.99;

/// Largest diffusion rate that keeps the update an averaging operator
pub const SCENT_MAX_DIFFUSION: f32 = 0.5;

// =============================================================================
// FLOW FIELD
// =============================================================================

/// Cost sentinel for cells no target can reach
pub const COST_UNREACHABLE: u32 = 65_535;

/// Step cost through air
pub const STEP_COST_AIR: u32 = 1;

/// Step cost through liquid
pub const STEP_COST_LIQUID: u32 = 10;

/// Number of flow target classes
pub const FLOW_FIELDS: usize = 3;

/// Maximum live target cells per flow field
pub const MAX_FLOW_TARGETS: usize = 64;

// =============================================================================
// KERNELS
// =============================================================================

/// Compute workgroup width used by every kernel
pub const WORKGROUP_SIZE: u32 = 64;

/// Maximum workgroups per dispatch dimension
pub const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Players forwarded to the behavior kernels per frame
pub const MAX_FRAME_PLAYERS: usize = 8;

/// Random neighbor samples used for flocking
pub const FLOCK_SAMPLES: u32 = 32;

/// Distance beyond which actors skip expensive sensing (blocks)
pub const LOD_DISTANCE: f32 = 64.0;

/// Ticks in one in-game day
pub const DAY_LENGTH: u32 = 24_000;

/// Night starts after this time of day
pub const NIGHT_START: u32 = 13_000;

/// Night ends at this time of day
pub const NIGHT_END: u32 = 23_000;

/// Walker wander decision window (ticks)
pub const WANDER_WINDOW: u32 = 40;

/// Ticks a walker may fail to move before forcing recovery
pub const WALKER_STUCK_LIMIT: u32 = 60;

/// Ticks a flyer may fail to move before forcing recovery
pub const FLYER_STUCK_LIMIT: u32 = 80;

/// Default command value: no command
pub const COMMAND_NONE: f32 = 0.0;

/// Command value: move to goal
pub const COMMAND_MOVE: f32 = 1.0;

/// Command value: flee toward goal at double speed
pub const COMMAND_FLEE: f32 = 2.0;

/// Actor flag bit: marine swimmer (always submerged)
pub const FLAG_MARINE: u32 = 1 << 1;

/// Sentinel for "no preferred scent channel"
pub const NO_CHANNEL: u32 = u32::MAX;
