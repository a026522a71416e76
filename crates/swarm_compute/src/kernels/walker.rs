//! Ground walker: command/flow/wander steering, 3×3 step search, physics,
//! stuck recovery.

use swarm_shared::constants::{WALKER_STUCK_LIMIT, WANDER_WINDOW};
use swarm_shared::{MotionMode, Vec3, VoxelClass};

use super::common::{fract, pcg, rand01, VoxelView};
use super::{ActorStep, FrameView};
use crate::layout::GpuActor;

const PROBE_DISTANCE: f32 = 4.0;
const BLOCKED: f32 = -1000.0;

/// Scores standing at `p`: body clearance, support below, cliff edges.
fn evaluate_pos(voxels: &VoxelView<'_>, p: Vec3) -> f32 {
    let mut score = 0.0;
    if voxels.blocks(p + Vec3::new(0.0, 0.5, 0.0)) {
        score += BLOCKED;
    }
    if voxels.blocks(p + Vec3::new(0.0, 1.5, 0.0)) {
        score += BLOCKED;
    }
    let ground = voxels.blocks(p - Vec3::new(0.0, 0.5, 0.0));
    let drop = voxels.blocks(p - Vec3::new(0.0, 1.5, 0.0));
    let support = f32::from(u8::from(ground)) + f32::from(u8::from(drop));
    score += BLOCKED * (1.0 - support.min(1.0));
    if !ground && drop {
        score -= 5.0;
    }
    score
}

/// Best of the 8 horizontal neighbors toward `target`.
///
/// `y = 1` on the result requests a jump. Zero when every option is blocked.
pub(crate) fn best_direction(voxels: &VoxelView<'_>, start: Vec3, target: Vec3) -> Vec3 {
    let can_jump = !voxels.blocks(start + Vec3::new(0.0, 2.0, 0.0));
    let mut best = Vec3::ZERO;
    let mut max_score = f32::MIN;

    for x in -1..=1 {
        for z in -1..=1 {
            if x == 0 && z == 0 {
                continue;
            }
            let dir = Vec3::new(x as f32, 0.0, z as f32).safe_normalize();
            let next = start + dir * 0.8;
            let walk = evaluate_pos(voxels, next);
            let mut jump = evaluate_pos(voxels, next + Vec3::Y) - 10.0;
            if !can_jump {
                jump -= 2000.0;
            }
            let score = dir.dot(target) * 2.0 + walk.max(jump);
            if score > max_score {
                max_score = score;
                best = dir;
                best.y = if jump > walk && jump > -500.0 { 1.0 } else { 0.0 };
            }
        }
    }

    if max_score < -100.0 {
        Vec3::ZERO
    } else {
        best
    }
}

/// Advances one walker.
pub(crate) fn step(view: &FrameView<'_>, gid: u32, a: &GpuActor, flow: Vec3) -> ActorStep {
    let frame = view.frame;
    let pos = a.pos();
    let mut vel = a.vel();
    let max_speed = a.position[3];
    let command = a.velocity[3];
    let goal = Vec3::truncate(a.goal);
    let gravity = a.physics[0];
    let jump_power = a.physics[1];
    let mass = a.physics[2].max(0.1);
    let [accel, ground_friction, air_friction, wander_chance] = frame.walker;
    let tick = frame.clock[0];

    let in_liquid = view.voxels.class_at(pos) == VoxelClass::Liquid;
    let dist_ground = view.voxels.cast_ray(pos, -Vec3::Y, PROBE_DISTANCE);
    let dist_ceiling = view.voxels.cast_ray(pos, Vec3::Y, PROBE_DISTANCE);
    let center_grounded = dist_ground < 2.0;
    let solid_ground = dist_ground < 0.6;
    let low_ceiling = dist_ceiling < 2.0;

    let mut should_move = false;
    let mut target = Vec3::ZERO;
    let mut speed_mult = 1.0;
    let mut mode = MotionMode::Idle;

    if command >= 0.5 {
        if pos.distance(goal) >= 1.0 {
            should_move = true;
            target = (goal - pos).safe_normalize();
            if command >= 1.5 {
                speed_mult = 2.0;
                mode = MotionMode::Flee;
            } else {
                mode = MotionMode::Goal;
            }
        }
    } else if flow.length_squared() > 0.01 {
        should_move = true;
        target = flow.safe_normalize();
        mode = MotionMode::Flow;
    } else {
        // One decision per actor per window.
        let window = tick / WANDER_WINDOW;
        let roll = pcg(a.seed().wrapping_mul(7919).wrapping_add(window));
        if rand01(roll) < wander_chance {
            let angle = rand01(roll ^ 0x9e37_79b9) * std::f32::consts::TAU;
            should_move = true;
            target = Vec3::new(angle.cos(), 0.0, angle.sin());
            speed_mult = 0.5;
            mode = MotionMode::Wander;
        }
    }

    let mut desired = Vec3::ZERO;
    if should_move && (center_grounded || in_liquid) {
        let mut dir = best_direction(&view.voxels, pos, target);
        let jump_requested = dir.y > 0.5;
        dir.y = 0.0;
        if dir.length_squared() > 0.01 {
            desired = dir.safe_normalize() * (max_speed * speed_mult);
            if jump_requested && !low_ceiling && !in_liquid && solid_ground {
                vel.y = jump_power;
            }
        }
    }

    let mut acc = frame.wind();
    if in_liquid {
        vel.y += 0.02;
        vel *= 0.8;
    } else if solid_ground && vel.y <= 0.0 {
        vel.y = 0.0;
    } else {
        acc.y -= gravity;
    }

    if vel.y > 0.0 && dist_ceiling < vel.y + 0.5 {
        vel.y = -0.1;
    }

    let moving = desired.length_squared() > 0.001;
    if moving {
        vel.x += (desired.x - vel.x) * accel / mass;
        vel.z += (desired.z - vel.z) * accel / mass;
    } else {
        let keep = 1.0 - if solid_ground { ground_friction } else { air_friction };
        vel.x *= keep;
        vel.z *= keep;
    }
    vel += acc;

    if vel.horizontal_length_squared() < 0.001 {
        vel.x = 0.0;
        vel.z = 0.0;
    }

    let prev = Vec3::truncate(a.prev_position);
    let mut stuck = if moving && !in_liquid && pos.distance_squared(prev) < 1e-4 {
        a.meta[3] + 1
    } else {
        0
    };
    let prev_position = if tick % 10 == 0 { pos } else { prev };

    if stuck > WALKER_STUCK_LIMIT {
        let seed = frame.time() + gid as f32;
        let jitter = fract(seed.sin() * 43_758.545) - 0.5;
        if center_grounded && !low_ceiling && dist_ceiling > 1.5 {
            vel.y = 0.25;
            vel.x += jitter * 0.4;
            vel.z += (fract(seed.cos() * 12_345.679) - 0.5) * 0.4;
        } else {
            vel.x += if jitter < 0.0 { -0.1 } else { 0.1 };
        }
        stuck = 0;
    }

    ActorStep {
        velocity: vel.limit(max_speed * 3.0),
        prev_position,
        flyer_state: a.meta[2],
        stuck,
        mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_shared::{CubeGrid, IVec3};

    fn floor(size: u32, y: i32) -> (CubeGrid, Vec<u32>) {
        let grid = CubeGrid::new(size);
        let mut cells = vec![0; grid.volume()];
        for x in 0..size as i32 {
            for z in 0..size as i32 {
                cells[grid.index_unchecked(IVec3::new(x, y, z))] = VoxelClass::Solid.code();
            }
        }
        (grid, cells)
    }

    #[test]
    fn test_best_direction_follows_target_on_flat_ground() {
        let (grid, cells) = floor(16, 3);
        let view = VoxelView::new(grid, &cells);
        let dir = best_direction(&view, Vec3::new(8.5, 4.0, 8.5), Vec3::X);
        assert!((dir.x - 1.0).abs() < 1e-6);
        assert_eq!(dir.y, 0.0);
    }

    fn ring(grid: CubeGrid, cells: &mut [u32], y: i32, class: VoxelClass) {
        for x in 7..=9 {
            for z in 7..=9 {
                if x != 8 || z != 8 {
                    cells[grid.index_unchecked(IVec3::new(x, y, z))] = class.code();
                }
            }
        }
    }

    #[test]
    fn test_best_direction_requests_jump_out_of_pit() {
        let (grid, mut cells) = floor(16, 3);
        ring(grid, &mut cells, 4, VoxelClass::Solid);
        let view = VoxelView::new(grid, &cells);
        let dir = best_direction(&view, Vec3::new(8.5, 4.0, 8.5), Vec3::X);
        assert!((dir.x - 1.0).abs() < 1e-6);
        assert_eq!(dir.y, 1.0);
    }

    #[test]
    fn test_tall_ring_cannot_be_jumped() {
        let (grid, mut cells) = floor(16, 3);
        ring(grid, &mut cells, 4, VoxelClass::Tall);
        ring(grid, &mut cells, 5, VoxelClass::Tall);
        let view = VoxelView::new(grid, &cells);
        assert_eq!(best_direction(&view, Vec3::new(8.5, 4.0, 8.5), Vec3::X), Vec3::ZERO);
    }

    #[test]
    fn test_boxed_in_returns_zero() {
        let grid = CubeGrid::new(8);
        let cells = vec![VoxelClass::Solid.code(); grid.volume()];
        let view = VoxelView::new(grid, &cells);
        assert_eq!(best_direction(&view, Vec3::new(4.5, 4.0, 4.5), Vec3::X), Vec3::ZERO);
    }
}
