//! Items and experience orbs.

use swarm_shared::{MotionMode, Vec3, VoxelClass};

use super::{ActorStep, FrameView};
use crate::layout::GpuActor;

fn settle(a: &GpuActor, velocity: Vec3) -> ActorStep {
    ActorStep {
        velocity: velocity.limit(a.position[3]),
        prev_position: Vec3::truncate(a.prev_position),
        flyer_state: a.meta[2],
        stuck: 0,
        mode: MotionMode::Fall,
    }
}

pub(crate) fn item(view: &FrameView<'_>, a: &GpuActor) -> ActorStep {
    let pos = a.pos();
    let mut vel = a.vel();
    vel.y -= view.frame.ballistic[0];
    if view.voxels.blocks(pos - Vec3::new(0.0, 0.2, 0.0)) {
        vel.y = 0.0;
        vel.x *= 0.5;
        vel.z *= 0.5;
    } else if view.voxels.class_at(pos) == VoxelClass::Liquid {
        vel *= 0.8;
    } else {
        vel *= 0.6;
    }
    settle(a, vel)
}

pub(crate) fn xp_orb(view: &FrameView<'_>, a: &GpuActor, lod: bool) -> ActorStep {
    let [_, gravity, homing, radius_sq] = view.frame.ballistic;
    let pos = a.pos();
    let mut vel = a.vel();
    vel.y -= gravity;
    if !lod {
        if let Some((player, d2)) = view.nearest_player(pos) {
            if d2 < radius_sq {
                vel += (player + Vec3::Y - pos).safe_normalize() * homing;
            }
        }
    }
    settle(a, vel * 0.95)
}
