//! Swimmer: buoyancy, wander noise, sampled same-class flocking, shoreline
//! look-ahead. Out of water a swimmer falls and flops.

use swarm_shared::constants::{FLAG_MARINE, FLOCK_SAMPLES};
use swarm_shared::{ActorClass, MotionMode, Vec3, VoxelClass};

use super::common::{hash33, next_rand};
use super::{ActorStep, FrameView};
use crate::layout::GpuActor;

const SEPARATION_RADIUS_SQ: f32 = 2.5 * 2.5;

pub(crate) fn step(view: &FrameView<'_>, gid: u32, a: &GpuActor, lod: bool) -> ActorStep {
    let frame = view.frame;
    let pos = a.pos();
    let mut vel = a.vel();
    let max_speed = a.position[3];
    let wander = a.goal[3];
    let mass = a.physics[2].max(0.1);
    let [sep_w, ali_w, coh_w, _] = a.boids;
    let [drag, stranded_gravity, depth_push, radius_sq] = frame.swimmer;
    let time = frame.time();
    let tick = frame.clock[0];

    let marine = a.extra[0] & FLAG_MARINE != 0;
    let in_water = marine || view.voxels.class_at(pos) == VoxelClass::Liquid;

    let done = |velocity: Vec3| ActorStep {
        velocity,
        prev_position: Vec3::truncate(a.prev_position),
        flyer_state: a.meta[2],
        stuck: 0,
        mode: MotionMode::Swim,
    };

    if marine {
        vel *= drag;
    }

    if !in_water {
        vel.y -= stranded_gravity;
        if view.voxels.blocks(pos - Vec3::new(0.0, 0.6, 0.0)) {
            vel.x *= 0.5;
            vel.z *= 0.5;
            if ((time * 20.0) as u32).wrapping_add(gid) % 15 == 0 {
                let flop = hash33(Vec3::new(gid as f32, time, 0.0));
                vel.x += flop.x * 0.15;
                vel.z += flop.z * 0.15;
                vel.y = 0.25;
            }
        }
        return done(vel.limit(max_speed * 3.0));
    }

    let mut acc = Vec3::ZERO;
    if !marine {
        vel *= drag;
        vel.y -= 0.001;
        if view.voxels.class_at(pos + Vec3::Y) == VoxelClass::Air {
            acc.y -= depth_push / mass;
        }
        if view.voxels.blocks(pos - Vec3::Y) {
            acc.y += depth_push / mass;
        }
    }
    acc += frame.wind() * if marine { 0.5 } else { 0.1 };

    if lod {
        acc += hash33(Vec3::new(gid as f32, time * 0.1, 0.0)) * 0.01;
    } else {
        let n = (pos.dot(Vec3::new(0.3, 0.7, 0.4)) + time * 0.3 + gid as f32).sin();
        let heading = Vec3::new((n * 5.0).cos(), (n * 3.0).sin() * 0.3, (n * 5.0).sin());
        acc += heading * (wander / mass);

        let count = frame.counts[0] as usize;
        let samples = count.min(FLOCK_SAMPLES as usize);
        let mut seed = gid.wrapping_add(tick.wrapping_mul(150));
        let mut sep = Vec3::ZERO;
        let mut ali = Vec3::ZERO;
        let mut coh = Vec3::ZERO;
        let mut neighbors = 0u32;
        for k in 0..samples {
            let i = if count < FLOCK_SAMPLES as usize {
                k
            } else {
                seed = next_rand(seed);
                seed as usize % count
            };
            if i == gid as usize {
                continue;
            }
            let other = &view.actors[i];
            if other.class_code() != ActorClass::Swimmer.code() {
                continue;
            }
            let o = other.pos();
            let d2 = pos.distance_squared(o);
            if d2 < radius_sq && d2 > 1e-5 {
                coh += o;
                ali += other.vel();
                if d2 < SEPARATION_RADIUS_SQ {
                    sep += (pos - o) / d2;
                }
                neighbors += 1;
            }
        }
        if neighbors > 0 {
            let k = neighbors as f32;
            coh = coh / k - pos;
            ali = ali / k;
            acc += sep.safe_normalize() * (sep_w / mass);
            acc += ali.safe_normalize() * (ali_w / mass);
            acc += coh.safe_normalize() * (coh_w / mass);
        }
    }

    let speed = vel.length();
    if !marine && speed > 0.01 {
        let fwd = vel / speed;
        if view.voxels.class_at(pos + fwd * 2.0) != VoxelClass::Liquid {
            acc -= fwd * (0.2 / mass);
            acc += hash33(Vec3::new(gid as f32, time, 1.0)) * 0.1;
        }
    }

    vel += acc;
    done(vel.limit(max_speed))
}
