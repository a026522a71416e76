//! Flyer: day/night forage cycle, attractor seeking, hover, FOV flocking,
//! cone-ray obstacle avoidance.
//!
//! ```text
//!   IDLE ──arrive forage──► GATHER ──chance──► RETURN ──arrive home──► HOME
//!    ▲                                           ▲                      │
//!    └──────────────── day and dry ──────────────┼──────────────────────┘
//!                       night or rain ───────────┘
//! ```

use swarm_shared::constants::{FLOCK_SAMPLES, FLYER_STUCK_LIMIT, NIGHT_END, NIGHT_START};
use swarm_shared::{AttractorKind, FlyerState, MotionMode, Vec3};

use super::common::{curl_noise, fibonacci_cone, hash33, in_fov, next_rand};
use super::{ActorStep, FrameView};
use crate::layout::GpuActor;

/// Stuck ticks before a flyer gets a kick; the timer resets at `FLYER_STUCK_LIMIT`.
const STUCK_KICK: u32 = 60;
const FORAGE_VIEW_SQ: f32 = 4096.0;
const FAMILIAR_MIN_SQ: f32 = 16.0;
const FAMILIAR_MAX_SQ: f32 = 6400.0;
const FLOCK_VIEW_SQ: f32 = 64.0;
const FLOCK_SEPARATION_SQ: f32 = 16.0;

/// Nearest usable attractor of `kind`: `(position, distance²)`.
fn nearest_attractor(view: &FrameView<'_>, pos: Vec3, kind: AttractorKind) -> Option<(Vec3, f32)> {
    let count = (view.frame.counts[1] as usize).min(view.attractors.len());
    view.attractors[..count]
        .iter()
        .filter(|t| t.meta[0] == kind.code())
        .filter(|t| kind == AttractorKind::Home || t.meta[1] == 0)
        .map(|t| {
            let p = Vec3::truncate(t.position);
            (p, pos.distance_squared(p))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

pub(crate) fn step(view: &FrameView<'_>, gid: u32, a: &GpuActor, lod: bool) -> ActorStep {
    let frame = view.frame;
    let pos = a.pos();
    let mut vel = a.vel();
    let max_speed = a.position[3];
    let wander = a.goal[3];
    let gravity = a.physics[0];
    let mass = a.physics[2].max(0.1);
    let fov_cos = a.physics[3];
    let familiarity = a.behavior[0];
    let [sep_w, ali_w, coh_w, _] = a.boids;
    let [drag, attraction, arrive_radius, gather_chance] = frame.flyer;
    let [hover_freq, hover_amp, lookahead, avoid_weight] = frame.flyer_ext;
    let time = frame.time();
    let tick = frame.clock[0];
    let world_time = frame.clock[1];
    let raining = frame.clock[2] != 0;

    let mut state = FlyerState::from_code(a.meta[2]);
    let mut stuck = a.meta[3];
    let mut prev = Vec3::truncate(a.prev_position);

    let go_home = (world_time > NIGHT_START && world_time < NIGHT_END) || raining;
    if go_home && !matches!(state, FlyerState::Home | FlyerState::Return) {
        state = FlyerState::Return;
    }
    if state == FlyerState::Home {
        if !go_home {
            state = FlyerState::Idle;
        }
        return ActorStep {
            velocity: Vec3::ZERO,
            prev_position: pos,
            flyer_state: state.code(),
            stuck: 0,
            mode: MotionMode::Idle,
        };
    }

    if matches!(state, FlyerState::Idle | FlyerState::Return) {
        if vel.length_squared() > 1e-4 && pos.distance_squared(prev) < 0.0025 {
            stuck += 1;
        } else {
            stuck = 0;
            if tick % 10 == 0 {
                prev = pos;
            }
        }
        if stuck > STUCK_KICK {
            let mut kick = hash33(Vec3::new(gid as f32, time, stuck as f32)) * 0.5;
            kick.y += 0.3;
            if stuck > FLYER_STUCK_LIMIT {
                stuck = 0;
            }
            return ActorStep {
                velocity: kick.limit(max_speed),
                prev_position: prev,
                flyer_state: FlyerState::Idle.code(),
                stuck,
                mode: MotionMode::Fly,
            };
        }
    } else {
        stuck = 0;
    }

    let mut acc = frame.wind();

    if !lod && familiarity > 0.0 {
        if let Some((player, d2)) = view.nearest_player(pos) {
            if d2 > FAMILIAR_MIN_SQ && d2 < FAMILIAR_MAX_SQ {
                acc += (player - pos).safe_normalize() * (familiarity * 2.0 / mass);
            }
        }
    }

    match state {
        FlyerState::Idle | FlyerState::Return if !lod => {
            let kind = if state == FlyerState::Idle && !go_home {
                AttractorKind::Forage
            } else {
                AttractorKind::Home
            };
            if state == FlyerState::Idle {
                acc += curl_noise(pos * 0.2, time) * (wander / mass);
            }
            let view_sq = if kind == AttractorKind::Home { f32::MAX } else { FORAGE_VIEW_SQ };
            match nearest_attractor(view, pos, kind) {
                Some((target, d2)) if d2 < view_sq => {
                    let seek = (target - pos).safe_normalize() * max_speed;
                    acc += (seek - vel) * (attraction / mass);
                    if d2.sqrt() < arrive_radius {
                        if kind == AttractorKind::Forage {
                            state = FlyerState::Gather;
                        } else {
                            return ActorStep {
                                velocity: Vec3::ZERO,
                                prev_position: pos,
                                flyer_state: FlyerState::Home.code(),
                                stuck: 0,
                                mode: MotionMode::Idle,
                            };
                        }
                    }
                }
                _ => {
                    if state == FlyerState::Return {
                        acc.y += 0.02 / mass;
                    }
                }
            }
        }
        FlyerState::Gather => {
            vel *= 0.9;
            vel.y += (time * hover_freq).sin() * hover_amp;
            let roll = hash33(Vec3::new(gid as f32, time, 2.0)).x * 0.5 + 0.5;
            if roll < gather_chance {
                state = FlyerState::Return;
            }
        }
        _ => {}
    }

    if !lod {
        let count = frame.counts[0] as usize;
        let samples = count.min(FLOCK_SAMPLES as usize);
        let fwd = vel.safe_normalize();
        let mut seed = gid.wrapping_add(tick.wrapping_mul(100));
        let mut sep = Vec3::ZERO;
        let mut ali = Vec3::ZERO;
        let mut coh = Vec3::ZERO;
        let mut neighbors = 0u32;
        let mut kin = 0u32;
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
            let diff = other.pos() - pos;
            let d2 = diff.length_squared();
            if d2 >= FLOCK_VIEW_SQ || d2 < 1e-5 || !in_fov(fwd, diff, fov_cos) {
                continue;
            }
            if d2 < FLOCK_SEPARATION_SQ {
                sep -= diff.safe_normalize() / d2;
            }
            if other.class_code() == a.class_code() {
                ali += other.vel();
                coh += other.pos();
                kin += 1;
            }
            neighbors += 1;
        }
        if neighbors > 0 {
            let steer = |v: Vec3, w: f32| (v.safe_normalize() * max_speed - vel) * (w / mass);
            if sep.length_squared() > 0.0 {
                acc += steer(sep, sep_w);
            }
            if kin > 0 {
                let k = kin as f32;
                acc += steer(ali / k, ali_w);
                acc += steer(coh / k - pos, coh_w);
            }
        }
    }

    acc.y -= gravity;
    vel += acc;
    vel *= drag;

    let speed_sq = vel.length_squared();
    if !lod && speed_sq > 1e-4 {
        let fwd = vel.safe_normalize();
        let rays = (speed_sq.sqrt() * 80.0).clamp(6.0, 32.0) as u32;
        let mut avoid = Vec3::ZERO;
        for i in 0..rays {
            let dir = fibonacci_cone(i, rays, fwd, 1.2);
            let d = view.voxels.cast_ray(pos, dir, lookahead);
            if d < lookahead {
                avoid -= dir * (lookahead - d);
            }
        }
        vel += avoid * (avoid_weight / mass);
    }

    ActorStep {
        velocity: vel.limit(max_speed),
        prev_position: prev,
        flyer_state: state.code(),
        stuck,
        mode: MotionMode::Fly,
    }
}
