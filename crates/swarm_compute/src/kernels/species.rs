//! Species overlay: scent gradients nudge velocity before the class kernel.

use swarm_shared::constants::NO_CHANNEL;
use swarm_shared::{BehaviorClass, IVec3, ScentChannel, Vec3};

use super::FrameView;
use crate::layout::GpuActor;

/// Central-difference gradient of one channel. Zero within one cell of the
/// grid boundary or outside it.
pub(crate) fn gradient(view: &FrameView<'_>, channel: ScentChannel, pos: Vec3) -> Vec3 {
    let layout = view.layout;
    let off = layout.scent_offset;
    let c = pos.floor();
    let p = IVec3::new(c.x - off, c.y - off, c.z - off);
    let last = layout.scent.size as i32 - 1;
    if p.x < 1 || p.y < 1 || p.z < 1 || p.x >= last || p.y >= last || p.z >= last {
        return Vec3::ZERO;
    }
    let base = channel.index() * layout.scent.volume();
    let at = |q: IVec3| view.scent[base + layout.scent.index_unchecked(q)];
    Vec3::new(
        at(IVec3::new(p.x + 1, p.y, p.z)) - at(IVec3::new(p.x - 1, p.y, p.z)),
        at(IVec3::new(p.x, p.y + 1, p.z)) - at(IVec3::new(p.x, p.y - 1, p.z)),
        at(IVec3::new(p.x, p.y, p.z + 1)) - at(IVec3::new(p.x, p.y, p.z - 1)),
    ) * 0.5
}

/// Velocity after blending the species steering into `a`'s velocity.
///
/// Returns the input untouched when no gradient term applies.
pub(crate) fn overlay(view: &FrameView<'_>, a: &GpuActor) -> Vec3 {
    let behavior = a.behavior();
    let pos = a.pos();
    let [familiarity, fear, aggression, _] = a.behavior;
    let preferred = if a.extra[1] == NO_CHANNEL {
        None
    } else {
        ScentChannel::from_index(a.extra[1])
    };

    let mut acc = Vec3::ZERO;
    let mut pull = |channel: ScentChannel, weight: f32| {
        let g = gradient(view, channel, pos);
        if g.length() > 0.001 {
            acc += g.safe_normalize() * weight;
        }
    };

    if let Some(channel) = preferred {
        pull(channel, 1.5);
    }
    if behavior == BehaviorClass::Predator {
        if preferred != Some(ScentChannel::Fish) {
            pull(ScentChannel::Fish, 2.0);
        }
        pull(ScentChannel::Prey, aggression);
    }
    if matches!(behavior, BehaviorClass::PreyWild | BehaviorClass::Livestock) {
        pull(ScentChannel::Predator, -3.0 * fear);
    }
    if behavior == BehaviorClass::Livestock {
        pull(ScentChannel::Herd, 0.5);
    }
    if familiarity > 0.3 {
        pull(ScentChannel::Player, familiarity * 0.5);
    }

    let vel = a.vel();
    if acc.length_squared() == 0.0 {
        return vel;
    }
    (vel + acc * view.frame.scent[2]).limit(a.position[3])
}
