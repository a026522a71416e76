//! Compute Shaders
//!
//! WGSL source for every device pass:
//! 1. Scent Inject - adds stimuli into the front buffer (single lane)
//! 2. Scent Diffuse - one diffusion + decay step, front → back
//! 3. Flow - `reset`, `seed`, `relax`, `vectors` entry points
//! 4. Behavior - species overlay + class kernels, one lane per actor
//! 5. Emit - marks emitting actors' cells in the front scent buffer
//!
//! The behavior module is assembled from chunks at pipeline creation; each
//! chunk mirrors one file under `kernels/`.
//!
//! ## DISPATCH INDEXING
//!
//! Every per-element pass runs `@workgroup_size(64)` and folds a 2D grid of
//! workgroups back to a linear index:
//!
//! ```text
//! idx = gid.x + gid.y * num_workgroups.x * 64
//! ```

/// Entry point of the single-entry modules.
pub const MAIN_ENTRY: &str = "main";

/// Flow module entry points in pass order.
pub const FLOW_ENTRIES: [&str; 4] = ["reset", "seed", "relax", "vectors"];

/// Shader source container
pub struct ComputeShaders;

impl ComputeShaders {
    /// Scent injection module
    #[must_use]
    pub fn scent_inject_shader() -> &'static str {
        SCENT_INJECT_WGSL
    }

    /// Scent diffusion module
    #[must_use]
    pub fn scent_diffuse_shader() -> &'static str {
        SCENT_DIFFUSE_WGSL
    }

    /// Flow field module (four entry points)
    #[must_use]
    pub fn flow_shader() -> &'static str {
        FLOW_WGSL
    }

    /// Behavior module, assembled
    #[must_use]
    pub fn behavior_shader() -> String {
        [
            TYPES_WGSL,
            HELPERS_WGSL,
            BEHAVIOR_BINDINGS_WGSL,
            WALKER_WGSL,
            SWIMMER_WGSL,
            FLYER_WGSL,
            BALLISTIC_WGSL,
            SPECIES_WGSL,
            BEHAVIOR_MAIN_WGSL,
        ]
        .concat()
    }

    /// Emission module, assembled
    #[must_use]
    pub fn emit_shader() -> String {
        [TYPES_WGSL, EMIT_WGSL].concat()
    }
}

const SCENT_INJECT_WGSL: &str = r#"
// Scent Inject
// One lane walks every stimulus so overlapping records add without races.

struct ScentParams {
    dims: vec4<u32>,              // scent size, voxel size, stimulus count, _
    origin: vec4<i32>,            // scent offset in the voxel window
    rates: array<vec4<f32>, 2>,
    decays: array<vec4<f32>, 2>,
    limits: vec4<f32>,            // ceiling
}

struct Stimulus {
    position: vec4<f32>,          // xyz, magnitude
    info: vec4<u32>,              // channel
}

@group(0) @binding(0) var<storage, read_write> scent: array<f32>;
@group(0) @binding(1) var<storage, read> stimuli: array<Stimulus>;
@group(0) @binding(2) var<uniform> params: ScentParams;

@compute @workgroup_size(1)
fn main() {
    let s = i32(params.dims.x);
    let vol = s * s * s;
    let count = min(params.dims.z, arrayLength(&stimuli));
    for (var i = 0u; i < count; i = i + 1u) {
        let st = stimuli[i];
        let ch = st.info.x;
        if (ch >= 8u) {
            continue;
        }
        let c = vec3<i32>(floor(st.position.xyz)) - params.origin.xyz;
        if (any(c < vec3<i32>(0)) || any(c >= vec3<i32>(s))) {
            continue;
        }
        let idx = i32(ch) * vol + c.x + c.z * s + c.y * s * s;
        scent[idx] = clamp(scent[idx] + st.position.w, 0.0, params.limits.x);
    }
}
"#;

const SCENT_DIFFUSE_WGSL: &str = r#"
// Scent Diffuse
// Missing neighbors (outside, solid) contribute the center value.

struct ScentParams {
    dims: vec4<u32>,
    origin: vec4<i32>,
    rates: array<vec4<f32>, 2>,
    decays: array<vec4<f32>, 2>,
    limits: vec4<f32>,
}

@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<storage, read> voxels: array<u32>;
@group(0) @binding(3) var<uniform> params: ScentParams;

fn solid_at(c: vec3<i32>) -> bool {
    let v = i32(params.dims.y);
    let p = c + params.origin.xyz;
    let k = voxels[p.x + p.z * v + p.y * v * v];
    return k == 1u || k > 4u;
}

fn rate(ch: u32) -> f32 {
    return params.rates[ch / 4u][ch % 4u];
}

fn decay(ch: u32) -> f32 {
    return params.decays[ch / 4u][ch % 4u];
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
    let cell = id.x + id.y * groups.x * 64u;
    let s = i32(params.dims.x);
    let vol = u32(s * s * s);
    if (cell >= vol) {
        return;
    }
    let ci = i32(cell);
    let c = vec3<i32>(ci % s, ci / (s * s), (ci / s) % s);

    if (solid_at(c)) {
        for (var ch = 0u; ch < 8u; ch = ch + 1u) {
            dst[ch * vol + cell] = 0.0;
        }
        return;
    }

    var offsets = array<vec3<i32>, 6>(
        vec3<i32>(1, 0, 0), vec3<i32>(-1, 0, 0),
        vec3<i32>(0, 1, 0), vec3<i32>(0, -1, 0),
        vec3<i32>(0, 0, 1), vec3<i32>(0, 0, -1),
    );
    var open: array<i32, 6>;
    for (var k = 0; k < 6; k = k + 1) {
        let n = c + offsets[k];
        open[k] = -1;
        if (all(n >= vec3<i32>(0)) && all(n < vec3<i32>(s)) && !solid_at(n)) {
            open[k] = n.x + n.z * s + n.y * s * s;
        }
    }

    for (var ch = 0u; ch < 8u; ch = ch + 1u) {
        let base = i32(ch * vol);
        let center = src[base + ci];
        var sum = 0.0;
        for (var k = 0; k < 6; k = k + 1) {
            if (open[k] < 0) {
                sum += center;
            } else {
                sum += src[base + open[k]];
            }
        }
        let mean = sum / 6.0;
        let next = (center + rate(ch) * (mean - center)) * decay(ch);
        dst[base + ci] = clamp(next, 0.0, params.limits.x);
    }
}
"#;

const FLOW_WGSL: &str = r#"
// Flow Field
// reset → seed → relax × N → vectors, one field per submission.

struct FlowParams {
    dims: vec4<u32>,              // grid size, target count, field index, _
}

const UNREACHABLE: u32 = 65535u;
const MAX_TARGETS: u32 = 64u;

@group(0) @binding(0) var<storage, read_write> cost: array<u32>;
@group(0) @binding(1) var<storage, read_write> dirs: array<u32>;
@group(0) @binding(2) var<storage, read> voxels: array<u32>;
@group(0) @binding(3) var<storage, read> targets: array<vec4<i32>>;
@group(0) @binding(4) var<uniform> params: FlowParams;

fn volume() -> u32 {
    let s = params.dims.x;
    return s * s * s;
}

fn field_base() -> u32 {
    return params.dims.z * volume();
}

fn coords(cell: u32) -> vec3<i32> {
    let s = params.dims.x;
    return vec3<i32>(i32(cell % s), i32(cell / (s * s)), i32((cell / s) % s));
}

fn index_of(c: vec3<i32>) -> i32 {
    let s = i32(params.dims.x);
    if (any(c < vec3<i32>(0)) || any(c >= vec3<i32>(s))) {
        return -1;
    }
    return c.x + c.z * s + c.y * s * s;
}

// 0 = impassable
fn step_cost(k: u32) -> u32 {
    if (k == 0u) {
        return 1u;
    }
    if (k == 2u) {
        return 10u;
    }
    return 0u;
}

fn cell_index(id: vec3<u32>, groups: vec3<u32>) -> u32 {
    return id.x + id.y * groups.x * 64u;
}

@compute @workgroup_size(64)
fn reset(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
    let cell = cell_index(id, groups);
    if (cell >= volume()) {
        return;
    }
    cost[field_base() + cell] = UNREACHABLE;
    dirs[field_base() + cell] = 0u;
}

@compute @workgroup_size(1)
fn seed() {
    let start = params.dims.z * MAX_TARGETS;
    for (var i = 0u; i < min(params.dims.y, MAX_TARGETS); i = i + 1u) {
        let idx = index_of(targets[start + i].xyz);
        if (idx >= 0 && step_cost(voxels[idx]) != 0u) {
            cost[field_base() + u32(idx)] = 0u;
        }
    }
}

@compute @workgroup_size(64)
fn relax(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
    let cell = cell_index(id, groups);
    if (cell >= volume()) {
        return;
    }
    let stride = step_cost(voxels[cell]);
    if (stride == 0u) {
        return;
    }
    var offsets = array<vec3<i32>, 6>(
        vec3<i32>(1, 0, 0), vec3<i32>(-1, 0, 0),
        vec3<i32>(0, 1, 0), vec3<i32>(0, -1, 0),
        vec3<i32>(0, 0, 1), vec3<i32>(0, 0, -1),
    );
    let base = field_base();
    let c = coords(cell);
    var best = UNREACHABLE;
    for (var k = 0; k < 6; k = k + 1) {
        let n = index_of(c + offsets[k]);
        if (n >= 0) {
            best = min(best, cost[base + u32(n)]);
        }
    }
    if (best >= UNREACHABLE) {
        return;
    }
    let candidate = min(best + stride, UNREACHABLE - 1u);
    if (candidate < cost[base + cell]) {
        cost[base + cell] = candidate;
    }
}

@compute @workgroup_size(64)
fn vectors(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
    let cell = cell_index(id, groups);
    if (cell >= volume()) {
        return;
    }
    let base = field_base();
    let own = cost[base + cell];
    if (own == 0u || own >= UNREACHABLE || step_cost(voxels[cell]) == 0u) {
        dirs[base + cell] = 0u;
        return;
    }
    var offsets = array<vec3<i32>, 6>(
        vec3<i32>(1, 0, 0), vec3<i32>(-1, 0, 0),
        vec3<i32>(0, 1, 0), vec3<i32>(0, -1, 0),
        vec3<i32>(0, 0, 1), vec3<i32>(0, 0, -1),
    );
    let c = coords(cell);
    var best = own;
    var code = 0u;
    for (var k = 0; k < 6; k = k + 1) {
        let n = index_of(c + offsets[k]);
        if (n >= 0 && cost[base + u32(n)] < best) {
            best = cost[base + u32(n)];
            code = u32(k) + 1u;
        }
    }
    dirs[base + cell] = code;
}
"#;

const TYPES_WGSL: &str = r#"
// Shared layouts and frame queries

struct Frame {
    grid: vec4<i32>,              // voxel size, scent size, scent offset, _
    counts: vec4<u32>,            // actors, attractors, players, flow mask
    clock: vec4<u32>,             // tick, world time, raining, seed
    env: vec4<f32>,               // wind xyz, rain
    scent: vec4<f32>,             // marker, ceiling, overlay blend, lod²
    walker: vec4<f32>,            // accel, ground friction, air friction, wander chance
    swimmer: vec4<f32>,           // drag, stranded gravity, depth push, flock radius²
    flyer: vec4<f32>,             // drag, attraction, arrive radius, gather chance
    flyer_ext: vec4<f32>,         // hover freq, hover amp, avoid lookahead, avoid weight
    ballistic: vec4<f32>,         // item gravity, xp gravity, xp homing, xp radius²
    players: array<vec4<f32>, 8>,
}

struct Actor {
    position: vec4<f32>,          // xyz, max speed
    velocity: vec4<f32>,          // xyz, command
    goal: vec4<f32>,              // xyz, wander
    physics: vec4<f32>,           // gravity, jump, mass, fov cos
    behavior: vec4<f32>,          // familiarity, fear, aggression, _
    boids: vec4<f32>,             // separation, alignment, cohesion, _
    prev_position: vec4<f32>,
    info: vec4<u32>,              // class, behavior, flyer state, stuck
    extra: vec4<u32>,             // flags, preferred channel, seed
}

struct ActorOutput {
    velocity: vec4<f32>,
    prev_position: vec4<f32>,
    state: vec4<u32>,             // flyer state, stuck, mode, _
}

struct Attractor {
    position: vec4<f32>,
    info: vec4<u32>,              // kind, claimed
}

const CLASS_FLYER: u32 = 0u;
const CLASS_ITEM: u32 = 1u;
const CLASS_XP: u32 = 2u;
const CLASS_WALKER: u32 = 4u;
const CLASS_SWIMMER: u32 = 5u;

const BEHAVIOR_GENERIC: u32 = 0u;
const BEHAVIOR_LIVESTOCK: u32 = 1u;
const BEHAVIOR_PREDATOR: u32 = 2u;
const BEHAVIOR_PREY_WILD: u32 = 3u;
const BEHAVIOR_FISH: u32 = 4u;
const BEHAVIOR_PET: u32 = 5u;

const MODE_IDLE: u32 = 0u;
const MODE_WANDER: u32 = 1u;
const MODE_FLOW: u32 = 2u;
const MODE_GOAL: u32 = 3u;
const MODE_FLEE: u32 = 4u;
const MODE_SWIM: u32 = 5u;
const MODE_FLY: u32 = 6u;
const MODE_FALL: u32 = 7u;

const STATE_IDLE: u32 = 0u;
const STATE_GATHER: u32 = 1u;
const STATE_RETURN: u32 = 2u;
const STATE_HOME: u32 = 3u;

const VOXEL_AIR: u32 = 0u;
const VOXEL_LIQUID: u32 = 2u;

const CH_FISH: u32 = 2u;
const CH_PREDATOR: u32 = 4u;
const CH_PREY: u32 = 5u;
const CH_HERD: u32 = 6u;
const CH_PLAYER: u32 = 7u;
const SCENT_CHANNELS: u32 = 8u;
const NO_CHANNEL: u32 = 0xffffffffu;

const FLAG_MARINE: u32 = 2u;

// xyz = position, w = distance² (negative when there are no players)
fn nearest_player(pos: vec3<f32>) -> vec4<f32> {
    var best = vec4<f32>(0.0, 0.0, 0.0, -1.0);
    let count = min(frame.counts.z, 8u);
    for (var i = 0u; i < count; i = i + 1u) {
        let p = frame.players[i].xyz;
        let d = p - pos;
        let d2 = dot(d, d);
        if (best.w < 0.0 || d2 < best.w) {
            best = vec4<f32>(p, d2);
        }
    }
    return best;
}

fn is_lod(pos: vec3<f32>) -> bool {
    let p = nearest_player(pos);
    return p.w < 0.0 || p.w > frame.scent.w;
}

fn linear_id(id: vec3<u32>, groups: vec3<u32>) -> u32 {
    return id.x + id.y * groups.x * 64u;
}
"#;

const HELPERS_WGSL: &str = r#"
// Hashing, noise, steering math

const GOLDEN_ANGLE: f32 = 2.399963;

fn safe_normalize(v: vec3<f32>) -> vec3<f32> {
    let l2 = dot(v, v);
    if (l2 < 1e-8 || !(l2 <= 3.4e38)) {
        return vec3<f32>(0.0);
    }
    return v * inverseSqrt(l2);
}

fn limit_len(v: vec3<f32>, m: f32) -> vec3<f32> {
    let l2 = dot(v, v);
    if (l2 > m * m && l2 > 1e-6) {
        return v * (m / sqrt(l2));
    }
    return v;
}

fn hash33(p: vec3<f32>) -> vec3<f32> {
    let q = vec3<f32>(
        dot(p, vec3<f32>(127.1, 311.7, 74.7)),
        dot(p, vec3<f32>(269.5, 183.3, 246.1)),
        dot(p, vec3<f32>(113.5, 271.9, 124.6)),
    );
    return fract(sin(q) * 43758.545) * 2.0 - vec3<f32>(1.0);
}

fn next_rand(s: u32) -> u32 {
    return s * 1664525u + 1013904223u;
}

fn pcg(v: u32) -> u32 {
    let state = v * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn rand01(v: u32) -> f32 {
    return f32(pcg(v) >> 8u) / 16777216.0;
}

fn curl_noise(p: vec3<f32>, time: f32) -> vec3<f32> {
    let e = 0.1;
    let pt = p + vec3<f32>(0.0, time * 0.5, 0.0);
    let n0 = hash33(pt);
    let dx = hash33(pt + vec3<f32>(e, 0.0, 0.0));
    let dy = hash33(pt + vec3<f32>(0.0, e, 0.0));
    let dz = hash33(pt + vec3<f32>(0.0, 0.0, e));
    return safe_normalize(vec3<f32>(
        (dy.z - n0.z) - (dz.y - n0.y),
        (dz.x - n0.x) - (dx.z - n0.z),
        (dx.y - n0.y) - (dy.x - n0.x),
    ));
}

fn in_fov(fwd: vec3<f32>, diff: vec3<f32>, fov_cos: f32) -> bool {
    return dot(fwd, safe_normalize(diff)) > fov_cos;
}

fn fibonacci_cone(i: u32, n: u32, fwd: vec3<f32>, spread: f32) -> vec3<f32> {
    let denom = f32(max(n, 2u) - 1u);
    let z = 1.0 - (f32(i) / denom) * spread;
    let r = sqrt(max(1.0 - z * z, 0.0));
    let theta = GOLDEN_ANGLE * f32(i);
    var up0 = vec3<f32>(0.0, 1.0, 0.0);
    if (abs(fwd.y) >= 0.99) {
        up0 = vec3<f32>(1.0, 0.0, 0.0);
    }
    let right = safe_normalize(cross(up0, fwd));
    let up = cross(fwd, right);
    return right * (cos(theta) * r) + up * (sin(theta) * r) + fwd * z;
}
"#;

const BEHAVIOR_BINDINGS_WGSL: &str = r#"
// Behavior bindings, voxel queries, scent and flow sampling

@group(0) @binding(0) var<storage, read> actors: array<Actor>;
@group(0) @binding(1) var<storage, read_write> outputs: array<ActorOutput>;
@group(0) @binding(2) var<storage, read> voxels: array<u32>;
@group(0) @binding(3) var<storage, read> scent: array<f32>;
@group(0) @binding(4) var<storage, read> flow_dirs: array<u32>;
@group(0) @binding(5) var<storage, read> attractors: array<Attractor>;
@group(0) @binding(6) var<uniform> frame: Frame;

const RAY_MAX_STEPS: u32 = 64u;

fn voxel_index(c: vec3<i32>) -> i32 {
    let s = frame.grid.x;
    if (any(c < vec3<i32>(0)) || any(c >= vec3<i32>(s))) {
        return -1;
    }
    return c.x + c.z * s + c.y * s * s;
}

// Outside the window reads as air.
fn voxel_class(p: vec3<f32>) -> u32 {
    let i = voxel_index(vec3<i32>(floor(p)));
    if (i < 0) {
        return VOXEL_AIR;
    }
    return voxels[i];
}

fn class_blocks(k: u32) -> bool {
    return k == 1u || k == 3u || k > 4u;
}

fn blocks(p: vec3<f32>) -> bool {
    return class_blocks(voxel_class(p));
}

fn inv_step(d: f32) -> f32 {
    if (abs(d) < 1e-6) {
        return 1e30;
    }
    return abs(1.0 / d);
}

fn side_dist(s: f32, c: i32, d: f32, dd: f32) -> f32 {
    if (d < 0.0) {
        return (s - f32(c)) * dd;
    }
    return (f32(c) + 1.0 - s) * dd;
}

fn cast_ray(start: vec3<f32>, dir: vec3<f32>, max_dist: f32) -> f32 {
    let delta = vec3<f32>(inv_step(dir.x), inv_step(dir.y), inv_step(dir.z));
    var cell = vec3<i32>(floor(start));
    let stride = vec3<i32>(select(1i, -1i, dir.x < 0.0), select(1i, -1i, dir.y < 0.0), select(1i, -1i, dir.z < 0.0));
    var side = vec3<f32>(
        side_dist(start.x, cell.x, dir.x, delta.x),
        side_dist(start.y, cell.y, dir.y, delta.y),
        side_dist(start.z, cell.z, dir.z, delta.z),
    );
    var dist = 0.0;
    for (var n = 0u; n < RAY_MAX_STEPS && dist < max_dist; n = n + 1u) {
        if (side.x < side.y && side.x < side.z) {
            dist = side.x;
            side.x += delta.x;
            cell.x += stride.x;
        } else if (side.y < side.z) {
            dist = side.y;
            side.y += delta.y;
            cell.y += stride.y;
        } else {
            dist = side.z;
            side.z += delta.z;
            cell.z += stride.z;
        }
        if (dist >= max_dist) {
            break;
        }
        let i = voxel_index(cell);
        if (i >= 0 && class_blocks(voxels[i])) {
            return dist;
        }
    }
    return max_dist;
}

fn scent_at(ch: u32, c: vec3<i32>) -> f32 {
    let s = frame.grid.y;
    return scent[i32(ch) * s * s * s + c.x + c.z * s + c.y * s * s];
}

// Zero within one cell of the scent grid boundary.
fn gradient(ch: u32, pos: vec3<f32>) -> vec3<f32> {
    let c = vec3<i32>(floor(pos)) - vec3<i32>(frame.grid.z);
    let last = frame.grid.y - 1;
    if (any(c < vec3<i32>(1)) || any(c >= vec3<i32>(last))) {
        return vec3<f32>(0.0);
    }
    return 0.5 * vec3<f32>(
        scent_at(ch, c + vec3<i32>(1, 0, 0)) - scent_at(ch, c - vec3<i32>(1, 0, 0)),
        scent_at(ch, c + vec3<i32>(0, 1, 0)) - scent_at(ch, c - vec3<i32>(0, 1, 0)),
        scent_at(ch, c + vec3<i32>(0, 0, 1)) - scent_at(ch, c - vec3<i32>(0, 0, 1)),
    );
}

fn direction_vector(code: u32) -> vec3<f32> {
    switch code {
        case 1u: { return vec3<f32>(1.0, 0.0, 0.0); }
        case 2u: { return vec3<f32>(-1.0, 0.0, 0.0); }
        case 3u: { return vec3<f32>(0.0, 1.0, 0.0); }
        case 4u: { return vec3<f32>(0.0, -1.0, 0.0); }
        case 5u: { return vec3<f32>(0.0, 0.0, 1.0); }
        case 6u: { return vec3<f32>(0.0, 0.0, -1.0); }
        default: { return vec3<f32>(0.0); }
    }
}

fn flow_at(field: u32, pos: vec3<f32>) -> vec3<f32> {
    if ((frame.counts.w & (1u << field)) == 0u) {
        return vec3<f32>(0.0);
    }
    let i = voxel_index(vec3<i32>(floor(pos)));
    if (i < 0) {
        return vec3<f32>(0.0);
    }
    let s = frame.grid.x;
    return direction_vector(flow_dirs[i32(field) * s * s * s + i]);
}

fn consumer_flow(behavior: u32, pos: vec3<f32>) -> vec3<f32> {
    if (behavior == BEHAVIOR_PREY_WILD) {
        return -flow_at(0u, pos);
    }
    if (behavior == BEHAVIOR_LIVESTOCK) {
        return flow_at(2u, pos);
    }
    if (behavior == BEHAVIOR_FISH) {
        return vec3<f32>(0.0);
    }
    let toward = flow_at(0u, pos);
    if (dot(toward, toward) > 0.0) {
        return toward;
    }
    return flow_at(1u, pos);
}
"#;

const WALKER_WGSL: &str = r#"
// Walker

const PROBE_DISTANCE: f32 = 4.0;
const BLOCKED: f32 = -1000.0;
const WANDER_WINDOW: u32 = 40u;
const WALKER_STUCK_LIMIT: u32 = 60u;

fn evaluate_pos(p: vec3<f32>) -> f32 {
    var score = 0.0;
    if (blocks(p + vec3<f32>(0.0, 0.5, 0.0))) {
        score += BLOCKED;
    }
    if (blocks(p + vec3<f32>(0.0, 1.5, 0.0))) {
        score += BLOCKED;
    }
    let ground = blocks(p - vec3<f32>(0.0, 0.5, 0.0));
    let drop = blocks(p - vec3<f32>(0.0, 1.5, 0.0));
    let support = select(0.0, 1.0, ground) + select(0.0, 1.0, drop);
    score += BLOCKED * (1.0 - min(support, 1.0));
    if (!ground && drop) {
        score -= 5.0;
    }
    return score;
}

fn best_direction(start: vec3<f32>, want: vec3<f32>) -> vec3<f32> {
    let can_jump = !blocks(start + vec3<f32>(0.0, 2.0, 0.0));
    var best = vec3<f32>(0.0);
    var max_score = -3.4e38;
    for (var x = -1; x <= 1; x = x + 1) {
        for (var z = -1; z <= 1; z = z + 1) {
            if (x == 0 && z == 0) {
                continue;
            }
            let dir = safe_normalize(vec3<f32>(f32(x), 0.0, f32(z)));
            let next = start + dir * 0.8;
            let walk = evaluate_pos(next);
            var jump = evaluate_pos(next + vec3<f32>(0.0, 1.0, 0.0)) - 10.0;
            if (!can_jump) {
                jump -= 2000.0;
            }
            let score = dot(dir, want) * 2.0 + max(walk, jump);
            if (score > max_score) {
                max_score = score;
                best = dir;
                best.y = select(0.0, 1.0, jump > walk && jump > -500.0);
            }
        }
    }
    if (max_score < -100.0) {
        return vec3<f32>(0.0);
    }
    return best;
}

fn walker_step(gid: u32, a: Actor, flow: vec3<f32>) -> ActorOutput {
    let pos = a.position.xyz;
    var vel = a.velocity.xyz;
    let max_speed = a.position.w;
    let command = a.velocity.w;
    let goal = a.goal.xyz;
    let gravity = a.physics.x;
    let jump_power = a.physics.y;
    let mass = max(a.physics.z, 0.1);
    let tick = frame.clock.x;

    let in_liquid = voxel_class(pos) == VOXEL_LIQUID;
    let dist_ground = cast_ray(pos, vec3<f32>(0.0, -1.0, 0.0), PROBE_DISTANCE);
    let dist_ceiling = cast_ray(pos, vec3<f32>(0.0, 1.0, 0.0), PROBE_DISTANCE);
    let center_grounded = dist_ground < 2.0;
    let solid_ground = dist_ground < 0.6;
    let low_ceiling = dist_ceiling < 2.0;

    var should_move = false;
    var want = vec3<f32>(0.0);
    var speed_mult = 1.0;
    var mode = MODE_IDLE;

    if (command >= 0.5) {
        if (distance(pos, goal) >= 1.0) {
            should_move = true;
            want = safe_normalize(goal - pos);
            if (command >= 1.5) {
                speed_mult = 2.0;
                mode = MODE_FLEE;
            } else {
                mode = MODE_GOAL;
            }
        }
    } else if (dot(flow, flow) > 0.01) {
        should_move = true;
        want = safe_normalize(flow);
        mode = MODE_FLOW;
    } else {
        let window = tick / WANDER_WINDOW;
        let roll = pcg(a.extra.z * 7919u + window);
        if (rand01(roll) < frame.walker.w) {
            let angle = rand01(roll ^ 0x9e3779b9u) * 6.2831855;
            should_move = true;
            want = vec3<f32>(cos(angle), 0.0, sin(angle));
            speed_mult = 0.5;
            mode = MODE_WANDER;
        }
    }

    var desired = vec3<f32>(0.0);
    if (should_move && (center_grounded || in_liquid)) {
        var dir = best_direction(pos, want);
        let jump_requested = dir.y > 0.5;
        dir.y = 0.0;
        if (dot(dir, dir) > 0.01) {
            desired = safe_normalize(dir) * (max_speed * speed_mult);
            if (jump_requested && !low_ceiling && !in_liquid && solid_ground) {
                vel.y = jump_power;
            }
        }
    }

    var acc = frame.env.xyz;
    if (in_liquid) {
        vel.y += 0.02;
        vel *= 0.8;
    } else if (solid_ground && vel.y <= 0.0) {
        vel.y = 0.0;
    } else {
        acc.y -= gravity;
    }

    if (vel.y > 0.0 && dist_ceiling < vel.y + 0.5) {
        vel.y = -0.1;
    }

    let moving = dot(desired, desired) > 0.001;
    if (moving) {
        vel.x += (desired.x - vel.x) * frame.walker.x / mass;
        vel.z += (desired.z - vel.z) * frame.walker.x / mass;
    } else {
        let keep = 1.0 - select(frame.walker.z, frame.walker.y, solid_ground);
        vel.x *= keep;
        vel.z *= keep;
    }
    vel += acc;

    if (vel.x * vel.x + vel.z * vel.z < 0.001) {
        vel.x = 0.0;
        vel.z = 0.0;
    }

    let prev = a.prev_position.xyz;
    let moved = pos - prev;
    var stuck = 0u;
    if (moving && !in_liquid && dot(moved, moved) < 1e-4) {
        stuck = a.info.w + 1u;
    }
    var prev_out = prev;
    if (tick % 10u == 0u) {
        prev_out = pos;
    }

    if (stuck > WALKER_STUCK_LIMIT) {
        let seed = f32(tick) + f32(gid);
        let jitter = fract(sin(seed) * 43758.545) - 0.5;
        if (center_grounded && !low_ceiling && dist_ceiling > 1.5) {
            vel.y = 0.25;
            vel.x += jitter * 0.4;
            vel.z += (fract(cos(seed) * 12345.679) - 0.5) * 0.4;
        } else {
            vel.x += select(0.1, -0.1, jitter < 0.0);
        }
        stuck = 0u;
    }

    return ActorOutput(
        vec4<f32>(limit_len(vel, max_speed * 3.0), 0.0),
        vec4<f32>(prev_out, 0.0),
        vec4<u32>(a.info.z, stuck, mode, 0u),
    );
}
"#;

const SWIMMER_WGSL: &str = r#"
// Swimmer

const FLOCK_SAMPLES: u32 = 32u;
const SWIM_SEPARATION_SQ: f32 = 6.25;

fn swim_output(a: Actor, v: vec3<f32>) -> ActorOutput {
    return ActorOutput(
        vec4<f32>(v, 0.0),
        vec4<f32>(a.prev_position.xyz, 0.0),
        vec4<u32>(a.info.z, 0u, MODE_SWIM, 0u),
    );
}

fn swimmer_step(gid: u32, a: Actor, lod: bool) -> ActorOutput {
    let pos = a.position.xyz;
    var vel = a.velocity.xyz;
    let max_speed = a.position.w;
    let wander = a.goal.w;
    let mass = max(a.physics.z, 0.1);
    let time = f32(frame.clock.x);
    let tick = frame.clock.x;

    let marine = (a.extra.x & FLAG_MARINE) != 0u;
    let in_water = marine || voxel_class(pos) == VOXEL_LIQUID;

    if (marine) {
        vel *= frame.swimmer.x;
    }

    if (!in_water) {
        vel.y -= frame.swimmer.y;
        if (blocks(pos - vec3<f32>(0.0, 0.6, 0.0))) {
            vel.x *= 0.5;
            vel.z *= 0.5;
            if ((u32(time * 20.0) + gid) % 15u == 0u) {
                let flop = hash33(vec3<f32>(f32(gid), time, 0.0));
                vel.x += flop.x * 0.15;
                vel.z += flop.z * 0.15;
                vel.y = 0.25;
            }
        }
        return swim_output(a, limit_len(vel, max_speed * 3.0));
    }

    var acc = vec3<f32>(0.0);
    if (!marine) {
        vel *= frame.swimmer.x;
        vel.y -= 0.001;
        if (voxel_class(pos + vec3<f32>(0.0, 1.0, 0.0)) == VOXEL_AIR) {
            acc.y -= frame.swimmer.z / mass;
        }
        if (blocks(pos - vec3<f32>(0.0, 1.0, 0.0))) {
            acc.y += frame.swimmer.z / mass;
        }
    }
    acc += frame.env.xyz * select(0.1, 0.5, marine);

    if (lod) {
        acc += hash33(vec3<f32>(f32(gid), time * 0.1, 0.0)) * 0.01;
    } else {
        let n = sin(dot(pos, vec3<f32>(0.3, 0.7, 0.4)) + time * 0.3 + f32(gid));
        let heading = vec3<f32>(cos(n * 5.0), sin(n * 3.0) * 0.3, sin(n * 5.0));
        acc += heading * (wander / mass);

        let count = frame.counts.x;
        let samples = min(count, FLOCK_SAMPLES);
        var seed = gid + tick * 150u;
        var sep = vec3<f32>(0.0);
        var ali = vec3<f32>(0.0);
        var coh = vec3<f32>(0.0);
        var neighbors = 0u;
        for (var k = 0u; k < samples; k = k + 1u) {
            var i = k;
            if (count >= FLOCK_SAMPLES) {
                seed = next_rand(seed);
                i = seed % count;
            }
            if (i == gid) {
                continue;
            }
            let other = actors[i];
            if (other.info.x != CLASS_SWIMMER) {
                continue;
            }
            let o = other.position.xyz;
            let d = pos - o;
            let d2 = dot(d, d);
            if (d2 < frame.swimmer.w && d2 > 1e-5) {
                coh += o;
                ali += other.velocity.xyz;
                if (d2 < SWIM_SEPARATION_SQ) {
                    sep += d / d2;
                }
                neighbors += 1u;
            }
        }
        if (neighbors > 0u) {
            let k = f32(neighbors);
            coh = coh / k - pos;
            ali = ali / k;
            acc += safe_normalize(sep) * (a.boids.x / mass);
            acc += safe_normalize(ali) * (a.boids.y / mass);
            acc += safe_normalize(coh) * (a.boids.z / mass);
        }
    }

    let speed = length(vel);
    if (!marine && speed > 0.01) {
        let fwd = vel / speed;
        if (voxel_class(pos + fwd * 2.0) != VOXEL_LIQUID) {
            acc -= fwd * (0.2 / mass);
            acc += hash33(vec3<f32>(f32(gid), time, 1.0)) * 0.1;
        }
    }

    vel += acc;
    return swim_output(a, limit_len(vel, max_speed));
}
"#;

const FLYER_WGSL: &str = r#"
// Flyer

const NIGHT_START: u32 = 13000u;
const NIGHT_END: u32 = 23000u;
const FLYER_STUCK_KICK: u32 = 60u;
const FLYER_STUCK_LIMIT: u32 = 80u;
const ATTRACTOR_FORAGE: u32 = 1u;
const ATTRACTOR_HOME: u32 = 2u;
const FORAGE_VIEW_SQ: f32 = 4096.0;
const FAMILIAR_MIN_SQ: f32 = 16.0;
const FAMILIAR_MAX_SQ: f32 = 6400.0;
const FLOCK_VIEW_SQ: f32 = 64.0;
const FLOCK_SEPARATION_SQ: f32 = 16.0;

// xyz = position, w = distance² (negative when none)
fn nearest_attractor(pos: vec3<f32>, kind: u32) -> vec4<f32> {
    var best = vec4<f32>(0.0, 0.0, 0.0, -1.0);
    let count = min(frame.counts.y, arrayLength(&attractors));
    for (var i = 0u; i < count; i = i + 1u) {
        let t = attractors[i];
        if (t.info.x != kind) {
            continue;
        }
        if (kind == ATTRACTOR_FORAGE && t.info.y != 0u) {
            continue;
        }
        let d = t.position.xyz - pos;
        let d2 = dot(d, d);
        if (best.w < 0.0 || d2 < best.w) {
            best = vec4<f32>(t.position.xyz, d2);
        }
    }
    return best;
}

fn flyer_step(gid: u32, a: Actor, lod: bool) -> ActorOutput {
    let pos = a.position.xyz;
    var vel = a.velocity.xyz;
    let max_speed = a.position.w;
    let wander = a.goal.w;
    let gravity = a.physics.x;
    let mass = max(a.physics.z, 0.1);
    let fov_cos = a.physics.w;
    let familiarity = a.behavior.x;
    let time = f32(frame.clock.x);
    let tick = frame.clock.x;
    let world_time = frame.clock.y;
    let raining = frame.clock.z != 0u;

    var state = a.info.z;
    if (state > STATE_HOME) {
        state = STATE_IDLE;
    }
    var stuck = a.info.w;
    var prev = a.prev_position.xyz;

    let go_home = (world_time > NIGHT_START && world_time < NIGHT_END) || raining;
    if (go_home && state != STATE_HOME && state != STATE_RETURN) {
        state = STATE_RETURN;
    }
    if (state == STATE_HOME) {
        if (!go_home) {
            state = STATE_IDLE;
        }
        return ActorOutput(vec4<f32>(0.0), vec4<f32>(pos, 0.0), vec4<u32>(state, 0u, MODE_IDLE, 0u));
    }

    if (state == STATE_IDLE || state == STATE_RETURN) {
        let moved = pos - prev;
        if (dot(vel, vel) > 1e-4 && dot(moved, moved) < 0.0025) {
            stuck += 1u;
        } else {
            stuck = 0u;
            if (tick % 10u == 0u) {
                prev = pos;
            }
        }
        if (stuck > FLYER_STUCK_KICK) {
            var kick = hash33(vec3<f32>(f32(gid), time, f32(stuck))) * 0.5;
            kick.y += 0.3;
            if (stuck > FLYER_STUCK_LIMIT) {
                stuck = 0u;
            }
            return ActorOutput(
                vec4<f32>(limit_len(kick, max_speed), 0.0),
                vec4<f32>(prev, 0.0),
                vec4<u32>(STATE_IDLE, stuck, MODE_FLY, 0u),
            );
        }
    } else {
        stuck = 0u;
    }

    var acc = frame.env.xyz;

    if (!lod && familiarity > 0.0) {
        let p = nearest_player(pos);
        if (p.w > FAMILIAR_MIN_SQ && p.w < FAMILIAR_MAX_SQ) {
            acc += safe_normalize(p.xyz - pos) * (familiarity * 2.0 / mass);
        }
    }

    if ((state == STATE_IDLE || state == STATE_RETURN) && !lod) {
        var kind = ATTRACTOR_HOME;
        if (state == STATE_IDLE && !go_home) {
            kind = ATTRACTOR_FORAGE;
        }
        if (state == STATE_IDLE) {
            acc += curl_noise(pos * 0.2, time) * (wander / mass);
        }
        var view_sq = FORAGE_VIEW_SQ;
        if (kind == ATTRACTOR_HOME) {
            view_sq = 3.4e38;
        }
        let t = nearest_attractor(pos, kind);
        if (t.w >= 0.0 && t.w < view_sq) {
            let seek = safe_normalize(t.xyz - pos) * max_speed;
            acc += (seek - vel) * (frame.flyer.y / mass);
            if (sqrt(t.w) < frame.flyer.z) {
                if (kind == ATTRACTOR_FORAGE) {
                    state = STATE_GATHER;
                } else {
                    return ActorOutput(vec4<f32>(0.0), vec4<f32>(pos, 0.0), vec4<u32>(STATE_HOME, 0u, MODE_IDLE, 0u));
                }
            }
        } else if (state == STATE_RETURN) {
            acc.y += 0.02 / mass;
        }
    } else if (state == STATE_GATHER) {
        vel *= 0.9;
        vel.y += sin(time * frame.flyer_ext.x) * frame.flyer_ext.y;
        let roll = hash33(vec3<f32>(f32(gid), time, 2.0)).x * 0.5 + 0.5;
        if (roll < frame.flyer.w) {
            state = STATE_RETURN;
        }
    }

    if (!lod) {
        let count = frame.counts.x;
        let samples = min(count, FLOCK_SAMPLES);
        let fwd = safe_normalize(vel);
        var seed = gid + tick * 100u;
        var sep = vec3<f32>(0.0);
        var ali = vec3<f32>(0.0);
        var coh = vec3<f32>(0.0);
        var neighbors = 0u;
        var kin = 0u;
        for (var k = 0u; k < samples; k = k + 1u) {
            var i = k;
            if (count >= FLOCK_SAMPLES) {
                seed = next_rand(seed);
                i = seed % count;
            }
            if (i == gid) {
                continue;
            }
            let other = actors[i];
            let diff = other.position.xyz - pos;
            let d2 = dot(diff, diff);
            if (d2 >= FLOCK_VIEW_SQ || d2 < 1e-5 || !in_fov(fwd, diff, fov_cos)) {
                continue;
            }
            if (d2 < FLOCK_SEPARATION_SQ) {
                sep -= safe_normalize(diff) / d2;
            }
            if (other.info.x == a.info.x) {
                ali += other.velocity.xyz;
                coh += other.position.xyz;
                kin += 1u;
            }
            neighbors += 1u;
        }
        if (neighbors > 0u) {
            if (dot(sep, sep) > 0.0) {
                acc += (safe_normalize(sep) * max_speed - vel) * (a.boids.x / mass);
            }
            if (kin > 0u) {
                let k = f32(kin);
                acc += (safe_normalize(ali / k) * max_speed - vel) * (a.boids.y / mass);
                acc += (safe_normalize(coh / k - pos) * max_speed - vel) * (a.boids.z / mass);
            }
        }
    }

    acc.y -= gravity;
    vel += acc;
    vel *= frame.flyer.x;

    let speed_sq = dot(vel, vel);
    if (!lod && speed_sq > 1e-4) {
        let fwd = safe_normalize(vel);
        let rays = u32(clamp(sqrt(speed_sq) * 80.0, 6.0, 32.0));
        let look = frame.flyer_ext.z;
        var avoid = vec3<f32>(0.0);
        for (var i = 0u; i < rays; i = i + 1u) {
            let dir = fibonacci_cone(i, rays, fwd, 1.2);
            let d = cast_ray(pos, dir, look);
            if (d < look) {
                avoid -= dir * (look - d);
            }
        }
        vel += avoid * (frame.flyer_ext.w / mass);
    }

    return ActorOutput(
        vec4<f32>(limit_len(vel, max_speed), 0.0),
        vec4<f32>(prev, 0.0),
        vec4<u32>(state, stuck, MODE_FLY, 0u),
    );
}
"#;

const BALLISTIC_WGSL: &str = r#"
// Items and experience orbs

fn fall_output(a: Actor, v: vec3<f32>) -> ActorOutput {
    return ActorOutput(
        vec4<f32>(limit_len(v, a.position.w), 0.0),
        vec4<f32>(a.prev_position.xyz, 0.0),
        vec4<u32>(a.info.z, 0u, MODE_FALL, 0u),
    );
}

fn item_step(a: Actor) -> ActorOutput {
    let pos = a.position.xyz;
    var vel = a.velocity.xyz;
    vel.y -= frame.ballistic.x;
    if (blocks(pos - vec3<f32>(0.0, 0.2, 0.0))) {
        vel.y = 0.0;
        vel.x *= 0.5;
        vel.z *= 0.5;
    } else if (voxel_class(pos) == VOXEL_LIQUID) {
        vel *= 0.8;
    } else {
        vel *= 0.6;
    }
    return fall_output(a, vel);
}

fn xp_step(a: Actor, lod: bool) -> ActorOutput {
    let pos = a.position.xyz;
    var vel = a.velocity.xyz;
    vel.y -= frame.ballistic.y;
    if (!lod) {
        let p = nearest_player(pos);
        if (p.w >= 0.0 && p.w < frame.ballistic.w) {
            vel += safe_normalize(p.xyz + vec3<f32>(0.0, 1.0, 0.0) - pos) * frame.ballistic.z;
        }
    }
    return fall_output(a, vel * 0.95);
}
"#;

const SPECIES_WGSL: &str = r#"
// Species overlay

fn pull(ch: u32, weight: f32, pos: vec3<f32>) -> vec3<f32> {
    let g = gradient(ch, pos);
    if (length(g) > 0.001) {
        return safe_normalize(g) * weight;
    }
    return vec3<f32>(0.0);
}

fn species_overlay(a: Actor) -> vec3<f32> {
    let behavior = a.info.y;
    let pos = a.position.xyz;
    let preferred = a.extra.y;
    var acc = vec3<f32>(0.0);

    if (preferred < SCENT_CHANNELS) {
        acc += pull(preferred, 1.5, pos);
    }
    if (behavior == BEHAVIOR_PREDATOR) {
        if (preferred != CH_FISH) {
            acc += pull(CH_FISH, 2.0, pos);
        }
        acc += pull(CH_PREY, a.behavior.z, pos);
    }
    if (behavior == BEHAVIOR_PREY_WILD || behavior == BEHAVIOR_LIVESTOCK) {
        acc += pull(CH_PREDATOR, -3.0 * a.behavior.y, pos);
    }
    if (behavior == BEHAVIOR_LIVESTOCK) {
        acc += pull(CH_HERD, 0.5, pos);
    }
    if (a.behavior.x > 0.3) {
        acc += pull(CH_PLAYER, a.behavior.x * 0.5, pos);
    }

    if (dot(acc, acc) == 0.0) {
        return a.velocity.xyz;
    }
    return limit_len(a.velocity.xyz + acc * frame.scent.z, a.position.w);
}
"#;

const BEHAVIOR_MAIN_WGSL: &str = r#"
// Behavior entry point

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
    let gid = linear_id(id, groups);
    if (gid >= frame.counts.x) {
        return;
    }
    var a = actors[gid];
    let pos = a.position.xyz;
    let lod = is_lod(pos);
    let kind = a.info.x;
    let living = kind == CLASS_WALKER || kind == CLASS_SWIMMER || kind == CLASS_FLYER;

    if (living && a.info.y != BEHAVIOR_GENERIC && a.info.y <= BEHAVIOR_PET) {
        a.velocity = vec4<f32>(species_overlay(a), a.velocity.w);
    }

    var result = ActorOutput(
        vec4<f32>(a.velocity.xyz, 0.0),
        vec4<f32>(a.prev_position.xyz, 0.0),
        vec4<u32>(a.info.z, a.info.w, MODE_IDLE, 0u),
    );
    switch kind {
        case 4u: { result = walker_step(gid, a, consumer_flow(a.info.y, pos)); }
        case 5u: { result = swimmer_step(gid, a, lod); }
        case 0u: { result = flyer_step(gid, a, lod); }
        case 1u: { result = item_step(a); }
        case 2u: { result = xp_step(a, lod); }
        default: {}
    }
    outputs[gid] = result;
}
"#;

const EMIT_WGSL: &str = r#"
// Emit
// Writes max(current, marker); concurrent writers to one cell agree.

@group(0) @binding(0) var<storage, read> actors: array<Actor>;
@group(0) @binding(1) var<storage, read_write> scent: array<f32>;
@group(0) @binding(2) var<uniform> frame: Frame;

fn emission_channel(behavior: u32) -> u32 {
    switch behavior {
        case 2u: { return CH_PREDATOR; }
        case 3u: { return CH_PREY; }
        case 1u: { return CH_HERD; }
        default: { return NO_CHANNEL; }
    }
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
    let gid = linear_id(id, groups);
    if (gid >= frame.counts.x) {
        return;
    }
    let a = actors[gid];
    let ch = emission_channel(a.info.y);
    if (ch == NO_CHANNEL) {
        return;
    }
    let pos = a.position.xyz;
    if (is_lod(pos)) {
        return;
    }
    let s = frame.grid.y;
    let c = vec3<i32>(floor(pos)) - vec3<i32>(frame.grid.z);
    if (any(c < vec3<i32>(0)) || any(c >= vec3<i32>(s))) {
        return;
    }
    let idx = i32(ch) * s * s * s + c.x + c.z * s + c.y * s * s;
    scent[idx] = max(scent[idx], frame.scent.x);
}
"#;
