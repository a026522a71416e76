//! # wgpu Backend
//!
//! Runs the WGSL kernels from [`crate::shaders`] on a wgpu device.
//!
//! ## Buffer Ownership
//!
//! ```text
//! GridResources (rebuilt by configure)      GpuSlot × 2 (rebuilt by rebuild_slots)
//! ├── voxels       u32 × V³                 ├── actors      GpuActor × cap
//! ├── scent[2]     f32 × 8·S³               ├── outputs     GpuActorOutput × cap
//! ├── flow_cost    u32 × 3·V³               ├── attractors  GpuAttractor × 1024
//! ├── flow_dirs    u32 × 3·V³               ├── staging     MAP_READ copy of outputs
//! ├── flow_targets vec4<i32> × 3·64         ├── behavior groups [scent front]
//! └── uniforms (scent, frame, flow × 3)     └── emit groups [scent front]
//! ```
//!
//! Every submission runs inside a validation + out-of-memory error scope so
//! a failed dispatch surfaces as [`ComputeError::Device`] instead of
//! reaching the uncaptured-error handler.

use bytemuck::Pod;
use swarm_core::{PingPongPass, SlotArena};
use swarm_shared::constants::{FLOW_FIELDS, MAX_FLOW_TARGETS};
use swarm_shared::FlowTarget;
use wgpu::util::DeviceExt;

use crate::backend::{
    dispatch_size, BackendInfo, BackendKind, ComputeBackend, MAX_ATTRACTORS, MAX_STIMULI,
};
use crate::error::{ComputeError, ComputeResult};
use crate::layout::{
    FlowUniforms, FrameUniforms, GpuActor, GpuActorOutput, GpuAttractor, GpuStimulus,
    GridLayout, ScentUniforms,
};
use crate::shaders::{ComputeShaders, FLOW_ENTRIES, MAIN_ENTRY};

/// Storage buffers the behavior kernel binds in one stage.
const REQUIRED_STORAGE_BUFFERS: u32 = 6;

// =============================================================================
// PIPELINES
// =============================================================================

struct Pipelines {
    inject: wgpu::ComputePipeline,
    inject_layout: wgpu::BindGroupLayout,
    diffuse: wgpu::ComputePipeline,
    diffuse_layout: wgpu::BindGroupLayout,
    flow: [wgpu::ComputePipeline; 4],
    flow_layout: wgpu::BindGroupLayout,
    behavior: wgpu::ComputePipeline,
    behavior_layout: wgpu::BindGroupLayout,
    emit: wgpu::ComputePipeline,
    emit_layout: wgpu::BindGroupLayout,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffers: &[&wgpu::Buffer],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
        .iter()
        .enumerate()
        .map(|(i, b)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: b.as_entire_binding(),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

impl Pipelines {
    fn new(device: &wgpu::Device) -> Self {
        let inject_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scent Inject Layout"),
            entries: &[storage_entry(0, false), storage_entry(1, true), uniform_entry(2)],
        });
        let diffuse_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scent Diffuse Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, true),
                uniform_entry(3),
            ],
        });
        let flow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flow Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                storage_entry(2, true),
                storage_entry(3, true),
                uniform_entry(4),
            ],
        });
        let behavior_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Behavior Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                storage_entry(5, true),
                uniform_entry(6),
            ],
        });
        let emit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Emit Layout"),
            entries: &[storage_entry(0, true), storage_entry(1, false), uniform_entry(2)],
        });

        let module = |label: &str, source: String| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let pipeline = |label: &str,
                        layout: &wgpu::BindGroupLayout,
                        module: &wgpu::ShaderModule,
                        entry: &str| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point: entry,
            })
        };

        let inject_module = module("Scent Inject", ComputeShaders::scent_inject_shader().to_owned());
        let diffuse_module = module("Scent Diffuse", ComputeShaders::scent_diffuse_shader().to_owned());
        let flow_module = module("Flow", ComputeShaders::flow_shader().to_owned());
        let behavior_module = module("Behavior", ComputeShaders::behavior_shader());
        let emit_module = module("Emit", ComputeShaders::emit_shader());

        Self {
            inject: pipeline("Scent Inject", &inject_layout, &inject_module, MAIN_ENTRY),
            diffuse: pipeline("Scent Diffuse", &diffuse_layout, &diffuse_module, MAIN_ENTRY),
            flow: FLOW_ENTRIES.map(|entry| pipeline(entry, &flow_layout, &flow_module, entry)),
            behavior: pipeline("Behavior", &behavior_layout, &behavior_module, MAIN_ENTRY),
            emit: pipeline("Emit", &emit_layout, &emit_module, MAIN_ENTRY),
            inject_layout,
            diffuse_layout,
            flow_layout,
            behavior_layout,
            emit_layout,
        }
    }
}

// =============================================================================
// RESOURCES
// =============================================================================

struct GridResources {
    layout: GridLayout,
    voxels: wgpu::Buffer,
    scent: [wgpu::Buffer; 2],
    flow_cost: wgpu::Buffer,
    flow_dirs: wgpu::Buffer,
    flow_targets: wgpu::Buffer,
    flow_uniforms: [wgpu::Buffer; FLOW_FIELDS],
    flow_groups: [wgpu::BindGroup; FLOW_FIELDS],
    scent_uniform: wgpu::Buffer,
    stimuli: wgpu::Buffer,
    /// Indexed by the buffer being injected into
    inject_groups: [wgpu::BindGroup; 2],
    /// Indexed by the buffer being read
    diffuse_groups: [wgpu::BindGroup; 2],
    frame_uniform: wgpu::Buffer,
}

struct GpuSlot {
    actors: wgpu::Buffer,
    outputs: wgpu::Buffer,
    attractors: wgpu::Buffer,
    staging: wgpu::Buffer,
    /// Indexed by scent front
    behavior_groups: [wgpu::BindGroup; 2],
    /// Indexed by scent front
    emit_groups: [wgpu::BindGroup; 2],
}

fn storage_buffer(device: &wgpu::Device, label: &str, bytes: usize, extra: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (bytes.max(16)) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | extra,
        mapped_at_creation: false,
    })
}

fn uniform_buffer<T: Pod>(device: &wgpu::Device, label: &str, value: &T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn staging_buffer(device: &wgpu::Device, label: &str, bytes: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (bytes.max(16)) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Runs `f` inside validation and out-of-memory error scopes.
fn scoped<T>(device: &wgpu::Device, label: &str, f: impl FnOnce() -> T) -> ComputeResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let out = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match validation.or(oom) {
        Some(e) => Err(ComputeError::Device(format!("{label}: {e}"))),
        None => Ok(out),
    }
}

/// Maps `buffer`, copies the first `len` elements out and unmaps.
fn map_read<T: Pod>(device: &wgpu::Device, buffer: &wgpu::Buffer, len: usize) -> ComputeResult<Vec<T>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let bytes = (len * std::mem::size_of::<T>()) as u64;
    let slice = buffer.slice(..bytes);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| ComputeError::Readback(e.to_string()))?
        .map_err(|e| ComputeError::Readback(e.to_string()))?;

    let data = slice.get_mapped_range();
    let out = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    buffer.unmap();
    Ok(out)
}

// =============================================================================
// BACKEND
// =============================================================================

/// WGSL kernels on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    pipelines: Pipelines,
    grid: Option<GridResources>,
    slots: SlotArena<GpuSlot>,
}

impl WgpuBackend {
    /// Requests a high-performance adapter and compiles every kernel.
    ///
    /// # Errors
    ///
    /// `NoAdapter`, `DeviceRequest`, or `Device` when a kernel fails to
    /// compile or the adapter lacks the storage-buffer budget.
    pub fn new() -> ComputeResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(ComputeError::NoAdapter)?;

        let adapter_limits = adapter.limits();
        if adapter_limits.max_storage_buffers_per_shader_stage < REQUIRED_STORAGE_BUFFERS {
            return Err(ComputeError::DeviceRequest(format!(
                "adapter exposes {} storage buffers per stage, {} required",
                adapter_limits.max_storage_buffers_per_shader_stage, REQUIRED_STORAGE_BUFFERS
            )));
        }
        let limits = wgpu::Limits {
            max_storage_buffers_per_shader_stage: REQUIRED_STORAGE_BUFFERS,
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::downlevel_defaults()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("SWARM Compute"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
            },
            None,
        ))
        .map_err(|e| ComputeError::DeviceRequest(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|e| {
            tracing::error!("uncaptured device error: {}", e);
        }));

        let pipelines = scoped(&device, "kernel compilation", || Pipelines::new(&device))?;
        let adapter_name = adapter.get_info().name;
        tracing::info!("wgpu backend ready on {}", adapter_name);

        Ok(Self {
            device,
            queue,
            adapter_name,
            pipelines,
            grid: None,
            slots: SlotArena::new(),
        })
    }

    fn grid(&self) -> ComputeResult<&GridResources> {
        self.grid.as_ref().ok_or(ComputeError::NotConfigured("grids"))
    }

    fn slot(&self, slot: usize) -> ComputeResult<&GpuSlot> {
        self.slots.get(slot).ok_or(ComputeError::SlotOutOfRange(slot))
    }

    fn allocate_grid(&self, layout: &GridLayout) -> GridResources {
        let device = &self.device;
        let p = &self.pipelines;
        let u32_size = std::mem::size_of::<u32>();
        let voxel_volume = layout.voxel.volume();
        let scent_bytes = layout.scent_len() * std::mem::size_of::<f32>();
        let flow_bytes = FLOW_FIELDS * voxel_volume * u32_size;

        let voxels = storage_buffer(device, "Voxels", voxel_volume * u32_size, wgpu::BufferUsages::empty());
        let scent = [
            storage_buffer(device, "Scent A", scent_bytes, wgpu::BufferUsages::COPY_SRC),
            storage_buffer(device, "Scent B", scent_bytes, wgpu::BufferUsages::COPY_SRC),
        ];
        let flow_cost = storage_buffer(device, "Flow Cost", flow_bytes, wgpu::BufferUsages::COPY_SRC);
        let flow_dirs = storage_buffer(device, "Flow Dirs", flow_bytes, wgpu::BufferUsages::COPY_SRC);
        let flow_targets = storage_buffer(
            device,
            "Flow Targets",
            FLOW_FIELDS * MAX_FLOW_TARGETS * std::mem::size_of::<[i32; 4]>(),
            wgpu::BufferUsages::empty(),
        );
        let flow_uniforms = FlowTarget::ALL.map(|t| {
            uniform_buffer(
                device,
                "Flow Params",
                &FlowUniforms {
                    dims: [layout.voxel.size, 0, t.index() as u32, 0],
                },
            )
        });
        let flow_groups = std::array::from_fn(|i| {
            bind_group(
                device,
                "Flow Group",
                &p.flow_layout,
                &[&flow_cost, &flow_dirs, &voxels, &flow_targets, &flow_uniforms[i]],
            )
        });

        let scent_uniform = uniform_buffer(device, "Scent Params", &ScentUniforms::default());
        let stimuli = storage_buffer(
            device,
            "Stimuli",
            MAX_STIMULI * std::mem::size_of::<GpuStimulus>(),
            wgpu::BufferUsages::empty(),
        );
        let inject_groups = std::array::from_fn(|i| {
            bind_group(device, "Scent Inject Group", &p.inject_layout, &[&scent[i], &stimuli, &scent_uniform])
        });
        let diffuse_groups = std::array::from_fn(|i| {
            bind_group(
                device,
                "Scent Diffuse Group",
                &p.diffuse_layout,
                &[&scent[i], &scent[i ^ 1], &voxels, &scent_uniform],
            )
        });
        let frame_uniform = uniform_buffer(device, "Frame", &FrameUniforms::default());

        GridResources {
            layout: *layout,
            voxels,
            scent,
            flow_cost,
            flow_dirs,
            flow_targets,
            flow_uniforms,
            flow_groups,
            scent_uniform,
            stimuli,
            inject_groups,
            diffuse_groups,
            frame_uniform,
        }
    }

    fn copy_to_host<T: Pod>(&self, source: &wgpu::Buffer, offset: usize, len: usize) -> ComputeResult<Vec<T>> {
        let bytes = len * std::mem::size_of::<T>();
        let staging = staging_buffer(&self.device, "Readback", bytes);
        scoped(&self.device, "readback copy", || {
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback"),
            });
            encoder.copy_buffer_to_buffer(
                source,
                (offset * std::mem::size_of::<T>()) as u64,
                &staging,
                0,
                bytes as u64,
            );
            self.queue.submit(Some(encoder.finish()));
        })?;
        map_read(&self.device, &staging, len)
    }
}

impl ComputeBackend for WgpuBackend {
    fn describe(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Wgpu,
            name: self.adapter_name.clone(),
        }
    }

    fn configure(&mut self, layout: &GridLayout) -> ComputeResult<()> {
        self.slots.release();
        self.grid = None;
        let grid = scoped(&self.device, "grid allocation", || self.allocate_grid(layout))?;
        self.grid = Some(grid);
        tracing::info!(
            "wgpu grids allocated: voxel {} scent {}",
            layout.voxel.size,
            layout.scent.size
        );
        Ok(())
    }

    fn rebuild_slots(&mut self, capacity: usize) -> ComputeResult<u64> {
        let Some(grid) = self.grid.as_ref() else {
            return Err(ComputeError::NotConfigured("grids"));
        };
        let device = &self.device;
        let p = &self.pipelines;
        let capacity = capacity.max(1);

        self.slots.rebuild(capacity, |slot, cap| {
            scoped(device, "slot allocation", || {
                let actors = storage_buffer(device, "Actors", cap * GpuActor::SIZE, wgpu::BufferUsages::empty());
                let outputs = storage_buffer(device, "Outputs", cap * GpuActorOutput::SIZE, wgpu::BufferUsages::COPY_SRC);
                let attractors = storage_buffer(
                    device,
                    "Attractors",
                    MAX_ATTRACTORS * std::mem::size_of::<GpuAttractor>(),
                    wgpu::BufferUsages::empty(),
                );
                let staging = staging_buffer(device, "Output Staging", cap * GpuActorOutput::SIZE);
                let behavior_groups = std::array::from_fn(|front| {
                    bind_group(
                        device,
                        "Behavior Group",
                        &p.behavior_layout,
                        &[
                            &actors,
                            &outputs,
                            &grid.voxels,
                            &grid.scent[front],
                            &grid.flow_dirs,
                            &attractors,
                            &grid.frame_uniform,
                        ],
                    )
                });
                let emit_groups = std::array::from_fn(|front| {
                    bind_group(
                        device,
                        "Emit Group",
                        &p.emit_layout,
                        &[&actors, &grid.scent[front], &grid.frame_uniform],
                    )
                });
                tracing::debug!("generation slot {} allocated for {} rows", slot, cap);
                GpuSlot {
                    actors,
                    outputs,
                    attractors,
                    staging,
                    behavior_groups,
                    emit_groups,
                }
            })
        })
    }

    fn slot_capacity(&self) -> usize {
        self.slots.capacity()
    }

    fn upload_voxels(&mut self, voxels: &[u32]) -> ComputeResult<()> {
        let grid = self.grid()?;
        let expected = grid.layout.voxel.volume();
        if voxels.len() != expected {
            return Err(ComputeError::LengthMismatch {
                expected,
                actual: voxels.len(),
            });
        }
        self.queue.write_buffer(&grid.voxels, 0, bytemuck::cast_slice(voxels));
        Ok(())
    }

    fn clear_scent(&mut self) -> ComputeResult<()> {
        let grid = self.grid()?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scent Clear"),
        });
        for buffer in &grid.scent {
            encoder.clear_buffer(buffer, 0, None);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn inject_scent(
        &mut self,
        buffer: usize,
        stimuli: &[GpuStimulus],
        uniforms: &ScentUniforms,
    ) -> ComputeResult<()> {
        let grid = self.grid()?;
        let group = grid
            .inject_groups
            .get(buffer)
            .ok_or(ComputeError::SlotOutOfRange(buffer))?;
        for chunk in stimuli.chunks(MAX_STIMULI) {
            let mut params = *uniforms;
            params.dims[2] = chunk.len() as u32;
            scoped(&self.device, "scent inject", || {
                self.queue.write_buffer(&grid.scent_uniform, 0, bytemuck::bytes_of(&params));
                self.queue.write_buffer(&grid.stimuli, 0, bytemuck::cast_slice(chunk));
                let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Scent Inject"),
                });
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("Scent Inject"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.pipelines.inject);
                    pass.set_bind_group(0, group, &[]);
                    pass.dispatch_workgroups(1, 1, 1);
                }
                self.queue.submit(Some(encoder.finish()));
            })?;
        }
        Ok(())
    }

    fn diffuse_scent(&mut self, pass: PingPongPass, uniforms: &ScentUniforms) -> ComputeResult<()> {
        let grid = self.grid()?;
        if pass.write != pass.read ^ 1 {
            return Err(ComputeError::NotConfigured("diffusion must write the other buffer"));
        }
        let group = grid
            .diffuse_groups
            .get(pass.read)
            .ok_or(ComputeError::SlotOutOfRange(pass.read))?;
        let (x, y) = dispatch_size(grid.layout.scent.volume() as u32);
        scoped(&self.device, "scent diffuse", || {
            self.queue.write_buffer(&grid.scent_uniform, 0, bytemuck::bytes_of(uniforms));
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scent Diffuse"),
            });
            {
                let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Scent Diffuse"),
                    timestamp_writes: None,
                });
                cpass.set_pipeline(&self.pipelines.diffuse);
                cpass.set_bind_group(0, group, &[]);
                cpass.dispatch_workgroups(x, y, 1);
            }
            self.queue.submit(Some(encoder.finish()));
        })
    }

    fn compute_flow(
        &mut self,
        target: FlowTarget,
        targets: &[[i32; 4]],
        sweeps: u32,
    ) -> ComputeResult<()> {
        let grid = self.grid()?;
        let field = target.index();
        let live = &targets[..targets.len().min(MAX_FLOW_TARGETS)];
        let params = FlowUniforms {
            dims: [grid.layout.voxel.size, live.len() as u32, field as u32, 0],
        };
        let (x, y) = dispatch_size(grid.layout.voxel.volume() as u32);
        let [reset, seed, relax, vectors] = &self.pipelines.flow;
        let group = &grid.flow_groups[field];

        scoped(&self.device, "flow field", || {
            self.queue.write_buffer(&grid.flow_uniforms[field], 0, bytemuck::bytes_of(&params));
            if !live.is_empty() {
                let offset = field * MAX_FLOW_TARGETS * std::mem::size_of::<[i32; 4]>();
                self.queue.write_buffer(&grid.flow_targets, offset as u64, bytemuck::cast_slice(live));
            }
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Flow Field"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Flow Field"),
                    timestamp_writes: None,
                });
                pass.set_bind_group(0, group, &[]);
                pass.set_pipeline(reset);
                pass.dispatch_workgroups(x, y, 1);
                pass.set_pipeline(seed);
                pass.dispatch_workgroups(1, 1, 1);
                pass.set_pipeline(relax);
                for _ in 0..sweeps {
                    pass.dispatch_workgroups(x, y, 1);
                }
                pass.set_pipeline(vectors);
                pass.dispatch_workgroups(x, y, 1);
            }
            self.queue.submit(Some(encoder.finish()));
        })?;
        tracing::debug!("flow {:?}: {} targets, {} sweeps", target, live.len(), sweeps);
        Ok(())
    }

    fn upload_actors(
        &mut self,
        slot: usize,
        actors: &[GpuActor],
        attractors: &[GpuAttractor],
    ) -> ComputeResult<()> {
        let capacity = self.slots.capacity();
        if actors.len() > capacity {
            return Err(ComputeError::CapacityExceeded {
                requested: actors.len(),
                capacity,
            });
        }
        if attractors.len() > MAX_ATTRACTORS {
            return Err(ComputeError::CapacityExceeded {
                requested: attractors.len(),
                capacity: MAX_ATTRACTORS,
            });
        }
        let generation = self.slot(slot)?;
        if !actors.is_empty() {
            self.queue.write_buffer(&generation.actors, 0, bytemuck::cast_slice(actors));
        }
        if !attractors.is_empty() {
            self.queue.write_buffer(&generation.attractors, 0, bytemuck::cast_slice(attractors));
        }
        Ok(())
    }

    fn dispatch_actors(
        &mut self,
        slot: usize,
        scent_front: usize,
        frame: &FrameUniforms,
    ) -> ComputeResult<()> {
        let grid = self.grid()?;
        let generation = self.slot(slot)?;
        let count = frame.counts[0] as usize;
        if count > self.slots.capacity() {
            return Err(ComputeError::CapacityExceeded {
                requested: count,
                capacity: self.slots.capacity(),
            });
        }
        let behavior_group = generation
            .behavior_groups
            .get(scent_front)
            .ok_or(ComputeError::SlotOutOfRange(scent_front))?;
        let emit_group = &generation.emit_groups[scent_front];
        let (x, y) = dispatch_size(count as u32);

        scoped(&self.device, "behavior dispatch", || {
            self.queue.write_buffer(&grid.frame_uniform, 0, bytemuck::bytes_of(frame));
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Behavior"),
            });
            if count > 0 {
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("Behavior"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.pipelines.behavior);
                    pass.set_bind_group(0, behavior_group, &[]);
                    pass.dispatch_workgroups(x, y, 1);
                    pass.set_pipeline(&self.pipelines.emit);
                    pass.set_bind_group(0, emit_group, &[]);
                    pass.dispatch_workgroups(x, y, 1);
                }
                encoder.copy_buffer_to_buffer(
                    &generation.outputs,
                    0,
                    &generation.staging,
                    0,
                    (count * GpuActorOutput::SIZE) as u64,
                );
            }
            self.queue.submit(Some(encoder.finish()));
        })
    }

    fn read_outputs(&mut self, slot: usize, count: usize) -> ComputeResult<Vec<GpuActorOutput>> {
        let capacity = self.slots.capacity();
        if count > capacity {
            return Err(ComputeError::CapacityExceeded {
                requested: count,
                capacity,
            });
        }
        let generation = self.slot(slot)?;
        map_read(&self.device, &generation.staging, count)
    }

    fn read_scent(&mut self, buffer: usize) -> ComputeResult<Vec<f32>> {
        let grid = self.grid()?;
        let source = grid.scent.get(buffer).ok_or(ComputeError::SlotOutOfRange(buffer))?;
        self.copy_to_host(source, 0, grid.layout.scent_len())
    }

    fn read_flow(&mut self, target: FlowTarget) -> ComputeResult<(Vec<u32>, Vec<u32>)> {
        let grid = self.grid()?;
        let volume = grid.layout.voxel.volume();
        let offset = target.index() * volume;
        let cost = self.copy_to_host(&grid.flow_cost, offset, volume)?;
        let dirs = self.copy_to_host(&grid.flow_dirs, offset, volume)?;
        Ok((cost, dirs))
    }
}
