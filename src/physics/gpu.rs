//! GPU compute tier
//!
//! Both primitives run as wgpu compute kernels. Each call is a synchronous
//! round trip: upload, dispatch, copy to a staging buffer, map, read back.
//! A dispatch that fails at runtime is answered by the CPU reference kernels
//! so the contract holds for the caller.

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::native::{advance_entries, first_overlaps};
use super::{BackendError, BackendTier, BoxView, MotionEntry, PhysicsBackend, guarded};
use crate::consts::OFFSCREEN_MARGIN;

const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MotionParams {
    dt: f32,
    width: f32,
    height: f32,
    margin: f32,
    count: u32,
    _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PairParams {
    source_count: u32,
    candidate_count: u32,
    _pad: [u32; 2],
}

/// A compute pipeline and the bind group layout it was built against
struct Kernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    motion: Kernel,
    pairs: Kernel,
    adapter_name: String,
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage(read_only: bool) -> wgpu::BufferBindingType {
    wgpu::BufferBindingType::Storage { read_only }
}

impl GpuBackend {
    /// Acquire an adapter and device and build both kernels
    pub fn new() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| BackendError::NoAdapter(format!("{e:?}")))?;

        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("skirmish-physics-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| BackendError::Device(format!("{e:?}")))?;

        let motion = Self::build_kernel(
            &device,
            "motion",
            include_str!("motion.wgsl"),
            "motion_main",
            &[
                layout_entry(0, wgpu::BufferBindingType::Uniform),
                layout_entry(1, storage(false)),
                layout_entry(2, storage(false)),
            ],
        )?;
        let pairs = Self::build_kernel(
            &device,
            "pairs",
            include_str!("pairs.wgsl"),
            "pairs_main",
            &[
                layout_entry(0, wgpu::BufferBindingType::Uniform),
                layout_entry(1, storage(true)),
                layout_entry(2, storage(true)),
                layout_entry(3, storage(false)),
            ],
        )?;

        Ok(Self {
            device,
            queue,
            motion,
            pairs,
            adapter_name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn build_kernel(
        device: &wgpu::Device,
        name: &str,
        source: &str,
        entry_point: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<Kernel, BackendError> {
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(BackendError::Kernel(format!("{name}: {err}")));
        }
        Ok(Kernel { pipeline, layout })
    }

    fn workgroups(&self, count: usize) -> Result<u32, BackendError> {
        let count = u32::try_from(count)
            .map_err(|_| BackendError::Dispatch(format!("{count} items exceed u32")))?;
        let groups = count.div_ceil(WORKGROUP_SIZE);
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        if groups > max {
            return Err(BackendError::Dispatch(format!(
                "{groups} workgroups exceed device limit {max}"
            )));
        }
        Ok(groups)
    }

    fn staging_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn output_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Encode one dispatch of `kernel` and submit it
    fn run(
        &self,
        kernel: &Kernel,
        buffers: &[&wgpu::Buffer],
        groups: u32,
        copies: &[(&wgpu::Buffer, &wgpu::Buffer)],
    ) {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("physics_bind_group"),
            layout: &kernel.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("physics_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("physics_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        for (src, dst) in copies {
            encoder.copy_buffer_to_buffer(src, 0, dst, 0, src.size());
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Map a staging buffer and copy its contents out
    fn read_back<T: Pod>(&self, staging: &wgpu::Buffer) -> Result<Vec<T>, BackendError> {
        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| BackendError::Dispatch(format!("{e:?}")))?;
        rx.recv()
            .map_err(|e| BackendError::Dispatch(e.to_string()))?
            .map_err(|e| BackendError::Dispatch(format!("{e:?}")))?;

        let values = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, T>(&view).to_vec()
        };
        staging.unmap();
        Ok(values)
    }

    fn dispatch_motion(
        &self,
        entries: &mut [MotionEntry],
        dt: f32,
        width: f32,
        height: f32,
    ) -> Result<Vec<usize>, BackendError> {
        let groups = self.workgroups(entries.len())?;
        let params = MotionParams {
            dt,
            width,
            height,
            margin: OFFSCREEN_MARGIN,
            count: entries.len() as u32,
            _pad: [0; 3],
        };

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("motion_params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bodies = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("motion_bodies"),
                contents: bytemuck::cast_slice(entries),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            });
        let keep = self.output_buffer("motion_keep", (entries.len() * 4) as u64);
        let bodies_staging = self.staging_buffer("motion_bodies_staging", bodies.size());
        let keep_staging = self.staging_buffer("motion_keep_staging", keep.size());

        self.run(
            &self.motion,
            &[&params_buffer, &bodies, &keep],
            groups,
            &[(&bodies, &bodies_staging), (&keep, &keep_staging)],
        );

        let moved: Vec<MotionEntry> = self.read_back(&bodies_staging)?;
        let flags: Vec<u32> = self.read_back(&keep_staging)?;
        if moved.len() != entries.len() || flags.len() != entries.len() {
            return Err(BackendError::Dispatch("short read-back".to_string()));
        }

        let mut survivors = Vec::with_capacity(entries.len());
        for (i, (entry, flag)) in entries.iter_mut().zip(flags).enumerate() {
            if flag == 1 {
                entry.pos = moved[i].pos;
                survivors.push(i);
            }
        }
        Ok(survivors)
    }

    fn dispatch_pairs(
        &self,
        sources: &[BoxView],
        targets: &[BoxView],
    ) -> Result<Vec<(usize, usize)>, BackendError> {
        let groups = self.workgroups(sources.len())?;
        let params = PairParams {
            source_count: sources.len() as u32,
            candidate_count: u32::try_from(targets.len())
                .map_err(|_| BackendError::Dispatch("too many targets".to_string()))?,
            _pad: [0; 2],
        };

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("pair_params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let source_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("pair_sources"),
                contents: bytemuck::cast_slice(sources),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let target_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("pair_targets"),
                contents: bytemuck::cast_slice(targets),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let hits = self.output_buffer("pair_hits", (sources.len() * 4) as u64);
        let hits_staging = self.staging_buffer("pair_hits_staging", hits.size());

        self.run(
            &self.pairs,
            &[&params_buffer, &source_buffer, &target_buffer, &hits],
            groups,
            &[(&hits, &hits_staging)],
        );

        let hits: Vec<i32> = self.read_back(&hits_staging)?;
        Ok(hits
            .into_iter()
            .enumerate()
            .filter_map(|(i, hit)| usize::try_from(hit).ok().map(|j| (i, j)))
            .filter(|&(_, j)| j < targets.len())
            .collect())
    }
}

impl PhysicsBackend for GpuBackend {
    fn tier(&self) -> BackendTier {
        BackendTier::Gpu
    }

    fn supports_pairing(&self) -> bool {
        true
    }

    fn motion_update(
        &self,
        entries: &mut [MotionEntry],
        dt: f32,
        width: f32,
        height: f32,
    ) -> Vec<usize> {
        if entries.is_empty() {
            return Vec::new();
        }
        match guarded(|| self.dispatch_motion(entries, dt, width, height)) {
            Ok(survivors) => survivors,
            Err(err) => {
                log::warn!("GPU motion dispatch failed, answering on CPU: {err}");
                advance_entries(entries, dt, width, height)
            }
        }
    }

    fn pair_collisions(&self, sources: &[BoxView], targets: &[BoxView]) -> Vec<(usize, usize)> {
        if sources.is_empty() || targets.is_empty() {
            return Vec::new();
        }
        match guarded(|| self.dispatch_pairs(sources, targets)) {
            Ok(pairs) => pairs,
            Err(err) => {
                log::warn!("GPU pair dispatch failed, answering on CPU: {err}");
                first_overlaps(sources, targets)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    /// Most CI machines have no adapter; these only run where one exists.
    fn try_gpu() -> Option<GpuBackend> {
        let _ = env_logger::builder().is_test(true).try_init();
        match guarded(GpuBackend::new) {
            Ok(gpu) => Some(gpu),
            Err(err) => {
                log::warn!("Skipping GPU comparison, no usable device: {err}");
                None
            }
        }
    }

    #[test]
    fn test_invalid_shader_is_a_kernel_error() {
        let Some(gpu) = try_gpu() else {
            return;
        };
        let built = GpuBackend::build_kernel(
            &gpu.device,
            "broken",
            "@compute @workgroup_size(64) fn broken_main( {",
            "broken_main",
            &[layout_entry(0, wgpu::BufferBindingType::Uniform)],
        );
        assert!(matches!(built, Err(BackendError::Kernel(_))));

        // The device stays usable for the real kernels afterwards
        let mut entries = vec![MotionEntry::new(Vec2::ZERO, Vec2::new(10.0, 0.0))];
        assert_eq!(gpu.motion_update(&mut entries, 1.0, 800.0, 600.0), vec![0]);
        assert!((entries[0].pos.x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_gpu_motion_matches_cpu() {
        let Some(gpu) = try_gpu() else {
            return;
        };
        let mut gpu_entries: Vec<MotionEntry> = (0..200)
            .map(|i| {
                let f = i as f32;
                MotionEntry::new(Vec2::new(f * 4.0, f * 3.0), Vec2::new(33.0 - f, f * 0.5 - 40.0))
            })
            .collect();
        let mut cpu_entries = gpu_entries.clone();

        let gpu_survivors = gpu.motion_update(&mut gpu_entries, 0.5, 800.0, 600.0);
        let cpu_survivors = advance_entries(&mut cpu_entries, 0.5, 800.0, 600.0);

        assert_eq!(gpu_survivors, cpu_survivors);
        for i in gpu_survivors {
            assert!((gpu_entries[i].pos - cpu_entries[i].pos).length() < 1e-3);
        }
    }

    #[test]
    fn test_gpu_pairs_match_cpu() {
        let Some(gpu) = try_gpu() else {
            return;
        };
        let sources: Vec<BoxView> = (0..100)
            .map(|i| BoxView::new((i * 7) as f32, (i * 5) as f32, 8.0, 8.0))
            .collect();
        let targets: Vec<BoxView> = (0..30)
            .map(|i| BoxView::new((i * 20) as f32, (i * 15) as f32, 24.0, 24.0))
            .collect();
        assert_eq!(gpu.pair_collisions(&sources, &targets), first_overlaps(&sources, &targets));
    }
}
