// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

// GPU-accelerated neighbour searches.
// This module is compiled only when the `gpu_support` feature is enabled.

use bytemuck::{Pod, Zeroable};
use futures_intrusive::channel::shared::oneshot_channel;
use ndarray::{Array1, Array2, ArrayView2};
use pollster::block_on;
use wgpu::util::DeviceExt;

use super::{KnnResult, NeighbourSearchBackend, knn_layout, range_layout};
use crate::error::{EstimatorError, Result};

/// Largest neighbour count the KNN shader keeps in registers.
pub const MAX_GPU_K: usize = 32;

const WORKGROUP_SIZE: u32 = 256;
const BACKEND: &str = "gpu";

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct KnnParams {
    n_points: u32,
    dim: u32,
    k: u32,
    theiler_t: u32,
    chunk_size: u32,
    _padding: [u32; 3], // 16-byte alignment for uniforms
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct RangeParams {
    n_points: u32,
    dim: u32,
    theiler_t: u32,
    chunk_size: u32,
}

#[derive(Clone, Copy)]
enum Binding {
    ReadOnly,
    Uniform,
    ReadWrite,
}

/// Neighbour searches on a wgpu compute device.
///
/// Holds an open device for the lifetime of the value; dropping it releases the
/// device. Every search is a single dispatch over all chunks, so many
/// independent estimation problems share one round trip to the device.
///
/// Points and radii are converted to `f32` on upload. A KNN search and the
/// range searches fed with its radii therefore see the same rounded
/// coordinates, which keeps the two searches metrically consistent.
///
/// There is no CPU fallback. Driver, validation and out-of-memory errors are
/// returned as [`EstimatorError::DeviceOrBackendError`].
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::AdapterInfo,
}

impl GpuBackend {
    /// Open the adapter with index `device_id` in enumeration order (0 = first available).
    pub fn open(device_id: usize) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let available = adapters.len();
        let adapter = adapters.into_iter().nth(device_id).ok_or_else(|| {
            EstimatorError::backend(
                BACKEND,
                format!("no adapter with index {device_id} ({available} available)"),
            )
        })?;
        let info = adapter.get_info();

        let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Neighbour Search Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .map_err(|e| EstimatorError::backend(BACKEND, e))?;

        tracing::debug!(device_id, adapter = %info.name, backend = ?info.backend, "opened GPU device");
        Ok(Self {
            device,
            queue,
            adapter: info,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter.name
    }

    /// Run `f` inside validation and out-of-memory error scopes.
    fn scoped<T>(&self, what: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f();
        let validation = block_on(self.device.pop_error_scope());
        let oom = block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(oom) {
            return Err(EstimatorError::backend(BACKEND, format!("{what}: {err}")));
        }
        out
    }

    fn check_binding_size(&self, what: &str, bytes: u64) -> Result<()> {
        let max = u64::from(self.device.limits().max_storage_buffer_binding_size);
        if bytes > max {
            return Err(EstimatorError::backend(
                BACKEND,
                format!("{what} needs {bytes} bytes, device allows {max} per binding"),
            ));
        }
        Ok(())
    }

    fn upload_points(&self, points: ArrayView2<'_, f64>) -> Result<wgpu::Buffer> {
        let data: Vec<f32> = points.iter().map(|&v| v as f32).collect();
        self.check_binding_size("point set", (data.len() * size_of::<f32>()) as u64)?;
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Points Buffer"),
                contents: bytemuck::cast_slice(&data),
                usage: wgpu::BufferUsages::STORAGE,
            }))
    }

    fn output_buffer(&self, label: &str, bytes: u64) -> Result<wgpu::Buffer> {
        self.check_binding_size(label, bytes)?;
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }))
    }

    /// Build a compute pipeline for `source` and dispatch one invocation per point.
    fn dispatch(
        &self,
        label: &str,
        source: &'static str,
        bindings: &[(&wgpu::Buffer, Binding)],
        n_points: u32,
    ) -> Result<()> {
        let workgroup_count = n_points.div_ceil(WORKGROUP_SIZE);
        let max_groups = self.device.limits().max_compute_workgroups_per_dimension;
        if workgroup_count > max_groups {
            return Err(EstimatorError::backend(
                BACKEND,
                format!("{n_points} points need {workgroup_count} workgroups, device allows {max_groups}"),
            ));
        }

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
            .iter()
            .enumerate()
            .map(|(slot, (_, kind))| wgpu::BindGroupLayoutEntry {
                binding: slot as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: match kind {
                        Binding::ReadOnly => wgpu::BufferBindingType::Storage { read_only: true },
                        Binding::ReadWrite => wgpu::BufferBindingType::Storage { read_only: false },
                        Binding::Uniform => wgpu::BufferBindingType::Uniform,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(label),
                    entries: &layout_entries,
                });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        let group_entries: Vec<wgpu::BindGroupEntry> = bindings
            .iter()
            .enumerate()
            .map(|(slot, (buffer, _))| wgpu::BindGroupEntry {
                binding: slot as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &bind_group_layout,
            entries: &group_entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count, 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Copy `len` elements of `source` into host memory, blocking until the device is done.
    fn read_back<T: Pod>(&self, source: &wgpu::Buffer, len: usize) -> Result<Vec<T>> {
        let bytes = (len * size_of::<T>()) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Back Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |v| {
            sender.send(v).ok();
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| EstimatorError::backend(BACKEND, e))?;

        match block_on(receiver.receive()) {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(EstimatorError::backend(BACKEND, e)),
            None => {
                return Err(EstimatorError::backend(
                    BACKEND,
                    "buffer mapping was cancelled",
                ));
            }
        }
        let view = slice.get_mapped_range();
        let out: Vec<T> = bytemuck::cast_slice(&view).to_vec();
        drop(view);
        staging.unmap();
        Ok(out)
    }
}

fn to_u32(what: &str, v: usize) -> Result<u32> {
    u32::try_from(v)
        .map_err(|_| EstimatorError::backend(BACKEND, format!("{what} = {v} exceeds u32 range")))
}

impl NeighbourSearchBackend for GpuBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn knn_search(
        &self,
        points: ArrayView2<'_, f64>,
        k: usize,
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<KnnResult> {
        let layout = knn_layout(points, k, theiler_t, n_chunks)?;
        if k > MAX_GPU_K {
            return Err(EstimatorError::config(format!(
                "GPU KNN search supports k <= {MAX_GPU_K}, got {k}"
            )));
        }
        let n = layout.n_points;
        let params = KnnParams {
            n_points: to_u32("n_points", n)?,
            dim: to_u32("dim", points.ncols())?,
            k: k as u32,
            theiler_t: to_u32("theiler_t", theiler_t)?,
            chunk_size: to_u32("chunk_size", layout.chunk_size)?,
            _padding: [0; 3],
        };

        let (dist_buffer, idx_buffer) = self.scoped("knn search", || {
            let points_buffer = self.upload_points(points)?;
            let params_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("KNN Params Buffer"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let out_bytes = (k * n * size_of::<f32>()) as u64;
            let dist_buffer = self.output_buffer("KNN Distance Buffer", out_bytes)?;
            let idx_buffer = self.output_buffer("KNN Index Buffer", out_bytes)?;
            self.dispatch(
                "KNN Search",
                include_str!("knn.wgsl"),
                &[
                    (&points_buffer, Binding::ReadOnly),
                    (&params_buffer, Binding::Uniform),
                    (&dist_buffer, Binding::ReadWrite),
                    (&idx_buffer, Binding::ReadWrite),
                ],
                params.n_points,
            )?;
            Ok((dist_buffer, idx_buffer))
        })?;

        let distances: Vec<f32> = self.read_back(&dist_buffer, k * n)?;
        let indices: Vec<u32> = self.read_back(&idx_buffer, k * n)?;
        let shape_err = |e: ndarray::ShapeError| EstimatorError::backend(BACKEND, e);
        Ok(KnnResult {
            distances: Array2::from_shape_vec((k, n), distances.into_iter().map(f64::from).collect())
                .map_err(shape_err)?,
            indices: Array2::from_shape_vec((k, n), indices.into_iter().map(|j| j as usize).collect())
                .map_err(shape_err)?,
        })
    }

    fn range_search(
        &self,
        points: ArrayView2<'_, f64>,
        radii: &[f64],
        theiler_t: usize,
        n_chunks: usize,
    ) -> Result<Array1<usize>> {
        let layout = range_layout(points, radii, n_chunks)?;
        let n = layout.n_points;
        if n == 0 {
            return Ok(Array1::zeros(0));
        }
        let params = RangeParams {
            n_points: to_u32("n_points", n)?,
            dim: to_u32("dim", points.ncols())?,
            // a window wider than the chunk excludes everything either way
            theiler_t: to_u32("theiler_t", theiler_t.min(layout.chunk_size))?,
            chunk_size: to_u32("chunk_size", layout.chunk_size)?,
        };
        let radii32: Vec<f32> = radii.iter().map(|&r| r as f32).collect();

        let counts_buffer = self.scoped("range search", || {
            let points_buffer = self.upload_points(points)?;
            let params_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Range Params Buffer"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let radii_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Radii Buffer"),
                    contents: bytemuck::cast_slice(&radii32),
                    usage: wgpu::BufferUsages::STORAGE,
                });
            let counts_buffer =
                self.output_buffer("Range Count Buffer", (n * size_of::<u32>()) as u64)?;
            self.dispatch(
                "Range Search",
                include_str!("range_search.wgsl"),
                &[
                    (&points_buffer, Binding::ReadOnly),
                    (&params_buffer, Binding::Uniform),
                    (&radii_buffer, Binding::ReadOnly),
                    (&counts_buffer, Binding::ReadWrite),
                ],
                params.n_points,
            )?;
            Ok(counts_buffer)
        })?;

        let counts: Vec<u32> = self.read_back(&counts_buffer, n)?;
        Ok(counts.into_iter().map(|c| c as usize).collect())
    }
}
