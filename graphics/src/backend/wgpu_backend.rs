//! wgpu GPU backend implementation.
//!
//! GLSL stages are compiled with naga, which also provides the program
//! interface that a GL driver would report. wgpu binds resources through bind
//! groups rather than global slots, so slot assignments are recorded here and
//! exposed through [`WgpuBackend::bind_group_entries`] for the caller to build
//! its bind groups from.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::shader::ShaderStage;
use crate::shader::interface::{parse_glsl, reflect_modules};
use crate::types::{BufferDescriptor, BufferRange, BufferUsage, UniformValue};

use super::{BackendError, BufferHandle, GpuBackend, ProgramHandle, ProgramInterface, ShaderHandle};

struct WgpuProgram {
    interface: ProgramInterface,
    block_slots: HashMap<String, u32>,
}

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    next_id: u64,
    modules: HashMap<ShaderHandle, naga::Module>,
    programs: HashMap<ProgramHandle, WgpuProgram>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    slots: BTreeMap<u32, (BufferHandle, Option<BufferRange>)>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("programs", &self.programs.len())
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

impl WgpuBackend {
    /// Open a device on the best adapter, without a surface.
    pub fn new_headless() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| BackendError::ResourceCreationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Uniforge Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| BackendError::ResourceCreationFailed(format!("Device creation failed: {e}")))?;

        Ok(Self::from_device(Arc::new(device), Arc::new(queue)))
    }

    /// Wrap a device and queue owned by the application.
    pub fn from_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            next_id: 1,
            modules: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            slots: BTreeMap::new(),
        }
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// The wgpu buffer behind a handle.
    pub fn buffer(&self, buffer: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&buffer)
    }

    /// The naga module a stage was compiled to.
    pub fn module(&self, shader: ShaderHandle) -> Option<&naga::Module> {
        self.modules.get(&shader)
    }

    /// One bind-group entry per bound slot, with the slot as binding index.
    pub fn bind_group_entries(&self) -> Vec<wgpu::BindGroupEntry<'_>> {
        self.slots
            .iter()
            .filter_map(|(&slot, &(handle, range))| {
                let buffer = self.buffers.get(&handle)?;
                let (offset, size) = match range {
                    Some(range) => (range.offset, wgpu::BufferSize::new(range.size)),
                    None => (0, None),
                };
                Some(wgpu::BindGroupEntry {
                    binding: slot,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset,
                        size,
                    }),
                })
            })
            .collect()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, BackendError> {
        let module = parse_glsl(stage, source)?;
        let handle = ShaderHandle(self.allocate_id());
        log::trace!("wgpu: compiled {stage} shader {handle:?}");
        self.modules.insert(handle, module);
        Ok(handle)
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, BackendError> {
        let modules = shaders
            .iter()
            .map(|s| {
                self.modules
                    .get(s)
                    .ok_or_else(|| BackendError::LinkFailed(format!("unknown shader {s:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let interface = reflect_modules(&modules);

        let handle = ProgramHandle(self.allocate_id());
        log::trace!(
            "wgpu: linked program {handle:?} ({} uniforms, {} blocks)",
            interface.uniforms.len(),
            interface.blocks.len()
        );
        self.programs.insert(
            handle,
            WgpuProgram {
                interface,
                block_slots: HashMap::new(),
            },
        );
        Ok(handle)
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.modules.remove(&shader);
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn program_interface(&self, program: ProgramHandle) -> Result<ProgramInterface, BackendError> {
        self.programs
            .get(&program)
            .map(|p| p.interface.clone())
            .ok_or_else(|| BackendError::InvalidHandle(format!("program {program:?}")))
    }

    fn bind_block_to_slot(
        &mut self,
        program: ProgramHandle,
        block_name: &str,
        slot: u32,
    ) -> Result<(), BackendError> {
        let entry = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| BackendError::InvalidHandle(format!("program {program:?}")))?;
        entry.block_slots.insert(block_name.to_string(), slot);
        Ok(())
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferHandle, BackendError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: convert_buffer_usage(descriptor.usage),
            mapped_at_creation: false,
        });

        let handle = BufferHandle(self.allocate_id());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(target) = self.buffers.remove(&buffer) {
            target.destroy();
            self.slots.retain(|_, &mut (bound, _)| bound != buffer);
        }
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let target = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| BackendError::InvalidHandle(format!("buffer {buffer:?}")))?;

        let len = data.len() as u64;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(BackendError::FeatureNotSupported(format!(
                "unaligned buffer write {offset}+{len}"
            )));
        }
        if offset + len > target.size() {
            return Err(BackendError::ResourceCreationFailed(format!(
                "write {offset}+{len} exceeds buffer of {} bytes",
                target.size()
            )));
        }

        self.queue.write_buffer(target, offset, data);
        Ok(())
    }

    fn bind_buffer_to_slot(
        &mut self,
        buffer: BufferHandle,
        slot: u32,
        range: Option<BufferRange>,
    ) -> Result<(), BackendError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(BackendError::InvalidHandle(format!("buffer {buffer:?}")));
        }
        self.slots.insert(slot, (buffer, range));
        Ok(())
    }

    fn max_uniform_buffer_bindings(&self) -> u32 {
        self.device.limits().max_uniform_buffers_per_shader_stage
    }

    fn set_uniform(
        &mut self,
        _program: ProgramHandle,
        _location: i32,
        _value: &UniformValue,
    ) -> Result<(), BackendError> {
        Err(BackendError::FeatureNotSupported(
            "wgpu has no default-block uniforms; use uniform blocks".to_string(),
        ))
    }
}

fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut result = wgpu::BufferUsages::empty();

    if usage.contains(BufferUsage::UNIFORM) {
        result |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        result |= wgpu::BufferUsages::COPY_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= wgpu::BufferUsages::COPY_DST;
    }

    result
}
