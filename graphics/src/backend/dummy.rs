//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. It keeps buffer contents in host
//! memory and records every write, bind and uniform upload so tests can check
//! exactly what the uniform system sent to the driver.
//!
//! Program introspection is scripted: queue a [`ProgramInterface`] with
//! [`DummyBackend::queue_program_interface`] and the next linked program
//! reports it. Programs linked with nothing queued have no active uniforms.

use std::collections::{HashMap, VecDeque};

use crate::shader::ShaderStage;
use crate::types::{BufferDescriptor, BufferRange, UniformValue};

use super::{
    BackendError, BufferHandle, GpuBackend, ProgramHandle, ProgramInterface, ShaderHandle,
};

/// Binding points reported when no other value is configured.
const DEFAULT_MAX_UNIFORM_BUFFER_BINDINGS: u32 = 24;

/// A `write_buffer` call seen by the dummy backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// A `bind_buffer_to_slot` call seen by the dummy backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBind {
    pub buffer: BufferHandle,
    pub slot: u32,
    pub range: Option<BufferRange>,
}

/// A `set_uniform` call seen by the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUniform {
    pub program: ProgramHandle,
    pub location: i32,
    pub value: UniformValue,
}

#[derive(Debug)]
struct DummyShader {
    stage: ShaderStage,
    source: String,
}

#[derive(Debug, Default)]
struct DummyProgram {
    interface: ProgramInterface,
    block_slots: HashMap<String, u32>,
}

#[derive(Debug)]
struct DummyBuffer {
    label: Option<String>,
    contents: Vec<u8>,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    next_id: u64,
    max_uniform_buffer_bindings: u32,
    shaders: HashMap<ShaderHandle, DummyShader>,
    programs: HashMap<ProgramHandle, DummyProgram>,
    buffers: HashMap<BufferHandle, DummyBuffer>,
    slots: HashMap<u32, RecordedBind>,
    queued_interfaces: VecDeque<ProgramInterface>,
    compile_failure: Option<String>,
    link_failure: Option<String>,
    writes: Vec<RecordedWrite>,
    binds: Vec<RecordedBind>,
    uniforms: Vec<RecordedUniform>,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            max_uniform_buffer_bindings: DEFAULT_MAX_UNIFORM_BUFFER_BINDINGS,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            slots: HashMap::new(),
            queued_interfaces: VecDeque::new(),
            compile_failure: None,
            link_failure: None,
            writes: Vec::new(),
            binds: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    /// Report `count` uniform-buffer binding points.
    pub fn with_max_uniform_buffer_bindings(mut self, count: u32) -> Self {
        self.max_uniform_buffer_bindings = count;
        self
    }

    /// Make the next linked program report `interface`.
    pub fn queue_program_interface(&mut self, interface: ProgramInterface) {
        self.queued_interfaces.push_back(interface);
    }

    /// Make the next `compile_shader` call fail with `log`.
    pub fn fail_next_compile(&mut self, log: impl Into<String>) {
        self.compile_failure = Some(log.into());
    }

    /// Make the next `link_program` call fail with `log`.
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.link_failure = Some(log.into());
    }

    /// Every buffer write since the last [`clear_recorded`](Self::clear_recorded).
    pub fn writes(&self) -> &[RecordedWrite] {
        &self.writes
    }

    /// Every buffer bind since the last clear.
    pub fn binds(&self) -> &[RecordedBind] {
        &self.binds
    }

    /// Every default-block uniform upload since the last clear.
    pub fn uniform_uploads(&self) -> &[RecordedUniform] {
        &self.uniforms
    }

    /// Forget recorded writes, binds and uniform uploads.
    pub fn clear_recorded(&mut self) {
        self.writes.clear();
        self.binds.clear();
        self.uniforms.clear();
    }

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.contents.as_slice())
    }

    /// Debug label a buffer was created with.
    pub fn buffer_label(&self, buffer: BufferHandle) -> Option<&str> {
        self.buffers.get(&buffer).and_then(|b| b.label.as_deref())
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live shader stages.
    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Number of live programs.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Slot the program's block was last bound to.
    pub fn block_slot(&self, program: ProgramHandle, block_name: &str) -> Option<u32> {
        self.programs
            .get(&program)
            .and_then(|p| p.block_slots.get(block_name).copied())
    }

    /// The buffer currently bound to `slot`.
    pub fn slot_binding(&self, slot: u32) -> Option<&RecordedBind> {
        self.slots.get(&slot)
    }

    /// Stage and source a shader was compiled from.
    pub fn shader_source(&self, shader: ShaderHandle) -> Option<(ShaderStage, &str)> {
        self.shaders
            .get(&shader)
            .map(|s| (s.stage, s.source.as_str()))
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, BackendError> {
        if let Some(log) = self.compile_failure.take() {
            log::trace!("DummyBackend: failing {stage} compile on request");
            return Err(BackendError::CompileFailed(log));
        }

        let handle = ShaderHandle(self.allocate_id());
        log::trace!(
            "DummyBackend: compiled {stage} shader {:?} ({} bytes)",
            handle,
            source.len()
        );
        self.shaders.insert(
            handle,
            DummyShader {
                stage,
                source: source.to_string(),
            },
        );
        Ok(handle)
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, BackendError> {
        if let Some(log) = self.link_failure.take() {
            log::trace!("DummyBackend: failing link on request");
            return Err(BackendError::LinkFailed(log));
        }
        if let Some(missing) = shaders.iter().find(|s| !self.shaders.contains_key(*s)) {
            return Err(BackendError::InvalidHandle(format!("shader {missing:?}")));
        }

        let handle = ProgramHandle(self.allocate_id());
        let interface = self.queued_interfaces.pop_front().unwrap_or_default();
        log::trace!(
            "DummyBackend: linked program {:?} ({} uniforms, {} blocks)",
            handle,
            interface.uniforms.len(),
            interface.blocks.len()
        );
        self.programs.insert(
            handle,
            DummyProgram {
                interface,
                block_slots: HashMap::new(),
            },
        );
        Ok(handle)
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader).is_some() {
            log::trace!("DummyBackend: deleted shader {shader:?}");
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            log::trace!("DummyBackend: deleted program {program:?}");
        }
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
        log::trace!("DummyBackend: block '{block_name}' of {program:?} -> slot {slot}");
        entry.block_slots.insert(block_name.to_string(), slot);
        Ok(())
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferHandle, BackendError> {
        let handle = BufferHandle(self.allocate_id());
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        self.buffers.insert(
            handle,
            DummyBuffer {
                label: descriptor.label.clone(),
                contents: vec![0; descriptor.size as usize],
            },
        );
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            log::trace!("DummyBackend: destroyed buffer {buffer:?}");
            self.slots.retain(|_, bind| bind.buffer != buffer);
        }
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| BackendError::InvalidHandle(format!("buffer {buffer:?}")))?;

        let start = offset as usize;
        let end = start + data.len();
        if end > entry.contents.len() {
            return Err(BackendError::ResourceCreationFailed(format!(
                "write {start}..{end} exceeds buffer of {} bytes",
                entry.contents.len()
            )));
        }
        entry.contents[start..end].copy_from_slice(data);

        log::trace!("DummyBackend: write {:?} [{start}..{end})", buffer);
        self.writes.push(RecordedWrite {
            buffer,
            offset,
            size: data.len() as u64,
        });
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
        if slot >= self.max_uniform_buffer_bindings {
            return Err(BackendError::FeatureNotSupported(format!(
                "binding point {slot} (device exposes {})",
                self.max_uniform_buffer_bindings
            )));
        }

        log::trace!("DummyBackend: buffer {:?} -> slot {slot} ({range:?})", buffer);
        let bind = RecordedBind {
            buffer,
            slot,
            range,
        };
        self.slots.insert(slot, bind.clone());
        self.binds.push(bind);
        Ok(())
    }

    fn max_uniform_buffer_bindings(&self) -> u32 {
        self.max_uniform_buffer_bindings
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: i32,
        value: &UniformValue,
    ) -> Result<(), BackendError> {
        if !self.programs.contains_key(&program) {
            return Err(BackendError::InvalidHandle(format!("program {program:?}")));
        }
        log::trace!("DummyBackend: uniform {location} of {program:?} = {value:?}");
        self.uniforms.push(RecordedUniform {
            program,
            location,
            value: *value,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ActiveUniform, ActiveUniformBlock};
    use crate::types::UniformType;

    #[test]
    fn test_queued_interface_is_reported_once() {
        let mut backend = DummyBackend::new();
        backend.queue_program_interface(
            ProgramInterface::new()
                .with_uniform(ActiveUniform::new("tint", 0, UniformType::Vec4))
                .with_block(ActiveUniformBlock::new("Camera", 0, 64)),
        );

        let vs = backend.compile_shader(ShaderStage::Vertex, "void main() {}").unwrap();
        let first = backend.link_program(&[vs]).unwrap();
        let second = backend.link_program(&[vs]).unwrap();

        assert_eq!(backend.program_interface(first).unwrap().uniforms.len(), 1);
        assert!(backend.program_interface(second).unwrap().uniforms.is_empty());
    }

    #[test]
    fn test_scripted_failures() {
        let mut backend = DummyBackend::new();
        backend.fail_next_compile("0:1: error");
        assert_eq!(
            backend.compile_shader(ShaderStage::Fragment, ""),
            Err(BackendError::CompileFailed("0:1: error".into()))
        );
        let fs = backend.compile_shader(ShaderStage::Fragment, "").unwrap();

        backend.fail_next_link("link error");
        assert!(backend.link_program(&[fs]).is_err());
        assert!(backend.link_program(&[fs]).is_ok());
    }

    #[test]
    fn test_write_updates_contents() {
        let mut backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::uniform(8).with_label("Test"))
            .unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();

        assert_eq!(backend.buffer_contents(buffer), Some(&[0, 0, 0, 0, 1, 2, 3, 4][..]));
        assert_eq!(backend.buffer_label(buffer), Some("Test"));
        assert_eq!(backend.writes().len(), 1);
        assert!(backend.write_buffer(buffer, 6, &[0; 4]).is_err());
    }

    #[test]
    fn test_bind_respects_device_limit() {
        let mut backend = DummyBackend::new().with_max_uniform_buffer_bindings(2);
        let buffer = backend.create_buffer(&BufferDescriptor::uniform(16)).unwrap();

        assert!(backend.bind_buffer_to_slot(buffer, 1, None).is_ok());
        assert!(backend.bind_buffer_to_slot(buffer, 2, None).is_err());
        assert_eq!(backend.slot_binding(1).map(|b| b.buffer), Some(buffer));
    }

    #[test]
    fn test_released_objects_are_forgotten() {
        let mut backend = DummyBackend::new();
        let vs = backend.compile_shader(ShaderStage::Vertex, "void main() {}").unwrap();
        let program = backend.link_program(&[vs]).unwrap();
        let buffer = backend.create_buffer(&BufferDescriptor::uniform(16)).unwrap();
        backend.bind_buffer_to_slot(buffer, 3, None).unwrap();

        backend.delete_shader(vs);
        assert_eq!(backend.shader_count(), 0);
        assert!(backend.program_interface(program).is_ok());

        backend.delete_program(program);
        backend.destroy_buffer(buffer);
        assert_eq!(backend.program_count(), 0);
        assert_eq!(backend.buffer_count(), 0);
        assert!(backend.slot_binding(3).is_none());
        assert!(backend.program_interface(program).is_err());
    }

    #[test]
    fn test_unknown_handles_are_rejected() {
        let mut backend = DummyBackend::new();
        assert!(backend.link_program(&[ShaderHandle(99)]).is_err());
        assert!(
            backend
                .set_uniform(ProgramHandle(7), 0, &UniformValue::Float(1.0))
                .is_err()
        );
        assert!(backend.write_buffer(BufferHandle(3), 0, &[0]).is_err());
    }
}
