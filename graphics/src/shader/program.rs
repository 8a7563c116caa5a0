//! Linked shader programs.

use std::collections::BTreeMap;
use std::sync::Arc;

use uniforge_core::profiling::profile_scope;

use crate::backend::{BackendError, GpuBackend, ProgramHandle, ShaderHandle};
use crate::context::GraphicsResourceContext;
use crate::error::{GraphicsError, ShaderError, format_error_log};
use crate::uniform::{BlockCategory, UniformBlockDescriptor, UniformDescriptor};

use super::{ShaderStage, UniformReflector};

type BlocksByCategory = [BTreeMap<String, Arc<UniformBlockDescriptor>>; 4];

/// Default-block uniforms, their total size and the blocks of a program.
type ReflectedProgram = (BTreeMap<String, UniformDescriptor>, u32, BlocksByCategory);

fn delete_stages<B: GpuBackend>(backend: &mut B, stages: &[ShaderHandle]) {
    for &stage in stages {
        backend.delete_shader(stage);
    }
}

/// Source text of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub source: String,
}

impl ShaderSource {
    /// Create a stage source.
    pub fn new(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Vertex stage source.
    pub fn vertex(source: impl Into<String>) -> Self {
        Self::new(ShaderStage::Vertex, source)
    }

    /// Geometry stage source.
    pub fn geometry(source: impl Into<String>) -> Self {
        Self::new(ShaderStage::Geometry, source)
    }

    /// Fragment stage source.
    pub fn fragment(source: impl Into<String>) -> Self {
        Self::new(ShaderStage::Fragment, source)
    }

    /// Compute stage source.
    pub fn compute(source: impl Into<String>) -> Self {
        Self::new(ShaderStage::Compute, source)
    }
}

/// A linked program and the layout of its uniforms.
///
/// Creating a shader composes, compiles and links every stage, reflects the
/// program's uniforms and gives each of its uniform blocks a binding point.
/// Descriptors are read-only afterwards; block descriptors are shared through
/// `Arc` with the synchronizers that mirror them.
#[derive(Debug)]
pub struct Shader {
    name: String,
    program: ProgramHandle,
    sources: Vec<ShaderSource>,
    features: Vec<String>,
    uniforms: BTreeMap<String, UniformDescriptor>,
    default_block_size: u32,
    uniform_blocks: BlocksByCategory,
}

impl Shader {
    /// Build a shader from stage sources with the given features enabled.
    ///
    /// # Errors
    ///
    /// - [`ShaderError::IncludeNotFound`] if composition fails
    /// - [`ShaderError::Compilation`] / [`ShaderError::Linking`] with the
    ///   indented driver log
    /// - [`ShaderError::UnresolvedStructOrder`] under
    ///   [`StructOrderPolicy::Strict`](super::StructOrderPolicy::Strict)
    /// - [`BindingError::PoolExhausted`](crate::error::BindingError::PoolExhausted)
    ///   when a block category runs out of binding points
    pub fn new<B: GpuBackend>(
        ctx: &mut GraphicsResourceContext<B>,
        name: &str,
        sources: &[ShaderSource],
        features: &[&str],
    ) -> Result<Self, GraphicsError> {
        profile_scope!("shader_new");

        Self::build(ctx, name, sources, features).inspect_err(|err| {
            log::error!("Failed to create shader '{name}': {err}");
        })
    }

    fn build<B: GpuBackend>(
        ctx: &mut GraphicsResourceContext<B>,
        name: &str,
        sources: &[ShaderSource],
        features: &[&str],
    ) -> Result<Self, GraphicsError> {
        let composed = sources
            .iter()
            .map(|s| {
                ctx.composer()
                    .compose(&s.source, s.stage, features)
                    .map(|source| ShaderSource::new(s.stage, source))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut stages: Vec<ShaderHandle> = Vec::with_capacity(composed.len());
        for source in &composed {
            match ctx.backend_mut().compile_shader(source.stage, &source.source) {
                Ok(handle) => stages.push(handle),
                Err(err) => {
                    delete_stages(ctx.backend_mut(), &stages);
                    return Err(match err {
                        BackendError::CompileFailed(log) => ShaderError::Compilation {
                            shader: name.to_string(),
                            stage: source.stage,
                            log: format_error_log(&log),
                        }
                        .into(),
                        other => GraphicsError::from(other),
                    });
                }
            }
        }

        // Stage objects are not needed once the program is linked
        let linked = ctx.backend_mut().link_program(&stages);
        delete_stages(ctx.backend_mut(), &stages);
        let program = linked.map_err(|err| match err {
            BackendError::LinkFailed(log) => ShaderError::Linking {
                shader: name.to_string(),
                log: format_error_log(&log),
            }
            .into(),
            other => GraphicsError::from(other),
        })?;

        let (uniforms, default_block_size, uniform_blocks) =
            match Self::reflect_program(ctx, name, program, &composed) {
                Ok(reflected) => reflected,
                Err(err) => {
                    ctx.backend_mut().delete_program(program);
                    return Err(err);
                }
            };

        let enabled = features
            .iter()
            .filter(|f| {
                composed
                    .iter()
                    .any(|s| s.source.lines().any(|l| l.trim() == format!("#define {f}")))
            })
            .map(|f| (*f).to_string())
            .collect();

        log::info!(
            "Created shader '{}' ({} stage(s), {} uniform(s), {} uniform block(s))",
            name,
            composed.len(),
            uniforms.len(),
            uniform_blocks.iter().map(BTreeMap::len).sum::<usize>()
        );

        Ok(Self {
            name: name.to_string(),
            program,
            sources: composed,
            features: enabled,
            uniforms,
            default_block_size,
            uniform_blocks,
        })
    }

    /// Reflect a linked program and give each of its blocks a binding point.
    fn reflect_program<B: GpuBackend>(
        ctx: &mut GraphicsResourceContext<B>,
        name: &str,
        program: ProgramHandle,
        composed: &[ShaderSource],
    ) -> Result<ReflectedProgram, GraphicsError> {
        let interface = ctx.backend().program_interface(program)?;
        let texts: Vec<&str> = composed.iter().map(|s| s.source.as_str()).collect();
        let reflected = UniformReflector::new(name)
            .with_policy(ctx.parameters().struct_order_policy)
            .reflect(&interface, &texts)?;

        let mut uniform_blocks: BlocksByCategory = Default::default();
        for mut block in reflected.blocks {
            let slot = ctx.register_uniform_block(program, &block.name, block.category)?;
            block.binding_point = Some(slot);
            uniform_blocks[block.category.index()].insert(block.name.clone(), Arc::new(block));
        }

        Ok((reflected.uniforms, reflected.default_block_size, uniform_blocks))
    }

    /// Release the program.
    ///
    /// Binding points stay assigned to the block names, so shaders created
    /// later with the same blocks reuse them.
    pub fn destroy<B: GpuBackend>(self, ctx: &mut GraphicsResourceContext<B>) {
        log::debug!("Destroying shader '{}'", self.name);
        ctx.backend_mut().delete_program(self.program);
    }

    /// Shader name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The linked program.
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Composed stage sources, as compiled.
    pub fn sources(&self) -> &[ShaderSource] {
        &self.sources
    }

    /// Requested features the sources declared, and which are therefore defined.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Default-block uniforms keyed by name.
    pub fn uniforms(&self) -> &BTreeMap<String, UniformDescriptor> {
        &self.uniforms
    }

    /// A default-block uniform; `light.ambient` resolves to a struct member.
    pub fn uniform(&self, name: &str) -> Option<&UniformDescriptor> {
        self.uniforms.get(name).or_else(|| {
            let (parent, member) = name.rsplit_once('.')?;
            self.uniforms.get(parent)?.member(member)
        })
    }

    /// Total size of the default-block uniforms.
    pub fn default_block_size(&self) -> u32 {
        self.default_block_size
    }

    /// Uniform blocks of `category`, keyed by name.
    pub fn uniform_blocks(
        &self,
        category: BlockCategory,
    ) -> &BTreeMap<String, Arc<UniformBlockDescriptor>> {
        &self.uniform_blocks[category.index()]
    }

    /// A uniform block by name.
    pub fn uniform_block(&self, name: &str) -> Option<&Arc<UniformBlockDescriptor>> {
        self.uniform_blocks(BlockCategory::from_block_name(name))
            .get(name)
    }

    /// Combined size of every uniform block.
    pub fn uniform_blocks_size(&self) -> u32 {
        self.uniform_blocks
            .iter()
            .flat_map(BTreeMap::values)
            .map(|b| b.size)
            .sum()
    }

    /// Whether the program has default-block uniforms.
    pub fn has_uniforms(&self) -> bool {
        !self.uniforms.is_empty()
    }

    /// Whether the program has a default-block uniform `name`.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniform(name).is_some()
    }

    /// Whether the program has any uniform block.
    pub fn has_uniform_blocks(&self) -> bool {
        self.uniform_blocks.iter().any(|blocks| !blocks.is_empty())
    }

    /// Whether the program has a uniform block `name`.
    pub fn has_uniform_block(&self, name: &str) -> bool {
        self.uniform_block(name).is_some()
    }
}
