//! Common utilities for uniform-system integration tests.
//!
//! Tests run against the [`DummyBackend`], which lets them script the
//! program interface a driver would report after linking.

use uniforge_graphics::backend::{ActiveUniform, ActiveUniformBlock, DummyBackend, ProgramInterface};
use uniforge_graphics::{
    ContextParameters, GraphicsResourceContext, Shader, ShaderSource, UniformType,
};

/// Fragment shader declaring the `Light` struct of the layout tests.
pub const LIGHT_FS: &str = r#"
#version 330 core

/* Lighting parameters.
   Members are uploaded in declaration order. */
struct Light {
    vec3 ambient;   // ambient term
    vec3 diffuse;
    float intensity;
};

uniform Light light;
out vec4 frag_color;

void main() {
    frag_color = vec4((light.ambient + light.diffuse) * light.intensity, 1.0);
}
"#;

/// Fragment shader with no uniforms of its own.
#[allow(dead_code)]
pub const NOOP_FS: &str = "#version 330 core\nvoid main() {}\n";

/// Initialize logging and the graphics subsystem once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
    uniforge_graphics::init();
}

/// A context on a dummy backend exposing `max_bindings` binding points.
pub fn context(max_bindings: u32) -> GraphicsResourceContext<DummyBackend> {
    init_logging();
    GraphicsResourceContext::new(
        DummyBackend::new().with_max_uniform_buffer_bindings(max_bindings),
    )
}

/// A context with custom parameters on a dummy backend.
#[allow(dead_code)]
pub fn context_with(parameters: ContextParameters) -> GraphicsResourceContext<DummyBackend> {
    init_logging();
    GraphicsResourceContext::with_parameters(DummyBackend::new(), parameters)
}

/// Type of each `Light` member.
pub fn light_member_type(name: &str) -> UniformType {
    match name {
        "intensity" => UniformType::Float,
        _ => UniformType::Vec3,
    }
}

/// The `Light` uniform as a driver reporting members in `order` would.
#[allow(dead_code)]
pub fn light_interface(order: &[&str]) -> ProgramInterface {
    order
        .iter()
        .enumerate()
        .fold(ProgramInterface::new(), |interface, (location, member)| {
            interface.with_uniform(ActiveUniform::new(
                format!("light.{member}"),
                location as i32,
                light_member_type(member),
            ))
        })
}

/// Block members as `(name, type, offset)`.
pub type MemberSpec<'a> = (&'a str, UniformType, u32);

/// A single uniform block with the given members.
#[allow(dead_code)]
pub fn block_interface(name: &str, size: u32, members: &[MemberSpec<'_>]) -> ProgramInterface {
    members.iter().fold(
        ProgramInterface::new().with_block(ActiveUniformBlock::new(name, 0, size)),
        |interface, &(member, ty, offset)| {
            interface.with_uniform(ActiveUniform::block_member(
                format!("{name}.{member}"),
                ty,
                0,
                offset,
            ))
        },
    )
}

/// Link a fragment-only shader whose driver reports `interface`.
#[allow(dead_code)]
pub fn shader_with(
    ctx: &mut GraphicsResourceContext<DummyBackend>,
    name: &str,
    interface: ProgramInterface,
) -> Shader {
    ctx.backend_mut().queue_program_interface(interface);
    Shader::new(ctx, name, &[ShaderSource::fragment(NOOP_FS)], &[])
        .expect("Failed to create shader")
}
