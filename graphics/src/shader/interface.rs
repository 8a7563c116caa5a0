//! Program introspection through naga.
//!
//! Backends without a driver-side introspection API (wgpu) parse each GLSL
//! stage with naga and derive the same [`ProgramInterface`] a GL driver would
//! report: one [`ActiveUniformBlock`] per uniform-space struct, members
//! flattened into `Block.member`, `Block.array[0]` and `Block.array[i].field`
//! records with std140 offsets, and opaque texture handles as sampler uniforms
//! whose location is their binding index.

use std::collections::HashMap;

use uniforge_core::profiling::profile_scope;

use crate::backend::{ActiveUniform, ActiveUniformBlock, BackendError, ProgramInterface};
use crate::types::UniformType;

use super::ShaderStage;

/// Parse and validate one GLSL stage.
pub fn parse_glsl(stage: ShaderStage, source: &str) -> Result<naga::Module, BackendError> {
    profile_scope!("parse_glsl");

    let naga_stage = stage.to_naga().ok_or_else(|| {
        BackendError::FeatureNotSupported(format!("{stage} shaders cannot be parsed by naga"))
    })?;
    let options = naga::front::glsl::Options::from(naga_stage);
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| BackendError::CompileFailed(format!("{errors}")))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| BackendError::CompileFailed(format!("validation error: {e}")))?;

    Ok(module)
}

/// Parse every stage and merge their interfaces.
pub fn reflect_glsl(stages: &[(ShaderStage, &str)]) -> Result<ProgramInterface, BackendError> {
    let modules = stages
        .iter()
        .map(|(stage, source)| parse_glsl(*stage, source))
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&naga::Module> = modules.iter().collect();
    Ok(reflect_modules(&refs))
}

/// Merge the interfaces of the stages of one program.
///
/// A block or sampler declared in several stages is reported once.
pub fn reflect_modules(modules: &[&naga::Module]) -> ProgramInterface {
    let mut interface = ProgramInterface::new();
    let mut block_indices: HashMap<String, u32> = HashMap::new();

    for module in modules {
        for (_, var) in module.global_variables.iter() {
            match var.space {
                naga::AddressSpace::Uniform => {
                    reflect_block(module, var, &mut block_indices, &mut interface);
                }
                naga::AddressSpace::Handle => reflect_handle(module, var, &mut interface),
                _ => {}
            }
        }
    }

    interface
}

fn reflect_block(
    module: &naga::Module,
    var: &naga::GlobalVariable,
    block_indices: &mut HashMap<String, u32>,
    interface: &mut ProgramInterface,
) {
    let ty = &module.types[var.ty];
    let naga::TypeInner::Struct { ref members, span } = ty.inner else {
        return;
    };
    let Some(name) = ty.name.clone().or_else(|| var.name.clone()) else {
        return;
    };
    if block_indices.contains_key(&name) {
        return;
    }

    let index = block_indices.len() as u32;
    block_indices.insert(name.clone(), index);
    interface
        .blocks
        .push(ActiveUniformBlock::new(name.clone(), index, span));

    for member in members {
        let Some(member_name) = &member.name else {
            continue;
        };
        flatten_member(
            module,
            &format!("{name}.{member_name}"),
            member.ty,
            member.offset,
            index,
            &mut interface.uniforms,
        );
    }
}

fn flatten_member(
    module: &naga::Module,
    path: &str,
    ty: naga::Handle<naga::Type>,
    offset: u32,
    block_index: u32,
    out: &mut Vec<ActiveUniform>,
) {
    match module.types[ty].inner {
        naga::TypeInner::Struct { ref members, .. } => {
            for member in members {
                if let Some(member_name) = &member.name {
                    flatten_member(
                        module,
                        &format!("{path}.{member_name}"),
                        member.ty,
                        offset + member.offset,
                        block_index,
                        out,
                    );
                }
            }
        }
        naga::TypeInner::Array { base, size, stride } => {
            let count = match size {
                naga::ArraySize::Constant(count) => count.get(),
                _ => 1,
            };
            if let naga::TypeInner::Struct { .. } = module.types[base].inner {
                for i in 0..count {
                    flatten_member(
                        module,
                        &format!("{path}[{i}]"),
                        base,
                        offset + i * stride,
                        block_index,
                        out,
                    );
                }
            } else if let Some(uniform_type) = uniform_type_of(&module.types[base].inner) {
                out.push(
                    ActiveUniform::block_member(
                        format!("{path}[0]"),
                        uniform_type,
                        block_index,
                        offset,
                    )
                    .with_array_count(count)
                    .with_array_stride(stride),
                );
            }
        }
        ref inner => {
            if let Some(uniform_type) = uniform_type_of(inner) {
                out.push(ActiveUniform::block_member(
                    path,
                    uniform_type,
                    block_index,
                    offset,
                ));
            }
        }
    }
}

fn reflect_handle(module: &naga::Module, var: &naga::GlobalVariable, interface: &mut ProgramInterface) {
    let Some(name) = &var.name else {
        return;
    };
    if interface.uniforms.iter().any(|u| &u.name == name) {
        return;
    }
    if let Some(uniform_type) = uniform_type_of(&module.types[var.ty].inner) {
        let location = var.binding.as_ref().map_or(-1, |b| b.binding as i32);
        interface
            .uniforms
            .push(ActiveUniform::new(name.clone(), location, uniform_type));
    }
}

fn uniform_type_of(inner: &naga::TypeInner) -> Option<UniformType> {
    use naga::{ScalarKind, VectorSize};

    let ty = match *inner {
        naga::TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => UniformType::Float,
            ScalarKind::Sint => UniformType::Int,
            ScalarKind::Uint => UniformType::UInt,
            ScalarKind::Bool => UniformType::Bool,
            _ => return None,
        },
        naga::TypeInner::Vector { size, scalar } => match (scalar.kind, size) {
            (ScalarKind::Float, VectorSize::Bi) => UniformType::Vec2,
            (ScalarKind::Float, VectorSize::Tri) => UniformType::Vec3,
            (ScalarKind::Float, VectorSize::Quad) => UniformType::Vec4,
            (ScalarKind::Sint, VectorSize::Bi) => UniformType::IVec2,
            (ScalarKind::Sint, VectorSize::Tri) => UniformType::IVec3,
            (ScalarKind::Sint, VectorSize::Quad) => UniformType::IVec4,
            (ScalarKind::Uint, VectorSize::Bi) => UniformType::UVec2,
            (ScalarKind::Uint, VectorSize::Tri) => UniformType::UVec3,
            (ScalarKind::Uint, VectorSize::Quad) => UniformType::UVec4,
            (ScalarKind::Bool, VectorSize::Bi) => UniformType::BVec2,
            (ScalarKind::Bool, VectorSize::Tri) => UniformType::BVec3,
            (ScalarKind::Bool, VectorSize::Quad) => UniformType::BVec4,
            _ => return None,
        },
        naga::TypeInner::Matrix { columns, rows, .. } => match (columns, rows) {
            (VectorSize::Bi, VectorSize::Bi) => UniformType::Mat2,
            (VectorSize::Tri, VectorSize::Tri) => UniformType::Mat3,
            (VectorSize::Quad, VectorSize::Quad) => UniformType::Mat4,
            (VectorSize::Bi, VectorSize::Tri) => UniformType::Mat2x3,
            (VectorSize::Bi, VectorSize::Quad) => UniformType::Mat2x4,
            (VectorSize::Tri, VectorSize::Bi) => UniformType::Mat3x2,
            (VectorSize::Tri, VectorSize::Quad) => UniformType::Mat3x4,
            (VectorSize::Quad, VectorSize::Bi) => UniformType::Mat4x2,
            (VectorSize::Quad, VectorSize::Tri) => UniformType::Mat4x3,
        },
        naga::TypeInner::Image {
            dim,
            arrayed,
            class,
        } => match (dim, arrayed) {
            (naga::ImageDimension::D2, true) => UniformType::Sampler2DArray,
            (naga::ImageDimension::D3, _) => UniformType::Sampler3D,
            (naga::ImageDimension::Cube, _) => UniformType::SamplerCube,
            _ if matches!(class, naga::ImageClass::Depth { .. }) => UniformType::Sampler2DShadow,
            _ => UniformType::Sampler2D,
        },
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMERA_VS: &str = r#"#version 450
layout(std140, set = 0, binding = 0) uniform Camera {
    mat4 view_projection;
    vec4 tint;
    vec4 weights[4];
} camera;

layout(location = 0) in vec3 position;

void main() {
    gl_Position = camera.view_projection * vec4(position, 1.0) + camera.tint * camera.weights[2].x;
}
"#;

    #[test]
    fn test_block_is_reported() {
        let interface = reflect_glsl(&[(ShaderStage::Vertex, CAMERA_VS)]).unwrap();

        assert_eq!(interface.blocks.len(), 1);
        let block = &interface.blocks[0];
        assert_eq!(block.name, "Camera");
        assert_eq!(block.index, 0);
        assert_eq!(block.size, 144);
    }

    #[test]
    fn test_members_are_flattened_with_offsets() {
        let interface = reflect_glsl(&[(ShaderStage::Vertex, CAMERA_VS)]).unwrap();
        let find = |name: &str| {
            interface
                .uniforms
                .iter()
                .find(|u| u.name == name)
                .unwrap_or_else(|| panic!("missing {name}"))
        };

        let view = find("Camera.view_projection");
        assert_eq!(view.ty, UniformType::Mat4);
        assert_eq!(view.block_index, Some(0));
        assert_eq!(view.block_offset, 0);

        assert_eq!(find("Camera.tint").block_offset, 64);

        let weights = find("Camera.weights[0]");
        assert_eq!(weights.block_offset, 80);
        assert_eq!(weights.array_count, 4);
        assert_eq!(weights.array_stride, 16);
    }

    #[test]
    fn test_shared_block_reported_once() {
        let fs = r#"#version 450
layout(std140, set = 0, binding = 0) uniform Camera {
    mat4 view_projection;
    vec4 tint;
    vec4 weights[4];
} camera;

layout(location = 0) out vec4 out_color;

void main() {
    out_color = camera.tint;
}
"#;
        let interface =
            reflect_glsl(&[(ShaderStage::Vertex, CAMERA_VS), (ShaderStage::Fragment, fs)])
                .unwrap();
        assert_eq!(interface.blocks.len(), 1);
        assert_eq!(
            interface
                .uniforms
                .iter()
                .filter(|u| u.name == "Camera.tint")
                .count(),
            1
        );
    }

    #[test]
    fn test_geometry_stage_is_not_supported() {
        let result = parse_glsl(ShaderStage::Geometry, "#version 450\nvoid main() {}");
        assert!(matches!(result, Err(BackendError::FeatureNotSupported(_))));
    }

    #[test]
    fn test_syntax_error_is_compile_failure() {
        let result = parse_glsl(ShaderStage::Fragment, "#version 450\nvoid main() { oops }");
        assert!(matches!(result, Err(BackendError::CompileFailed(_))));
    }
}
