//! Uniform reflection.
//!
//! [`UniformReflector`] turns the flat active-uniform list of a linked program
//! into layout-accurate descriptors in three steps:
//!
//! 1. **Flatten** default-block uniforms in driver order, accumulating
//!    `gpu_offset` and grouping dotted names (`light.ambient`) under a struct
//!    descriptor for their parent.
//! 2. **Recover declaration order** of every struct's members from the shader
//!    source ([`SourceDeclarations`]).
//! 3. **Compute declared offsets** by walking the members in declaration order
//!    from the struct's own offset.
//!
//! Uniform-block members are classified separately into single, struct and
//! array members using the offsets the driver reports for them.

use std::collections::{BTreeMap, HashMap};

use uniforge_core::profiling::profile_scope;

use crate::backend::{ActiveUniform, ProgramInterface};
use crate::error::ShaderError;
use crate::uniform::{
    BlockArrayMember, BlockMember, BlockStructMember, DeclaredLayout, UniformBlockDescriptor,
    UniformDescriptor, UniformKind,
};

use super::source::{SourceDeclarations, StructMemberDeclaration};

/// Alignment of a struct element inside an std140 array.
const STD140_STRUCT_ALIGNMENT: u32 = 16;

/// What to do when the member order of a struct cannot be recovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StructOrderPolicy {
    /// Leave the struct's members without a declared layout and log a
    /// warning. Mirrors then fall back to driver offsets.
    #[default]
    BestEffort,
    /// Fail shader creation with [`ShaderError::UnresolvedStructOrder`].
    Strict,
}

/// Descriptors produced for one program.
#[derive(Debug, Clone, Default)]
pub struct ReflectedUniforms {
    /// Default-block uniforms keyed by name. Struct members are nested.
    pub uniforms: BTreeMap<String, UniformDescriptor>,
    /// Sum of the sizes of all default-block uniforms.
    pub default_block_size: u32,
    /// Uniform blocks in driver order, without binding points.
    pub blocks: Vec<UniformBlockDescriptor>,
}

/// Builds uniform descriptors for one shader program.
#[derive(Debug, Clone)]
pub struct UniformReflector<'a> {
    shader_name: &'a str,
    policy: StructOrderPolicy,
}

impl<'a> UniformReflector<'a> {
    /// Create a reflector. `shader_name` only appears in diagnostics.
    pub fn new(shader_name: &'a str) -> Self {
        Self {
            shader_name,
            policy: StructOrderPolicy::default(),
        }
    }

    /// Set the unresolved-struct policy.
    pub fn with_policy(mut self, policy: StructOrderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reflect `interface`, reading struct declarations from `sources`.
    pub fn reflect(
        &self,
        interface: &ProgramInterface,
        sources: &[&str],
    ) -> Result<ReflectedUniforms, ShaderError> {
        profile_scope!("reflect_uniforms");

        let (mut uniforms, default_block_size) = flatten_default_block(&interface.uniforms);

        if uniforms.values().any(UniformDescriptor::is_struct) {
            let declarations = SourceDeclarations::parse(sources);
            self.resolve_struct_layouts(&mut uniforms, &declarations)?;
        }

        let blocks = build_blocks(interface);

        log::debug!(
            "Shader '{}': {} uniform(s) ({} bytes), {} uniform block(s)",
            self.shader_name,
            uniforms.len(),
            default_block_size,
            blocks.len()
        );

        Ok(ReflectedUniforms {
            uniforms,
            default_block_size,
            blocks,
        })
    }

    fn resolve_struct_layouts(
        &self,
        uniforms: &mut BTreeMap<String, UniformDescriptor>,
        declarations: &SourceDeclarations,
    ) -> Result<(), ShaderError> {
        for (name, descriptor) in uniforms.iter_mut() {
            let base = descriptor.gpu_offset;
            let UniformKind::Struct { type_name, members } = &mut descriptor.kind else {
                continue;
            };

            let struct_type = declarations.struct_type_of(name);
            *type_name = struct_type.map(str::to_string);
            let declared = struct_type.and_then(|t| declarations.structs.members(t));

            match declared_orders(members, declared) {
                Some(orders) => apply_declared_layout(members, &orders, base),
                None => match self.policy {
                    StructOrderPolicy::BestEffort => {
                        log::warn!(
                            "Shader '{}': could not recover member order of struct uniform '{}'; \
                             using driver offsets",
                            self.shader_name,
                            name
                        );
                        for member in members.values_mut() {
                            member.declared = None;
                        }
                    }
                    StructOrderPolicy::Strict => {
                        return Err(ShaderError::UnresolvedStructOrder {
                            shader: self.shader_name.to_string(),
                            uniform: name.clone(),
                        });
                    }
                },
            }
        }
        Ok(())
    }
}

/// Step 1: default-block uniforms in driver order.
fn flatten_default_block(uniforms: &[ActiveUniform]) -> (BTreeMap<String, UniformDescriptor>, u32) {
    let mut flattened: BTreeMap<String, UniformDescriptor> = BTreeMap::new();
    let mut offset = 0u32;

    for uniform in uniforms.iter().filter(|u| u.block_index.is_none()) {
        let name = uniform.name.strip_suffix("[0]").unwrap_or(&uniform.name);
        let descriptor =
            UniformDescriptor::value(uniform.location, uniform.ty, offset, uniform.array_count);
        let size = descriptor.size;

        match name.rsplit_once('.') {
            Some((parent, member)) => {
                let parent = flattened
                    .entry(parent.to_string())
                    .or_insert_with(|| UniformDescriptor::structure(uniform.location, offset));
                parent.size += size;
                if let UniformKind::Struct { members, .. } = &mut parent.kind {
                    members.insert(member.to_string(), descriptor);
                }
            }
            None => {
                flattened.insert(name.to_string(), descriptor);
            }
        }

        offset += size;
    }

    (flattened, offset)
}

/// Step 2: declared position of every member, or `None` if any stays unknown.
///
/// Members are looked up in the struct declaration. When exactly one member
/// is left over it takes the lowest position nobody else took, which also
/// covers single-member structs whose declaration was not found.
fn declared_orders(
    members: &BTreeMap<String, UniformDescriptor>,
    declared: Option<&[StructMemberDeclaration]>,
) -> Option<HashMap<String, u32>> {
    let mut orders = HashMap::with_capacity(members.len());
    let mut unresolved = Vec::new();

    for name in members.keys() {
        match declared.and_then(|d| d.iter().position(|m| m.name == *name)) {
            Some(position) => {
                orders.insert(name.clone(), position as u32);
            }
            None => unresolved.push(name),
        }
    }

    match unresolved.as_slice() {
        [] => {}
        [last] => {
            let mut order = 0;
            while orders.values().any(|&taken| taken == order) {
                order += 1;
            }
            orders.insert((*last).clone(), order);
        }
        _ => return None,
    }

    Some(orders)
}

/// Step 3: prefix sums of member sizes in declared order, starting at `base`.
fn apply_declared_layout(
    members: &mut BTreeMap<String, UniformDescriptor>,
    orders: &HashMap<String, u32>,
    base: u32,
) {
    let mut by_order: Vec<(&String, u32)> = orders.iter().map(|(n, &o)| (n, o)).collect();
    by_order.sort_by_key(|&(_, order)| order);

    let mut offset = base;
    for (name, order) in by_order {
        if let Some(member) = members.get_mut(name) {
            member.declared = Some(DeclaredLayout { order, offset });
            offset += member.size;
        }
    }
}

/// Classify the members of every uniform block.
fn build_blocks(interface: &ProgramInterface) -> Vec<UniformBlockDescriptor> {
    interface
        .blocks
        .iter()
        .map(|block| {
            let mut descriptor = UniformBlockDescriptor::new(&block.name, block.index, block.size);
            let prefix = format!("{}.", block.name);

            let mut structs: BTreeMap<String, Vec<(String, BlockMember)>> = BTreeMap::new();
            let mut struct_arrays: BTreeMap<String, BTreeMap<u32, Vec<BlockMember>>> =
                BTreeMap::new();

            for uniform in interface
                .uniforms
                .iter()
                .filter(|u| u.block_index == Some(block.index))
            {
                let name = uniform.name.strip_prefix(&prefix).unwrap_or(&uniform.name);
                let member = BlockMember {
                    offset: uniform.block_offset,
                    size: block_member_size(uniform),
                    ty: uniform.ty,
                };

                match split_indexed(name) {
                    Some((array, index, rest)) if rest.starts_with('.') => {
                        struct_arrays
                            .entry(array.to_string())
                            .or_default()
                            .entry(index)
                            .or_default()
                            .push(member);
                    }
                    Some((array, _, "")) => {
                        let stride = if uniform.array_stride > 0 {
                            uniform.array_stride
                        } else {
                            uniform.ty.size()
                        };
                        descriptor.members_array.insert(
                            array.to_string(),
                            BlockArrayMember {
                                offset: member.offset,
                                stride,
                                element_count: uniform.array_count.max(1),
                                element_type: Some(uniform.ty),
                            },
                        );
                    }
                    _ => match name.split_once('.') {
                        Some((parent, field)) => {
                            let field = field.strip_suffix("[0]").unwrap_or(field);
                            structs
                                .entry(parent.to_string())
                                .or_default()
                                .push((field.to_string(), member));
                        }
                        None => {
                            descriptor.members_single.insert(name.to_string(), member);
                        }
                    },
                }
            }

            for (name, mut fields) in structs {
                fields.sort_by_key(|(_, m)| m.offset);
                let (offset, end) = span_of(fields.iter().map(|(_, m)| m));
                descriptor.members_struct.insert(
                    name,
                    BlockStructMember {
                        offset,
                        size: end - offset,
                        members: fields,
                    },
                );
            }

            for (name, elements) in struct_arrays {
                let array = struct_array_member(&block.name, &name, &elements);
                descriptor.members_array.insert(name, array);
            }

            descriptor
        })
        .collect()
}

/// Split `name[index]rest`, where `name` contains no dot.
fn split_indexed(name: &str) -> Option<(&str, u32, &str)> {
    let open = name.find('[')?;
    let base = &name[..open];
    if base.contains('.') {
        return None;
    }
    let close = open + name[open..].find(']')?;
    let index = name[open + 1..close].trim().parse().ok()?;
    Some((base, index, &name[close + 1..]))
}

/// Bytes a block member spans, counting every element of an array member.
fn block_member_size(uniform: &ActiveUniform) -> u32 {
    if uniform.array_count > 1 {
        let stride = uniform.array_stride.max(uniform.ty.size());
        (uniform.array_count - 1) * stride + uniform.ty.size()
    } else {
        uniform.ty.size()
    }
}

/// Lowest member offset and highest member end.
fn span_of<'m>(members: impl Iterator<Item = &'m BlockMember>) -> (u32, u32) {
    members.fold((u32::MAX, 0), |(start, end), m| {
        (start.min(m.offset), end.max(m.offset + m.size))
    })
}

/// Describe an array of structs from the fields reported for each element.
///
/// Drivers may leave out inactive elements, so the layout is derived from the
/// lowest reported index. The stride is the distance between the two lowest
/// reported elements divided by their index gap; with a single reported
/// element it is the element span rounded up to the std140 struct alignment.
fn struct_array_member(
    block: &str,
    name: &str,
    elements: &BTreeMap<u32, Vec<BlockMember>>,
) -> BlockArrayMember {
    let mut reported = elements.iter().map(|(&index, fields)| (index, span_of(fields.iter())));
    let Some((first_index, (first_start, first_end))) = reported.next() else {
        return BlockArrayMember {
            offset: 0,
            stride: 0,
            element_count: 0,
            element_type: None,
        };
    };
    let element_count = elements.keys().next_back().map_or(1, |&max| max + 1);
    let aligned_span = (first_end - first_start).next_multiple_of(STD140_STRUCT_ALIGNMENT);

    let stride = match reported.next() {
        Some((index, (start, _))) if start > first_start => {
            (start - first_start) / (index - first_index)
        }
        Some(_) => {
            log::warn!(
                "Block '{block}': elements of '{name}' are not laid out in index order; \
                 assuming a stride of {aligned_span} bytes"
            );
            aligned_span
        }
        None => aligned_span,
    };

    let offset = match first_start.checked_sub(first_index * stride) {
        Some(offset) => offset,
        None => {
            log::warn!(
                "Block '{block}': element {first_index} of '{name}' sits at byte {first_start}, \
                 before the array could start with a stride of {stride} bytes"
            );
            0
        }
    };

    BlockArrayMember {
        offset,
        stride,
        element_count,
        element_type: None,
    }
}
