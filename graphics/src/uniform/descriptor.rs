//! Descriptors for default-block uniforms.

use std::collections::BTreeMap;

use crate::types::UniformType;

/// Where a struct member sits once the struct's source declaration is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclaredLayout {
    /// Zero-based position in the struct's member list.
    pub order: u32,
    /// Byte offset consistent with `order`, used by host-side mirrors.
    pub offset: u32,
}

/// What a uniform holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformKind {
    /// A scalar, vector, matrix or sampler (or an array of them).
    Value(UniformType),
    /// A user-defined struct. Members are keyed by their unqualified name.
    Struct {
        /// Declared struct type, once recovered from source.
        type_name: Option<String>,
        members: BTreeMap<String, UniformDescriptor>,
    },
}

/// Which offsets to order struct members by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberOrder {
    /// The order the driver reported, by `gpu_offset`.
    Driver,
    /// Source declaration order. Unresolved members come last, in driver order.
    Declared,
}

/// Reflection data for one default-block uniform or struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDescriptor {
    /// Driver location. Struct descriptors take their first reported member's.
    pub location: i32,
    /// Size in bytes, summed over members for structs.
    pub size: u32,
    /// Offset accumulated in driver report order.
    pub gpu_offset: u32,
    /// Number of array elements, 1 for non-arrays.
    pub array_count: u32,
    /// Declared position and offset, for struct members whose struct was
    /// found in the source.
    pub declared: Option<DeclaredLayout>,
    pub kind: UniformKind,
}

impl UniformDescriptor {
    /// A value uniform of `array_count` elements.
    pub fn value(location: i32, ty: UniformType, gpu_offset: u32, array_count: u32) -> Self {
        let array_count = array_count.max(1);
        Self {
            location,
            size: ty.size() * array_count,
            gpu_offset,
            array_count,
            declared: None,
            kind: UniformKind::Value(ty),
        }
    }

    /// An empty struct uniform. Members are added as the driver reports them.
    pub fn structure(location: i32, gpu_offset: u32) -> Self {
        Self {
            location,
            size: 0,
            gpu_offset,
            array_count: 1,
            declared: None,
            kind: UniformKind::Struct {
                type_name: None,
                members: BTreeMap::new(),
            },
        }
    }

    /// Whether this is a user-defined struct.
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, UniformKind::Struct { .. })
    }

    /// Element type of a value uniform.
    pub fn uniform_type(&self) -> Option<UniformType> {
        match self.kind {
            UniformKind::Value(ty) => Some(ty),
            UniformKind::Struct { .. } => None,
        }
    }

    /// Declared struct type name, once recovered.
    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            UniformKind::Struct { type_name, .. } => type_name.as_deref(),
            UniformKind::Value(_) => None,
        }
    }

    /// Struct members keyed by name.
    pub fn members(&self) -> Option<&BTreeMap<String, UniformDescriptor>> {
        match &self.kind {
            UniformKind::Struct { members, .. } => Some(members),
            UniformKind::Value(_) => None,
        }
    }

    /// A single struct member.
    pub fn member(&self, name: &str) -> Option<&UniformDescriptor> {
        self.members()?.get(name)
    }

    /// Struct members sorted by `order`. Empty for value uniforms.
    pub fn members_in(&self, order: MemberOrder) -> Vec<(&str, &UniformDescriptor)> {
        let Some(members) = self.members() else {
            return Vec::new();
        };

        let mut sorted: Vec<(&str, &UniformDescriptor)> =
            members.iter().map(|(n, d)| (n.as_str(), d)).collect();
        match order {
            MemberOrder::Driver => sorted.sort_by_key(|(_, d)| d.gpu_offset),
            MemberOrder::Declared => sorted.sort_by_key(|(_, d)| {
                (
                    d.declared.map_or(u32::MAX, |l| l.order),
                    d.gpu_offset,
                )
            }),
        }
        sorted
    }

    /// Offset a host-side mirror should use: the declared offset when known,
    /// the driver offset otherwise.
    pub fn effective_offset(&self) -> u32 {
        self.declared.map_or(self.gpu_offset, |l| l.offset)
    }

    /// Whether every member of a struct has a declared layout.
    ///
    /// Value uniforms are always resolved.
    pub fn is_resolved(&self) -> bool {
        self.members()
            .is_none_or(|members| members.values().all(|m| m.declared.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> UniformDescriptor {
        let mut light = UniformDescriptor::structure(3, 16);
        if let UniformKind::Struct { members, .. } = &mut light.kind {
            let mut intensity = UniformDescriptor::value(3, UniformType::Float, 16, 1);
            intensity.declared = Some(DeclaredLayout {
                order: 2,
                offset: 40,
            });
            let mut ambient = UniformDescriptor::value(4, UniformType::Vec3, 20, 1);
            ambient.declared = Some(DeclaredLayout {
                order: 0,
                offset: 16,
            });
            let diffuse = UniformDescriptor::value(5, UniformType::Vec3, 32, 1);
            members.insert("intensity".into(), intensity);
            members.insert("ambient".into(), ambient);
            members.insert("diffuse".into(), diffuse);
        }
        light.size = 28;
        light
    }

    #[test]
    fn test_value_size_includes_array() {
        let weights = UniformDescriptor::value(0, UniformType::Vec4, 0, 8);
        assert_eq!(weights.size, 128);
        assert_eq!(weights.array_count, 8);
        assert!(!weights.is_struct());
        assert!(weights.is_resolved());
    }

    #[test]
    fn test_member_views() {
        let light = light();

        let driver: Vec<&str> = light
            .members_in(MemberOrder::Driver)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(driver, vec!["intensity", "ambient", "diffuse"]);

        let declared: Vec<&str> = light
            .members_in(MemberOrder::Declared)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(declared, vec!["ambient", "intensity", "diffuse"]);
    }

    #[test]
    fn test_effective_offset_falls_back_to_gpu_offset() {
        let light = light();
        assert_eq!(light.member("ambient").unwrap().effective_offset(), 16);
        assert_eq!(light.member("diffuse").unwrap().effective_offset(), 32);
        assert!(!light.is_resolved());
    }
}
