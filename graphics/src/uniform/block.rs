//! Descriptors for uniform blocks.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::UniformType;

/// Binding-point pool a uniform block draws its slot from.
///
/// The category is part of the block's name, never chosen by the user:
/// a name containing `_Intrinsic` is intrinsic, `_Global` is global,
/// `_Instance` is per-instance and anything else is regular.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockCategory {
    Regular,
    Global,
    Intrinsic,
    Instance,
}

impl BlockCategory {
    /// Every category, in pool index order.
    pub const ALL: [BlockCategory; 4] = [
        BlockCategory::Regular,
        BlockCategory::Global,
        BlockCategory::Intrinsic,
        BlockCategory::Instance,
    ];

    /// Derive the category from a block name.
    pub fn from_block_name(name: &str) -> Self {
        if name.contains("_Intrinsic") {
            Self::Intrinsic
        } else if name.contains("_Global") {
            Self::Global
        } else if name.contains("_Instance") {
            Self::Instance
        } else {
            Self::Regular
        }
    }

    /// Position of the category in [`ALL`](Self::ALL).
    pub const fn index(self) -> usize {
        match self {
            Self::Regular => 0,
            Self::Global => 1,
            Self::Intrinsic => 2,
            Self::Instance => 3,
        }
    }

    /// Lowercase category name used in messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Global => "global",
            Self::Intrinsic => "intrinsic",
            Self::Instance => "instance",
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which of the block's member maps a name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Single,
    Struct,
    Array,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Struct => "struct",
            Self::Array => "array",
        })
    }
}

/// A scalar, vector or matrix member of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMember {
    pub offset: u32,
    pub size: u32,
    pub ty: UniformType,
}

/// A struct-typed member of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStructMember {
    /// Offset of the first field.
    pub offset: u32,
    /// Distance from the first field to the end of the last one.
    pub size: u32,
    /// Fields ordered by offset. Nested paths keep their dots (`inner.x`).
    pub members: Vec<(String, BlockMember)>,
}

/// An array member of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockArrayMember {
    /// Offset of element 0.
    pub offset: u32,
    /// Byte distance between consecutive elements.
    pub stride: u32,
    pub element_count: u32,
    /// Element type, `None` for arrays of structs.
    pub element_type: Option<UniformType>,
}

/// Reflection data for one named uniform block.
///
/// Members are split by shape into three maps keyed by unqualified name; a
/// name appears in exactly one of them. Descriptors are immutable once a
/// [`Shader`](crate::shader::Shader) is built and are shared through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockDescriptor {
    pub name: String,
    /// Block index reported by the driver.
    pub index: u32,
    /// Slot assigned by the binding-point allocator.
    pub binding_point: Option<u32>,
    /// Data size in bytes.
    pub size: u32,
    /// Offset of the bound range; whole blocks are bound from 0.
    pub offset: u32,
    pub category: BlockCategory,
    pub members_single: BTreeMap<String, BlockMember>,
    pub members_struct: BTreeMap<String, BlockStructMember>,
    pub members_array: BTreeMap<String, BlockArrayMember>,
}

impl UniformBlockDescriptor {
    /// An empty block; the category is derived from `name`.
    pub fn new(name: impl Into<String>, index: u32, size: u32) -> Self {
        let name = name.into();
        Self {
            category: BlockCategory::from_block_name(&name),
            name,
            index,
            binding_point: None,
            size,
            offset: 0,
            members_single: BTreeMap::new(),
            members_struct: BTreeMap::new(),
            members_array: BTreeMap::new(),
        }
    }

    /// Which map holds `member`.
    pub fn member_kind(&self, member: &str) -> Option<MemberKind> {
        if self.members_single.contains_key(member) {
            Some(MemberKind::Single)
        } else if self.members_struct.contains_key(member) {
            Some(MemberKind::Struct)
        } else if self.members_array.contains_key(member) {
            Some(MemberKind::Array)
        } else {
            None
        }
    }

    /// Number of direct members.
    pub fn member_count(&self) -> usize {
        self.members_single.len() + self.members_struct.len() + self.members_array.len()
    }
}

static_assertions::assert_impl_all!(UniformBlockDescriptor: Send, Sync);
