//! Uniform value types.
//!
//! [`UniformType`] is the type tag a driver reports for an active uniform.
//! [`UniformValue`] carries one element of that type and is what a backend
//! receives when a default-block uniform is uploaded. Both are closed: adding
//! a type forces every match over them to be revisited.

use std::fmt;

use bytemuck::Pod;

/// Scalar, vector, matrix and sampler types a uniform can have.
///
/// Matrices are named `MatCxR` (columns x rows), as in GLSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    UVec2,
    UVec3,
    UVec4,
    Bool,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Mat2x3,
    Mat2x4,
    Mat3x2,
    Mat3x4,
    Mat4x2,
    Mat4x3,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler2DArray,
    Sampler2DShadow,
}

impl UniformType {
    /// Size of one element in bytes, tightly packed.
    ///
    /// Booleans occupy 4 bytes and samplers hold a 4-byte texture unit index.
    pub const fn size(self) -> u32 {
        self.component_count() * 4
    }

    /// Number of 4-byte components in one element.
    pub const fn component_count(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::UInt | Self::Bool => 1,
            Self::Vec2 | Self::IVec2 | Self::UVec2 | Self::BVec2 => 2,
            Self::Vec3 | Self::IVec3 | Self::UVec3 | Self::BVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::UVec4 | Self::BVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
            Self::Mat2x3 | Self::Mat3x2 => 6,
            Self::Mat2x4 | Self::Mat4x2 => 8,
            Self::Mat3x4 | Self::Mat4x3 => 12,
            Self::Sampler2D
            | Self::Sampler3D
            | Self::SamplerCube
            | Self::Sampler2DArray
            | Self::Sampler2DShadow => 1,
        }
    }

    /// Whether this is an opaque sampler type.
    pub const fn is_sampler(self) -> bool {
        matches!(
            self,
            Self::Sampler2D
                | Self::Sampler3D
                | Self::SamplerCube
                | Self::Sampler2DArray
                | Self::Sampler2DShadow
        )
    }

    /// GLSL spelling of the type.
    pub const fn glsl_name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Int => "int",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::UInt => "uint",
            Self::UVec2 => "uvec2",
            Self::UVec3 => "uvec3",
            Self::UVec4 => "uvec4",
            Self::Bool => "bool",
            Self::BVec2 => "bvec2",
            Self::BVec3 => "bvec3",
            Self::BVec4 => "bvec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Mat2x3 => "mat2x3",
            Self::Mat2x4 => "mat2x4",
            Self::Mat3x2 => "mat3x2",
            Self::Mat3x4 => "mat3x4",
            Self::Mat4x2 => "mat4x2",
            Self::Mat4x3 => "mat4x3",
            Self::Sampler2D => "sampler2D",
            Self::Sampler3D => "sampler3D",
            Self::SamplerCube => "samplerCube",
            Self::Sampler2DArray => "sampler2DArray",
            Self::Sampler2DShadow => "sampler2DShadow",
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A single uniform element, ready to hand to a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    UInt(u32),
    UVec2([u32; 2]),
    UVec3([u32; 3]),
    UVec4([u32; 4]),
    Bool(bool),
    BVec2([bool; 2]),
    BVec3([bool; 3]),
    BVec4([bool; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    Mat2x3([f32; 6]),
    Mat2x4([f32; 8]),
    Mat3x2([f32; 6]),
    Mat3x4([f32; 12]),
    Mat4x2([f32; 8]),
    Mat4x3([f32; 12]),
    /// Texture unit a sampler reads from.
    Sampler(i32),
}

impl UniformValue {
    /// Decode one element of type `ty` from the start of `bytes`.
    ///
    /// Returns `None` when `bytes` is shorter than [`UniformType::size`].
    pub fn from_bytes(ty: UniformType, bytes: &[u8]) -> Option<Self> {
        let value = match ty {
            UniformType::Float => Self::Float(read(bytes)?),
            UniformType::Vec2 => Self::Vec2(read(bytes)?),
            UniformType::Vec3 => Self::Vec3(read(bytes)?),
            UniformType::Vec4 => Self::Vec4(read(bytes)?),
            UniformType::Int => Self::Int(read(bytes)?),
            UniformType::IVec2 => Self::IVec2(read(bytes)?),
            UniformType::IVec3 => Self::IVec3(read(bytes)?),
            UniformType::IVec4 => Self::IVec4(read(bytes)?),
            UniformType::UInt => Self::UInt(read(bytes)?),
            UniformType::UVec2 => Self::UVec2(read(bytes)?),
            UniformType::UVec3 => Self::UVec3(read(bytes)?),
            UniformType::UVec4 => Self::UVec4(read(bytes)?),
            UniformType::Bool => Self::Bool(read::<u32>(bytes)? != 0),
            UniformType::BVec2 => Self::BVec2(read::<[u32; 2]>(bytes)?.map(|v| v != 0)),
            UniformType::BVec3 => Self::BVec3(read::<[u32; 3]>(bytes)?.map(|v| v != 0)),
            UniformType::BVec4 => Self::BVec4(read::<[u32; 4]>(bytes)?.map(|v| v != 0)),
            UniformType::Mat2 => Self::Mat2(read(bytes)?),
            UniformType::Mat3 => Self::Mat3(read(bytes)?),
            UniformType::Mat4 => Self::Mat4(read(bytes)?),
            UniformType::Mat2x3 => Self::Mat2x3(read(bytes)?),
            UniformType::Mat2x4 => Self::Mat2x4(read(bytes)?),
            UniformType::Mat3x2 => Self::Mat3x2(read(bytes)?),
            UniformType::Mat3x4 => Self::Mat3x4(read(bytes)?),
            UniformType::Mat4x2 => Self::Mat4x2(read(bytes)?),
            UniformType::Mat4x3 => Self::Mat4x3(read(bytes)?),
            UniformType::Sampler2D
            | UniformType::Sampler3D
            | UniformType::SamplerCube
            | UniformType::Sampler2DArray
            | UniformType::Sampler2DShadow => Self::Sampler(read(bytes)?),
        };
        Some(value)
    }

    /// The uniform type this value uploads as.
    ///
    /// All sampler kinds collapse to [`UniformType::Sampler2D`].
    pub fn uniform_type(&self) -> UniformType {
        match self {
            Self::Float(_) => UniformType::Float,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Vec4(_) => UniformType::Vec4,
            Self::Int(_) => UniformType::Int,
            Self::IVec2(_) => UniformType::IVec2,
            Self::IVec3(_) => UniformType::IVec3,
            Self::IVec4(_) => UniformType::IVec4,
            Self::UInt(_) => UniformType::UInt,
            Self::UVec2(_) => UniformType::UVec2,
            Self::UVec3(_) => UniformType::UVec3,
            Self::UVec4(_) => UniformType::UVec4,
            Self::Bool(_) => UniformType::Bool,
            Self::BVec2(_) => UniformType::BVec2,
            Self::BVec3(_) => UniformType::BVec3,
            Self::BVec4(_) => UniformType::BVec4,
            Self::Mat2(_) => UniformType::Mat2,
            Self::Mat3(_) => UniformType::Mat3,
            Self::Mat4(_) => UniformType::Mat4,
            Self::Mat2x3(_) => UniformType::Mat2x3,
            Self::Mat2x4(_) => UniformType::Mat2x4,
            Self::Mat3x2(_) => UniformType::Mat3x2,
            Self::Mat3x4(_) => UniformType::Mat3x4,
            Self::Mat4x2(_) => UniformType::Mat4x2,
            Self::Mat4x3(_) => UniformType::Mat4x3,
            Self::Sampler(_) => UniformType::Sampler2D,
        }
    }
}

fn read<T: Pod>(bytes: &[u8]) -> Option<T> {
    bytes
        .get(..std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(UniformType::Float.size(), 4);
        assert_eq!(UniformType::Vec3.size(), 12);
        assert_eq!(UniformType::Bool.size(), 4);
        assert_eq!(UniformType::Mat3.size(), 36);
        assert_eq!(UniformType::Mat4.size(), 64);
        assert_eq!(UniformType::Mat2x3.size(), 24);
        assert_eq!(UniformType::SamplerCube.size(), 4);
    }

    #[test]
    fn test_decode_vec3() {
        let bytes = bytemuck::bytes_of(&[1.0f32, 2.0, 3.0]).to_vec();
        assert_eq!(
            UniformValue::from_bytes(UniformType::Vec3, &bytes),
            Some(UniformValue::Vec3([1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn test_decode_bools() {
        let bytes = bytemuck::bytes_of(&[0u32, 7u32]).to_vec();
        assert_eq!(
            UniformValue::from_bytes(UniformType::BVec2, &bytes),
            Some(UniformValue::BVec2([false, true]))
        );
    }

    #[test]
    fn test_decode_sampler() {
        let bytes = 3i32.to_ne_bytes();
        assert_eq!(
            UniformValue::from_bytes(UniformType::SamplerCube, &bytes),
            Some(UniformValue::Sampler(3))
        );
    }

    #[test]
    fn test_decode_short_input() {
        assert_eq!(UniformValue::from_bytes(UniformType::Mat4, &[0; 60]), None);
    }

    #[test]
    fn test_value_type_matches_tag() {
        let bytes = [0u8; 64];
        for ty in [
            UniformType::Float,
            UniformType::IVec4,
            UniformType::UVec2,
            UniformType::Mat3x4,
            UniformType::Mat4,
        ] {
            let value = UniformValue::from_bytes(ty, &bytes).unwrap();
            assert_eq!(value.uniform_type(), ty);
        }
    }

    #[test]
    fn test_sampler_flag() {
        assert!(UniformType::Sampler2DArray.is_sampler());
        assert!(!UniformType::Mat2.is_sampler());
    }
}
