//! Type sizes and record layout
//!
//! Sizes follow the selected target CPU and data model:
//! - LP64 (`long` = 8 bytes) for 64-bit GNU-style targets
//! - LLP64 (`long` = 4 bytes) when MSVC compatibility is on
//!
//! Records use natural alignment. Bit-fields are packed into storage units
//! of their declared type and never straddle a unit boundary. This matches
//! the GCC/Clang layout for the common cases; MSVC's different bit-field
//! rules are not modelled.

use serde::{Deserialize, Serialize};

use super::decl::{ClassKind, DeclId, DeclKind};
use super::types::{CType, PrimitiveKind, TypeId};
use super::Compilation;

/// Target architecture for layout and predefined macros
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetCpu {
    #[serde(rename = "x86")]
    X86,
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm")]
    Arm,
    #[serde(rename = "arm64")]
    Arm64,
}

impl TargetCpu {
    pub fn is_64_bit(self) -> bool {
        matches!(self, TargetCpu::X86_64 | TargetCpu::Arm64)
    }
}

/// Primitive sizes for one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub cpu: TargetCpu,
    pub msvc: bool,
    pub pointer_size: u64,
    pub long_size: u64,
    pub long_double_size: u64,
    pub wchar_size: u64,
    /// Alignment of 8-byte scalars (`double`, `long long`) inside records
    pub int64_align: u64,
}

impl TargetInfo {
    pub fn new(cpu: TargetCpu, msvc: bool) -> Self {
        let pointer_size = if cpu.is_64_bit() { 8 } else { 4 };
        let long_size = if msvc || !cpu.is_64_bit() { 4 } else { 8 };
        let long_double_size = match (msvc, cpu) {
            (true, _) => 8,
            (false, TargetCpu::X86) => 12,
            (false, TargetCpu::Arm) => 8,
            (false, _) => 16,
        };
        let wchar_size = if msvc { 2 } else { 4 };
        let int64_align = if !msvc && cpu == TargetCpu::X86 { 4 } else { 8 };
        TargetInfo {
            cpu,
            msvc,
            pointer_size,
            long_size,
            long_double_size,
            wchar_size,
            int64_align,
        }
    }

    pub fn primitive_size(&self, kind: PrimitiveKind) -> u64 {
        match kind {
            PrimitiveKind::Void => 0,
            PrimitiveKind::Bool
            | PrimitiveKind::Char
            | PrimitiveKind::SignedChar
            | PrimitiveKind::UnsignedChar => 1,
            PrimitiveKind::WChar => self.wchar_size,
            PrimitiveKind::Short | PrimitiveKind::UnsignedShort => 2,
            PrimitiveKind::Int | PrimitiveKind::UnsignedInt | PrimitiveKind::Float => 4,
            PrimitiveKind::Long | PrimitiveKind::UnsignedLong => self.long_size,
            PrimitiveKind::LongLong | PrimitiveKind::UnsignedLongLong | PrimitiveKind::Double => 8,
            PrimitiveKind::LongDouble => self.long_double_size,
        }
    }

    pub fn primitive_align(&self, kind: PrimitiveKind) -> u64 {
        match kind {
            PrimitiveKind::Void => 1,
            PrimitiveKind::LongLong | PrimitiveKind::UnsignedLongLong | PrimitiveKind::Double => {
                self.int64_align
            }
            PrimitiveKind::LongDouble if !self.msvc && self.cpu == TargetCpu::X86 => 4,
            other => self.primitive_size(other).max(1),
        }
    }
}

impl Default for TargetInfo {
    fn default() -> Self {
        TargetInfo::new(TargetCpu::default(), false)
    }
}

fn round_up(value: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        value
    } else {
        value.div_ceil(multiple) * multiple
    }
}

impl Compilation {
    /// Size of a type in bytes; incomplete and function types report 0
    pub fn size_of(&self, ty: TypeId) -> u64 {
        match self.types.get(ty) {
            CType::Primitive(kind) => self.target.primitive_size(*kind),
            CType::Pointer(_) => self.target.pointer_size,
            CType::Array { element, size } => {
                size.map(|n| n * self.size_of(*element)).unwrap_or(0)
            }
            CType::Function { .. } => 0,
            CType::Qualified { element, .. } => self.size_of(*element),
            CType::Declared(decl) => self.decl_size_of(*decl),
            CType::Unexposed(_) => 0,
        }
    }

    pub fn align_of(&self, ty: TypeId) -> u64 {
        match self.types.get(ty) {
            CType::Primitive(kind) => self.target.primitive_align(*kind),
            CType::Pointer(_) => self.target.pointer_size,
            CType::Array { element, .. } => self.align_of(*element),
            CType::Function { .. } => 1,
            CType::Qualified { element, .. } => self.align_of(*element),
            CType::Declared(decl) => match &self.decl(*decl).kind {
                DeclKind::Class(c) => c.align_of.max(1),
                DeclKind::Enum(e) => self.align_of(e.integer_type),
                DeclKind::Typedef(t) => self.align_of(t.element_type),
                _ => 1,
            },
            CType::Unexposed(_) => 1,
        }
    }

    /// Size of a struct/union/enum/typedef declaration
    pub fn decl_size_of(&self, decl: DeclId) -> u64 {
        match &self.decl(decl).kind {
            DeclKind::Class(c) => c.size_of,
            DeclKind::Enum(e) => self.size_of(e.integer_type),
            DeclKind::Typedef(t) => self.size_of(t.element_type),
            _ => 0,
        }
    }

    /// Compute `(size, align)` for a record with the given member fields
    pub fn layout_record(&self, fields: &[DeclId], kind: ClassKind) -> (u64, u64) {
        let mut offset_bits: u64 = 0;
        let mut union_size: u64 = 0;
        let mut align: u64 = 1;

        for field in fields {
            let DeclKind::Field(f) = &self.decl(*field).kind else {
                continue;
            };
            let size = self.size_of(f.ty);
            let field_align = self.align_of(f.ty);

            match kind {
                ClassKind::Union => {
                    let bytes = match f.bit_field_width {
                        Some(width) => u64::from(width).div_ceil(8),
                        None => size,
                    };
                    union_size = union_size.max(bytes);
                    align = align.max(field_align);
                }
                ClassKind::Struct => match f.bit_field_width {
                    Some(0) => {
                        // zero-width bit-field closes the current unit
                        offset_bits = round_up(offset_bits, (size * 8).max(8));
                    }
                    Some(width) => {
                        let width = u64::from(width);
                        let unit_bits = size * 8;
                        if unit_bits > 0 && (offset_bits % unit_bits) + width > unit_bits {
                            offset_bits = round_up(offset_bits, unit_bits);
                        }
                        offset_bits += width;
                        align = align.max(field_align);
                    }
                    None => {
                        offset_bits = round_up(offset_bits, field_align * 8);
                        offset_bits += size * 8;
                        align = align.max(field_align);
                    }
                },
            }
        }

        let raw = match kind {
            ClassKind::Struct => offset_bits.div_ceil(8),
            ClassKind::Union => union_size,
        };
        (round_up(raw, align), align)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_models() {
        let lp64 = TargetInfo::new(TargetCpu::X86_64, false);
        assert_eq!(lp64.primitive_size(PrimitiveKind::Long), 8);
        assert_eq!(lp64.pointer_size, 8);

        let llp64 = TargetInfo::new(TargetCpu::X86_64, true);
        assert_eq!(llp64.primitive_size(PrimitiveKind::Long), 4);
        assert_eq!(llp64.primitive_size(PrimitiveKind::WChar), 2);

        let ilp32 = TargetInfo::new(TargetCpu::X86, false);
        assert_eq!(ilp32.pointer_size, 4);
        assert_eq!(ilp32.primitive_align(PrimitiveKind::Double), 4);
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(5, 4), 8);
        assert_eq!(round_up(8, 4), 8);
        assert_eq!(round_up(3, 0), 3);
    }
}
