//! Interned C types
//!
//! Every type the frontend builds goes through [`TypeTable::intern`], so two
//! declarations spelling the same type share one [`TypeId`]. The serializer
//! relies on this: shared ids become shared JSON objects.

use std::fmt;

use rustc_hash::FxHashMap;

use super::decl::DeclId;

/// Handle to an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arithmetic and `void` types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    WChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
}

impl PrimitiveKind {
    /// C spelling of the type
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "_Bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::SignedChar => "signed char",
            PrimitiveKind::UnsignedChar => "unsigned char",
            PrimitiveKind::WChar => "wchar_t",
            PrimitiveKind::Short => "short",
            PrimitiveKind::UnsignedShort => "unsigned short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::UnsignedInt => "unsigned int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::UnsignedLong => "unsigned long",
            PrimitiveKind::LongLong => "long long",
            PrimitiveKind::UnsignedLongLong => "unsigned long long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::LongDouble => "long double",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// cv-qualifiers (plus `restrict`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

impl Qualifiers {
    pub const CONST: Qualifiers = Qualifiers {
        is_const: true,
        is_volatile: false,
        is_restrict: false,
    };

    pub fn is_empty(&self) -> bool {
        !(self.is_const || self.is_volatile || self.is_restrict)
    }

    pub fn union(self, other: Qualifiers) -> Qualifiers {
        Qualifiers {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
            is_restrict: self.is_restrict || other.is_restrict,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.is_const {
            names.push("const");
        }
        if self.is_volatile {
            names.push("volatile");
        }
        if self.is_restrict {
            names.push("restrict");
        }
        names
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(" "))
    }
}

/// Coarse classification used in the `type_kind` field of every type node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Pointer,
    Array,
    Qualified,
    Function,
    Typedef,
    StructOrClass,
    Enum,
    Unexposed,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Primitive => "primitive",
            TypeKind::Pointer => "pointer",
            TypeKind::Array => "array",
            TypeKind::Qualified => "qualified",
            TypeKind::Function => "function",
            TypeKind::Typedef => "typedef",
            TypeKind::StructOrClass => "struct_or_class",
            TypeKind::Enum => "enum",
            TypeKind::Unexposed => "unexposed",
        }
    }
}

/// A C type. Composite types point at other interned types; named types
/// (struct/union/enum/typedef) point at their declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    Primitive(PrimitiveKind),
    Pointer(TypeId),
    Array {
        element: TypeId,
        size: Option<u64>, // None for `[]` and variable-length arrays
    },
    Function {
        return_type: TypeId,
        parameters: Vec<TypeId>,
        is_variadic: bool,
    },
    Qualified {
        element: TypeId,
        qualifiers: Qualifiers,
    },
    Declared(DeclId),
    /// A type name the frontend could not resolve (usually from a missing header)
    Unexposed(String),
}

/// Interning arena for [`CType`]
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    types: Vec<CType>,
    index: FxHashMap<CType, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable::default()
    }

    /// Return the id of `ty`, allocating it on first sight
    pub fn intern(&mut self, ty: CType) -> TypeId {
        if let Some(id) = self.index.get(&ty) {
            return *id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.index.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &CType {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn primitive(&mut self, kind: PrimitiveKind) -> TypeId {
        self.intern(CType::Primitive(kind))
    }

    pub fn pointer_to(&mut self, element: TypeId) -> TypeId {
        self.intern(CType::Pointer(element))
    }

    pub fn array_of(&mut self, element: TypeId, size: Option<u64>) -> TypeId {
        self.intern(CType::Array { element, size })
    }

    /// Apply qualifiers; empty qualifiers return `element` unchanged and
    /// qualifying an already-qualified type merges the sets.
    pub fn qualified(&mut self, element: TypeId, qualifiers: Qualifiers) -> TypeId {
        if qualifiers.is_empty() {
            return element;
        }
        if let CType::Qualified {
            element: inner,
            qualifiers: existing,
        } = self.get(element).clone()
        {
            return self.intern(CType::Qualified {
                element: inner,
                qualifiers: existing.union(qualifiers),
            });
        }
        self.intern(CType::Qualified {
            element,
            qualifiers,
        })
    }

    /// Strip top-level qualifiers
    pub fn unqualified(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            CType::Qualified { element, .. } => *element,
            _ => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_shares_identity() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let p1 = table.pointer_to(int);
        let p2 = table.pointer_to(int);
        assert_eq!(p1, p2);
        assert_eq!(table.primitive(PrimitiveKind::Int), int);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_qualifiers_merge() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let c = table.qualified(int, Qualifiers::CONST);
        let cv = table.qualified(
            c,
            Qualifiers {
                is_volatile: true,
                ..Qualifiers::default()
            },
        );
        match table.get(cv) {
            CType::Qualified {
                element,
                qualifiers,
            } => {
                assert_eq!(*element, int);
                assert!(qualifiers.is_const && qualifiers.is_volatile);
            }
            other => panic!("Expected qualified type, got {:?}", other),
        }
        assert_eq!(table.qualified(int, Qualifiers::default()), int);
        assert_eq!(table.unqualified(cv), int);
    }
}
