//! Declaration nodes
//!
//! Declarations live in the [`super::Compilation`] arena and refer to each
//! other through [`DeclId`]. The `parent` back-reference makes the graph
//! cyclic (class -> field -> class), which is why nothing here derives
//! `Serialize`: the serializer walks the graph explicitly.

use crate::parser::ast::{Expr, SourceLocation, Stmt};

use super::types::TypeId;

/// Handle to a declaration in the compilation arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub(crate) u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source range of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl Span {
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Span { start, end }
    }

    pub fn point(location: SourceLocation) -> Self {
        Span {
            start: location,
            end: location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageQualifier {
    #[default]
    None,
    Extern,
    Static,
    Register,
    Auto,
}

impl StorageQualifier {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageQualifier::None => "none",
            StorageQualifier::Extern => "extern",
            StorageQualifier::Static => "static",
            StorageQualifier::Register => "register",
            StorageQualifier::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkageKind {
    #[default]
    NoLinkage,
    Internal,
    External,
}

impl LinkageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkageKind::NoLinkage => "no_linkage",
            LinkageKind::Internal => "internal",
            LinkageKind::External => "external",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallingConvention {
    #[default]
    Default,
    Cdecl,
    Stdcall,
    Fastcall,
    Vectorcall,
}

impl CallingConvention {
    pub fn as_str(self) -> &'static str {
        match self {
            CallingConvention::Default => "default",
            CallingConvention::Cdecl => "cdecl",
            CallingConvention::Stdcall => "stdcall",
            CallingConvention::Fastcall => "fastcall",
            CallingConvention::Vectorcall => "vectorcall",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Struct,
    Union,
}

impl ClassKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassKind::Struct => "struct",
            ClassKind::Union => "union",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// `__attribute__((...))`
    Gnu,
    /// `__declspec(...)`
    Declspec,
    /// `#pragma ...` at file scope
    Pragma,
}

impl AttributeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKind::Gnu => "gnu",
            AttributeKind::Declspec => "declspec",
            AttributeKind::Pragma => "pragma",
        }
    }
}

/// Function property bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionFlags {
    pub is_inline: bool,
    pub is_variadic: bool,
    pub has_body: bool,
    pub no_return: bool,
}

impl FunctionFlags {
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.is_inline {
            names.push("inline");
        }
        if self.is_variadic {
            names.push("variadic");
        }
        if self.has_body {
            names.push("definition");
        }
        if self.no_return {
            names.push("no_return");
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub class_kind: ClassKind,
    pub is_definition: bool,
    pub size_of: u64,
    pub align_of: u64,
    pub fields: Vec<DeclId>,
    /// Records defined inside this one
    pub classes: Vec<DeclId>,
    pub attributes: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: String,
    pub is_definition: bool,
    pub integer_type: TypeId,
    pub items: Vec<DeclId>,
    pub attributes: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem {
    pub name: String,
    pub value: i64,
}

/// A struct member or a file-scope variable
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub storage: StorageQualifier,
    pub bit_field_width: Option<u32>,
    pub init_value: Option<Expr>,
    pub attributes: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: TypeId,
    pub parameters: Vec<DeclId>,
    pub storage: StorageQualifier,
    pub linkage: LinkageKind,
    pub flags: FunctionFlags,
    pub calling_convention: CallingConvention,
    pub attributes: Vec<DeclId>,
    pub body: Vec<Stmt>,
}

/// One child of a function: a parameter declaration or a body statement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Child<'a> {
    Parameter(DeclId),
    Statement(&'a Stmt),
}

impl Function {
    /// Parameters first, then top-level body statements
    pub fn children(&self) -> impl Iterator<Item = Child<'_>> + '_ {
        self.parameters
            .iter()
            .map(|p| Child::Parameter(*p))
            .chain(self.body.iter().map(Child::Statement))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Typedef {
    pub name: String,
    pub element_type: TypeId,
    pub attributes: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    /// `None` for object-like macros
    pub parameters: Option<Vec<String>>,
    pub value: String,
}

/// Only produced by C++-capable frontends; the C frontend never emits one
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namespace {
    pub name: String,
    pub classes: Vec<DeclId>,
    pub enums: Vec<DeclId>,
    pub fields: Vec<DeclId>,
    pub functions: Vec<DeclId>,
    pub typedefs: Vec<DeclId>,
    pub namespaces: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Attribute(Attribute),
    Class(Class),
    Enum(Enum),
    EnumItem(EnumItem),
    Field(Field),
    Function(Function),
    Parameter(Parameter),
    Typedef(Typedef),
    Macro(Macro),
    Namespace(Namespace),
}

/// A node of the declaration graph
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub parent: Option<DeclId>,
    pub span: Span,
    pub kind: DeclKind,
}

impl Decl {
    pub fn new(kind: DeclKind, span: Span) -> Self {
        Decl {
            parent: None,
            span,
            kind,
        }
    }

    pub fn with_parent(mut self, parent: Option<DeclId>) -> Self {
        self.parent = parent;
        self
    }

    /// Declared name; empty for anonymous records
    pub fn name(&self) -> &str {
        match &self.kind {
            DeclKind::Attribute(a) => &a.name,
            DeclKind::Class(c) => &c.name,
            DeclKind::Enum(e) => &e.name,
            DeclKind::EnumItem(i) => &i.name,
            DeclKind::Field(f) => &f.name,
            DeclKind::Function(f) => &f.name,
            DeclKind::Parameter(p) => &p.name,
            DeclKind::Typedef(t) => &t.name,
            DeclKind::Macro(m) => &m.name,
            DeclKind::Namespace(n) => &n.name,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.kind {
            DeclKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Class> {
        match &self.kind {
            DeclKind::Class(c) => Some(c),
            _ => None,
        }
    }
}
