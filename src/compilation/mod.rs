//! Declaration graph of one translation unit
//!
//! A [`Compilation`] is what a frontend hands back after parsing a file:
//! - arenas of declarations ([`decl`]) and interned types ([`types`])
//! - the file table used by every [`SourceLocation`]
//! - [`diagnostics`] reported while preprocessing and parsing
//! - ordered top-level lists per declaration kind
//!
//! The graph is read-only to everything downstream of the frontend. Sizes
//! are computed on demand by [`layout`]; human-readable C forms live in
//! [`display`].

pub mod decl;
pub mod diagnostics;
pub mod display;
pub mod layout;
pub mod types;

use std::path::{Path, PathBuf};

pub use decl::*;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use layout::{TargetCpu, TargetInfo};
pub use types::{CType, PrimitiveKind, Qualifiers, TypeId, TypeKind, TypeTable};

use crate::parser::ast::{FileId, SourceLocation};

/// File id reserved for predefined and command-line macros
pub const BUILTIN_FILE: FileId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Reached through `#include <...>`
    pub is_system: bool,
}

/// Parse result for one translation unit
#[derive(Debug, Clone)]
pub struct Compilation {
    pub(crate) decls: Vec<Decl>,
    pub(crate) types: TypeTable,
    pub(crate) files: Vec<SourceFile>,
    pub(crate) target: TargetInfo,
    pub diagnostics: Diagnostics,

    // Top-level declarations in source order
    pub attributes: Vec<DeclId>,
    pub classes: Vec<DeclId>,
    pub enums: Vec<DeclId>,
    pub fields: Vec<DeclId>,
    pub functions: Vec<DeclId>,
    pub typedefs: Vec<DeclId>,
    pub macros: Vec<DeclId>,
    pub namespaces: Vec<DeclId>,
}

impl Compilation {
    pub fn new(target: TargetInfo) -> Self {
        Compilation {
            decls: Vec::new(),
            types: TypeTable::new(),
            files: vec![SourceFile {
                path: PathBuf::from("<command line>"),
                is_system: false,
            }],
            target,
            diagnostics: Diagnostics::new(),
            attributes: Vec::new(),
            classes: Vec::new(),
            enums: Vec::new(),
            fields: Vec::new(),
            functions: Vec::new(),
            typedefs: Vec::new(),
            macros: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    pub fn add_file(&mut self, path: &Path, is_system: bool) -> FileId {
        self.files.push(SourceFile {
            path: path.to_path_buf(),
            is_system,
        });
        (self.files.len() - 1) as FileId
    }

    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id as usize)
    }

    /// Display form of a file path, `"<unknown>"` for a bad id
    pub fn file_name(&self, id: FileId) -> String {
        self.file(id)
            .map(|f| f.path.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string())
    }

    pub fn is_system_location(&self, location: &SourceLocation) -> bool {
        self.file(location.file).is_some_and(|f| f.is_system)
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        self.decls.push(decl);
        DeclId((self.decls.len() - 1) as u32)
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index()]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn ty(&self, id: TypeId) -> &CType {
        self.types.get(id)
    }

    pub fn type_kind(&self, id: TypeId) -> TypeKind {
        match self.types.get(id) {
            CType::Primitive(_) => TypeKind::Primitive,
            CType::Pointer(_) => TypeKind::Pointer,
            CType::Array { .. } => TypeKind::Array,
            CType::Function { .. } => TypeKind::Function,
            CType::Qualified { .. } => TypeKind::Qualified,
            CType::Declared(decl) => match &self.decl(*decl).kind {
                DeclKind::Class(_) => TypeKind::StructOrClass,
                DeclKind::Enum(_) => TypeKind::Enum,
                DeclKind::Typedef(_) => TypeKind::Typedef,
                _ => TypeKind::Unexposed,
            },
            CType::Unexposed(_) => TypeKind::Unexposed,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// First top-level function with the given name
    pub fn find_function(&self, name: &str) -> Option<DeclId> {
        self.functions
            .iter()
            .copied()
            .find(|id| self.decl(*id).name() == name)
    }

    /// Remove declarations that came from `<...>` headers from the top-level lists
    pub fn drop_system_declarations(&mut self) {
        let decls = &self.decls;
        let files = &self.files;
        let keep = |id: &DeclId| {
            let file = decls[id.index()].span.start.file;
            !files.get(file as usize).is_some_and(|f| f.is_system)
        };
        self.attributes.retain(keep);
        self.classes.retain(keep);
        self.enums.retain(keep);
        self.fields.retain(keep);
        self.functions.retain(keep);
        self.typedefs.retain(keep);
        self.macros.retain(keep);
        self.namespaces.retain(keep);
    }

    /// `path(line,column): severity: message`
    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        match &diagnostic.location {
            Some(loc) => format!(
                "{}({},{}): {}: {}",
                self.file_name(loc.file),
                loc.line,
                loc.column,
                diagnostic.severity,
                diagnostic.message
            ),
            None => format!("{}: {}", diagnostic.severity, diagnostic.message),
        }
    }
}

impl Default for Compilation {
    fn default() -> Self {
        Compilation::new(TargetInfo::default())
    }
}
