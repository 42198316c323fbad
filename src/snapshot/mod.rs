// Projection snapshot: the reduced view of one compilation that gets serialized

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::compilation::{Child, Compilation, DeclId, Severity};
use crate::parser::ast::Stmt;

/// What happens when two functions with the same name both have children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateFunctionPolicy {
    /// The later function replaces the earlier entry
    #[default]
    LastWriteWins,
    /// Children of every same-named function are concatenated in order
    Merge,
}

/// Top-level declarations of one compilation, plus the function body index
#[derive(Debug, Clone)]
pub struct Snapshot<'c> {
    compilation: &'c Compilation,
    pub attributes: Vec<DeclId>,
    pub classes: Vec<DeclId>,
    pub enums: Vec<DeclId>,
    pub fields: Vec<DeclId>,
    pub functions: Vec<DeclId>,
    pub typedefs: Vec<DeclId>,
    pub macros: Vec<DeclId>,
    pub namespaces: Vec<DeclId>,
    /// Function name to its non-parameter children, ordered by name
    pub func_map: BTreeMap<String, Vec<&'c Stmt>>,
}

impl<'c> Snapshot<'c> {
    pub fn new(compilation: &'c Compilation) -> Self {
        Self::with_policy(compilation, DuplicateFunctionPolicy::default())
    }

    pub fn with_policy(compilation: &'c Compilation, policy: DuplicateFunctionPolicy) -> Self {
        let mut func_map: BTreeMap<String, Vec<&'c Stmt>> = BTreeMap::new();

        for id in &compilation.functions {
            let Some(function) = compilation.decl(*id).as_function() else {
                continue;
            };
            let children: Vec<&'c Stmt> = function
                .children()
                .filter_map(|child| match child {
                    Child::Statement(stmt) => Some(stmt),
                    Child::Parameter(_) => None,
                })
                .collect();
            if function.name.is_empty() || children.is_empty() {
                continue;
            }

            match func_map.get_mut(&function.name) {
                Some(existing) => {
                    warn!(
                        function = %function.name,
                        ?policy,
                        "duplicate function name in body index"
                    );
                    match policy {
                        DuplicateFunctionPolicy::LastWriteWins => *existing = children,
                        DuplicateFunctionPolicy::Merge => existing.extend(children),
                    }
                }
                None => {
                    func_map.insert(function.name.clone(), children);
                }
            }
        }

        Snapshot {
            compilation,
            attributes: compilation.attributes.clone(),
            classes: compilation.classes.clone(),
            enums: compilation.enums.clone(),
            fields: compilation.fields.clone(),
            functions: compilation.functions.clone(),
            typedefs: compilation.typedefs.clone(),
            macros: compilation.macros.clone(),
            namespaces: compilation.namespaces.clone(),
            func_map,
        }
    }

    pub fn compilation(&self) -> &'c Compilation {
        self.compilation
    }

    /// Non-parameter children recorded for `name`
    pub fn children(&self, name: &str) -> Option<&[&'c Stmt]> {
        self.func_map.get(name).map(Vec::as_slice)
    }

    /// Number of top-level declarations across all lists
    pub fn declaration_count(&self) -> usize {
        self.attributes.len()
            + self.classes.len()
            + self.enums.len()
            + self.fields.len()
            + self.functions.len()
            + self.typedefs.len()
            + self.macros.len()
            + self.namespaces.len()
    }
}

/// Echo the compilation's diagnostics; errors always, warnings on request
pub fn write_diagnostics<W: Write>(
    writer: &mut W,
    compilation: &Compilation,
    include_warnings: bool,
) -> io::Result<()> {
    for diagnostic in compilation.diagnostics.messages() {
        let shown = match diagnostic.severity {
            Severity::Error => true,
            Severity::Warning | Severity::Info => include_warnings,
        };
        if shown {
            writeln!(writer, "{}", compilation.format_diagnostic(diagnostic))?;
        }
    }
    Ok(())
}

/// List every top-level declaration in its C form, grouped by kind
pub fn write_declarations<W: Write>(writer: &mut W, compilation: &Compilation) -> io::Result<()> {
    let groups: [(&str, &[DeclId]); 8] = [
        ("Attributes", &compilation.attributes),
        ("Classes", &compilation.classes),
        ("Enums", &compilation.enums),
        ("Fields", &compilation.fields),
        ("Functions", &compilation.functions),
        ("Typedefs", &compilation.typedefs),
        ("Macros", &compilation.macros),
        ("Namespaces", &compilation.namespaces),
    ];

    for (title, ids) in groups {
        if ids.is_empty() {
            continue;
        }
        writeln!(writer, "{} ({})", title, ids.len())?;
        for id in ids {
            writeln!(writer, "    {}", compilation.display_decl(*id))?;
        }
    }
    Ok(())
}
