//! Human-readable C forms of types and declarations
//!
//! Used by the info printer to list top-level declarations. The output is a
//! readable approximation of the source, not a round-trippable printer.

use std::fmt;

use super::decl::{AttributeKind, ClassKind, DeclId, DeclKind, StorageQualifier};
use super::types::{CType, TypeId};
use super::Compilation;

impl Compilation {
    /// Spelling of a type without a declared name, e.g. `int (*)(char)`
    pub fn type_name(&self, ty: TypeId) -> String {
        self.declarator(ty, String::new())
    }

    /// Spelling of a declaration of `name` with type `ty`, e.g. `char *argv[]`
    pub fn declarator(&self, ty: TypeId, inner: String) -> String {
        match self.ty(ty) {
            CType::Pointer(element) => self.pointer_declarator(*element, format!("*{}", inner)),
            CType::Qualified {
                element,
                qualifiers,
            } => {
                if let CType::Pointer(pointee) = self.ty(*element) {
                    let inner = if inner.is_empty() {
                        format!("*{}", qualifiers)
                    } else {
                        format!("*{} {}", qualifiers, inner)
                    };
                    self.pointer_declarator(*pointee, inner)
                } else {
                    format!("{} {}", qualifiers, self.declarator(*element, inner))
                }
            }
            CType::Array { element, size } => {
                let dims = match size {
                    Some(n) => format!("{}[{}]", inner, n),
                    None => format!("{}[]", inner),
                };
                self.declarator(*element, dims)
            }
            CType::Function {
                return_type,
                parameters,
                is_variadic,
            } => {
                let mut params: Vec<String> = parameters.iter().map(|p| self.type_name(*p)).collect();
                if *is_variadic {
                    params.push("...".to_string());
                }
                let params = if params.is_empty() {
                    "void".to_string()
                } else {
                    params.join(", ")
                };
                self.declarator(*return_type, format!("{}({})", inner, params))
            }
            _ => {
                let base = self.base_name(ty);
                if inner.is_empty() {
                    base
                } else {
                    format!("{} {}", base, inner)
                }
            }
        }
    }

    fn pointer_declarator(&self, pointee: TypeId, inner: String) -> String {
        let inner = match self.ty(pointee) {
            CType::Array { .. } | CType::Function { .. } => format!("({})", inner),
            _ => inner,
        };
        self.declarator(pointee, inner)
    }

    fn base_name(&self, ty: TypeId) -> String {
        match self.ty(ty) {
            CType::Primitive(kind) => kind.name().to_string(),
            CType::Unexposed(name) => name.clone(),
            CType::Declared(decl) => {
                let decl = self.decl(*decl);
                let name = if decl.name().is_empty() {
                    "(anonymous)"
                } else {
                    decl.name()
                };
                match &decl.kind {
                    DeclKind::Class(c) => format!("{} {}", c.class_kind.as_str(), name),
                    DeclKind::Enum(_) => format!("enum {}", name),
                    _ => name.to_string(),
                }
            }
            _ => String::new(),
        }
    }

    pub fn display_decl(&self, id: DeclId) -> DeclDisplay<'_> {
        DeclDisplay {
            compilation: self,
            id,
        }
    }
}

/// `Display` adapter returned by [`Compilation::display_decl`]
pub struct DeclDisplay<'a> {
    compilation: &'a Compilation,
    id: DeclId,
}

fn storage_prefix(storage: StorageQualifier) -> &'static str {
    match storage {
        StorageQualifier::None => "",
        StorageQualifier::Extern => "extern ",
        StorageQualifier::Static => "static ",
        StorageQualifier::Register => "register ",
        StorageQualifier::Auto => "auto ",
    }
}

impl fmt::Display for DeclDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.compilation;
        let decl = c.decl(self.id);
        match &decl.kind {
            DeclKind::Function(func) => {
                let mut params: Vec<String> = func
                    .parameters
                    .iter()
                    .map(|p| c.display_decl(*p).to_string())
                    .collect();
                if func.flags.is_variadic {
                    params.push("...".to_string());
                }
                let params = if params.is_empty() {
                    "void".to_string()
                } else {
                    params.join(", ")
                };
                write!(
                    f,
                    "{}{}{}",
                    storage_prefix(func.storage),
                    if func.flags.is_inline { "inline " } else { "" },
                    c.declarator(func.return_type, format!("{}({})", func.name, params))
                )
            }
            DeclKind::Parameter(p) => write!(f, "{}", c.declarator(p.ty, p.name.clone())),
            DeclKind::Field(field) => {
                write!(f, "{}{}", storage_prefix(field.storage), c.declarator(field.ty, field.name.clone()))?;
                if let Some(width) = field.bit_field_width {
                    write!(f, " : {}", width)?;
                }
                Ok(())
            }
            DeclKind::Class(class) => {
                let keyword = match class.class_kind {
                    ClassKind::Struct => "struct",
                    ClassKind::Union => "union",
                };
                if class.name.is_empty() {
                    write!(f, "{}", keyword)?;
                } else {
                    write!(f, "{} {}", keyword, class.name)?;
                }
                if class.is_definition {
                    write!(f, " {{")?;
                    for field in &class.fields {
                        write!(f, " {};", c.display_decl(*field))?;
                    }
                    write!(f, " }}")?;
                }
                Ok(())
            }
            DeclKind::Enum(e) => {
                write!(f, "enum {}", e.name)?;
                if e.is_definition {
                    let items: Vec<String> = e
                        .items
                        .iter()
                        .map(|i| c.display_decl(*i).to_string())
                        .collect();
                    write!(f, " {{{}}}", items.join(", "))?;
                }
                Ok(())
            }
            DeclKind::EnumItem(item) => write!(f, "{} = {}", item.name, item.value),
            DeclKind::Typedef(t) => write!(f, "typedef {}", c.declarator(t.element_type, t.name.clone())),
            DeclKind::Macro(m) => {
                write!(f, "#define {}", m.name)?;
                if let Some(params) = &m.parameters {
                    write!(f, "({})", params.join(", "))?;
                }
                if !m.value.is_empty() {
                    write!(f, " {}", m.value)?;
                }
                Ok(())
            }
            DeclKind::Attribute(a) => {
                let args = a
                    .arguments
                    .as_ref()
                    .map(|args| format!("({})", args))
                    .unwrap_or_default();
                match a.kind {
                    AttributeKind::Gnu => write!(f, "__attribute__(({}{}))", a.name, args),
                    AttributeKind::Declspec => write!(f, "__declspec({}{})", a.name, args),
                    AttributeKind::Pragma => match &a.arguments {
                        Some(rest) => write!(f, "#pragma {} {}", a.name, rest),
                        None => write!(f, "#pragma {}", a.name),
                    },
                }
            }
            DeclKind::Namespace(ns) => write!(f, "namespace {}", ns.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::PrimitiveKind;
    use super::super::{Decl, Function, FunctionFlags, Parameter, Span};
    use super::*;

    #[test]
    fn test_declarator_forms() {
        let mut c = Compilation::default();
        let int = c.types_mut().primitive(PrimitiveKind::Int);
        let ch = c.types_mut().primitive(PrimitiveKind::Char);
        let fn_ty = c.types_mut().intern(CType::Function {
            return_type: int,
            parameters: vec![ch],
            is_variadic: false,
        });
        let fp = c.types_mut().pointer_to(fn_ty);
        assert_eq!(c.declarator(fp, "cb".to_string()), "int (*cb)(char)");

        let pch = c.types_mut().pointer_to(ch);
        let argv = c.types_mut().array_of(pch, None);
        assert_eq!(c.declarator(argv, "argv".to_string()), "char *argv[]");
        assert_eq!(c.type_name(fp), "int (*)(char)");
    }

    #[test]
    fn test_function_display() {
        let mut c = Compilation::default();
        let int = c.types_mut().primitive(PrimitiveKind::Int);
        let a = c.add_decl(Decl::new(
            DeclKind::Parameter(Parameter {
                name: "a".to_string(),
                ty: int,
            }),
            Span::default(),
        ));
        let f = c.add_decl(Decl::new(
            DeclKind::Function(Function {
                name: "f".to_string(),
                return_type: int,
                parameters: vec![a],
                storage: StorageQualifier::Static,
                linkage: Default::default(),
                flags: FunctionFlags::default(),
                calling_convention: Default::default(),
                attributes: Vec::new(),
                body: Vec::new(),
            }),
            Span::default(),
        ));
        assert_eq!(c.display_decl(f).to_string(), "static int f(int a)");
    }
}
