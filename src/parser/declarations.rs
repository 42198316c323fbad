//! Declaration parsing implementation
//!
//! This module handles parsing of declarations in C programs:
//!
//! - Declaration specifiers: storage class, qualifiers, type specifiers
//! - Struct, union and enum specifiers, including forward declarations
//! - Declarators: pointers, arrays, functions, nested `(*name)` forms
//! - Function definitions, including old-style parameter declarations
//! - GNU `__attribute__` and MSVC `__declspec` lists
//!
//! # Grammar
//!
//! ```text
//! declaration   ::= specifiers (declarator ("=" initializer)?) ("," ...)* ";"
//! function_def  ::= specifiers declarator declaration* "{" statements "}"
//! record        ::= ("struct" | "union") attrs? name? ("{" member* "}")?
//! enum          ::= "enum" attrs? name? ("{" enumerator ("," enumerator)* ","? "}")?
//! declarator    ::= ("*" qualifier*)* (name | "(" declarator ")") suffix*
//! suffix        ::= "[" constant? "]" | "(" parameters ")"
//! ```
//!
//! Every declaration is written straight into the compilation arena. File
//! scope declarations are also appended to the compilation's top-level
//! lists; block scope variables come back as [`Stmt::VarDecl`].
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use rustc_hash::FxHashMap;

use crate::compilation::{
    Attribute, AttributeKind, CType, CallingConvention, Class, ClassKind, Decl, DeclId, DeclKind,
    Enum, EnumItem, Field, Function, FunctionFlags, LinkageKind, Parameter, PrimitiveKind,
    Qualifiers, Span, StorageQualifier, TypeId, Typedef,
};
use crate::parser::ast::*;
use crate::parser::lexer::{join_spelling, Keyword, Punct, Token};
use crate::parser::parse::{Ordinary, ParseError, Parser};

/// Result of parsing declaration specifiers
#[derive(Debug, Clone)]
pub(crate) struct DeclSpec {
    pub(crate) storage: StorageQualifier,
    pub(crate) is_typedef: bool,
    pub(crate) is_inline: bool,
    pub(crate) no_return: bool,
    /// Base type with qualifiers applied
    pub(crate) ty: TypeId,
    pub(crate) calling_convention: CallingConvention,
    pub(crate) attributes: Vec<DeclId>,
    pub(crate) location: SourceLocation,
    /// Record or enum named or defined by the specifiers
    pub(crate) tag: Option<DeclId>,
}

/// Arithmetic type keywords seen so far
#[derive(Debug, Default)]
struct TypeSpecifiers {
    void: bool,
    boolean: bool,
    char: bool,
    short: bool,
    int: bool,
    long: u8,
    signed: bool,
    unsigned: bool,
    float: bool,
    double: bool,
    /// Width of an MSVC `__intN`
    ms_int: Option<u8>,
}

impl TypeSpecifiers {
    fn is_empty(&self) -> bool {
        !(self.void
            || self.boolean
            || self.char
            || self.short
            || self.int
            || self.long > 0
            || self.signed
            || self.unsigned
            || self.float
            || self.double
            || self.ms_int.is_some())
    }

    fn add(&mut self, keyword: Keyword) {
        match keyword {
            Keyword::Void => self.void = true,
            Keyword::Bool => self.boolean = true,
            Keyword::Char => self.char = true,
            Keyword::Short => self.short = true,
            Keyword::Int => self.int = true,
            Keyword::Long => self.long = self.long.saturating_add(1),
            Keyword::Signed => self.signed = true,
            Keyword::Unsigned => self.unsigned = true,
            Keyword::Float => self.float = true,
            Keyword::Double => self.double = true,
            Keyword::Int8 => self.ms_int = Some(8),
            Keyword::Int16 => self.ms_int = Some(16),
            Keyword::Int32 => self.ms_int = Some(32),
            Keyword::Int64 => self.ms_int = Some(64),
            _ => {}
        }
    }

    fn primitive(&self) -> PrimitiveKind {
        use PrimitiveKind::*;
        let unsigned = self.unsigned;
        if self.void {
            return Void;
        }
        if self.boolean {
            return Bool;
        }
        if self.float {
            return Float;
        }
        if self.double {
            return if self.long > 0 { LongDouble } else { Double };
        }
        match self.ms_int {
            Some(8) if unsigned => return UnsignedChar,
            Some(8) if self.signed => return SignedChar,
            Some(8) => return Char,
            Some(16) => return if unsigned { UnsignedShort } else { Short },
            Some(32) => return if unsigned { UnsignedInt } else { Int },
            Some(_) => return if unsigned { UnsignedLongLong } else { LongLong },
            None => {}
        }
        if self.char {
            return if unsigned {
                UnsignedChar
            } else if self.signed {
                SignedChar
            } else {
                Char
            };
        }
        if self.short {
            return if unsigned { UnsignedShort } else { Short };
        }
        match (self.long, unsigned) {
            (0, false) => Int,
            (0, true) => UnsignedInt,
            (1, false) => Long,
            (1, true) => UnsignedLong,
            (_, false) => LongLong,
            (_, true) => UnsignedLongLong,
        }
    }
}

/// One parameter as written in a parameter list
#[derive(Debug, Clone)]
pub(crate) struct ParamDecl {
    pub(crate) name: String,
    pub(crate) ty: TypeId,
    pub(crate) location: SourceLocation,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ParamList {
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) is_variadic: bool,
    /// Old-style `f(a, b)`; the types come from declarations after the list
    pub(crate) identifier_list: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Suffix {
    Array(Option<u64>),
    Function(ParamList),
}

/// A parsed declarator, kept as a tree until it is applied to a base type
#[derive(Debug, Clone, Default)]
pub(crate) struct Declarator {
    pub(crate) name: Option<String>,
    pub(crate) location: SourceLocation,
    pointers: Vec<Qualifiers>,
    inner: Option<Box<Declarator>>,
    suffixes: Vec<Suffix>,
    calling_convention: CallingConvention,
    attributes: Vec<DeclId>,
}

impl Declarator {
    fn empty(location: SourceLocation) -> Self {
        Declarator {
            location,
            ..Declarator::default()
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        match &self.inner {
            Some(inner) => inner.name(),
            None => self.name.as_deref(),
        }
    }

    /// The level that carries the name
    fn named(&self) -> &Declarator {
        match &self.inner {
            Some(inner) => inner.named(),
            None => self,
        }
    }

    /// Parameters when the name itself is declared as a function
    pub(crate) fn function_params(&self) -> Option<&ParamList> {
        let named = self.named();
        if !named.pointers.is_empty() {
            return None;
        }
        match named.suffixes.first() {
            Some(Suffix::Function(list)) => Some(list),
            _ => None,
        }
    }

    fn calling_convention(&self) -> CallingConvention {
        let mut level = Some(self);
        let mut found = CallingConvention::Default;
        while let Some(d) = level {
            if d.calling_convention != CallingConvention::Default {
                found = d.calling_convention;
            }
            level = d.inner.as_deref();
        }
        found
    }

    fn all_attributes(&self) -> Vec<DeclId> {
        let mut attributes = self.attributes.clone();
        if let Some(inner) = &self.inner {
            attributes.extend(inner.all_attributes());
        }
        attributes
    }
}

fn calling_convention_of(keyword: Keyword) -> Option<CallingConvention> {
    match keyword {
        Keyword::Cdecl => Some(CallingConvention::Cdecl),
        Keyword::Stdcall => Some(CallingConvention::Stdcall),
        Keyword::Fastcall => Some(CallingConvention::Fastcall),
        Keyword::Vectorcall => Some(CallingConvention::Vectorcall),
        _ => None,
    }
}

fn is_specifier_keyword(keyword: Keyword) -> bool {
    !matches!(
        keyword,
        Keyword::Break
            | Keyword::Case
            | Keyword::Continue
            | Keyword::Default
            | Keyword::Do
            | Keyword::Else
            | Keyword::For
            | Keyword::Goto
            | Keyword::If
            | Keyword::Return
            | Keyword::Sizeof
            | Keyword::Switch
            | Keyword::While
            | Keyword::Asm
    )
}

impl Parser<'_> {
    /// Parse one declaration or function definition at file scope
    pub(crate) fn parse_external_declaration(&mut self) -> Result<(), ParseError> {
        if self.match_punct(Punct::Semicolon) {
            return Ok(());
        }
        if self.match_keyword(Keyword::Asm) {
            self.skip_parenthesized()?;
            return self.expect_semicolon("after top-level asm");
        }
        if self.is_static_assert() {
            return self.skip_static_assert();
        }

        let spec = self.parse_declaration_specifiers()?;
        if self.match_punct(Punct::Semicolon) {
            return Ok(());
        }

        let mut first = true;
        loop {
            let declarator = self.parse_declarator(false)?;
            if first && !spec.is_typedef && self.starts_function_body(&declarator) {
                return self.parse_function_definition(&spec, declarator);
            }
            first = false;
            self.declare(&spec, declarator)?;
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_semicolon("after declaration")
    }

    /// Parse a declaration inside a function body
    pub(crate) fn parse_local_declaration(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let spec = self.parse_declaration_specifiers()?;
        let mut statements = Vec::new();
        if self.match_punct(Punct::Semicolon) {
            return Ok(statements);
        }
        loop {
            let declarator = self.parse_declarator(false)?;
            if let Some(stmt) = self.declare(&spec, declarator)? {
                statements.push(stmt);
            }
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_semicolon("after declaration")?;
        Ok(statements)
    }

    fn starts_function_body(&self, declarator: &Declarator) -> bool {
        let Some(params) = declarator.function_params() else {
            return false;
        };
        if self.check_punct(Punct::LBrace) {
            return true;
        }
        params.identifier_list
            && !params.params.is_empty()
            && !(self.check_punct(Punct::Semicolon)
                || self.check_punct(Punct::Comma)
                || self.check_punct(Punct::Eq))
    }

    /// Record one declarator. File scope objects become fields, functions
    /// and typedefs of the compilation; block scope objects come back as
    /// a statement.
    pub(crate) fn declare(
        &mut self,
        spec: &DeclSpec,
        declarator: Declarator,
    ) -> Result<Option<Stmt>, ParseError> {
        let Some(name) = declarator.name().map(str::to_string) else {
            return Err(ParseError {
                message: "Expected identifier in declaration".to_string(),
                location: declarator.location,
            });
        };
        let ty = self.apply_declarator(spec.ty, &declarator);
        let mut attributes = spec.attributes.clone();
        attributes.extend(declarator.all_attributes());

        if spec.is_typedef {
            let typedef = Typedef {
                name: name.clone(),
                element_type: ty,
                attributes: attributes.clone(),
            };
            let id = self.add_owned_decl(DeclKind::Typedef(typedef), spec.location, &attributes);
            let declared = self.compilation.types_mut().intern(CType::Declared(id));
            self.declare_ordinary(&name, Ordinary::Typedef(declared));
            if self.at_file_scope() {
                self.compilation.typedefs.push(id);
            }
            return Ok(None);
        }

        if matches!(self.compilation.ty(ty), CType::Function { .. }) {
            self.declare_ordinary(&name, Ordinary::Object);
            if self.at_file_scope() {
                self.create_function(spec, &declarator, &name, ty, None);
            }
            return Ok(None);
        }

        self.declare_ordinary(&name, Ordinary::Object);
        let init = if self.match_punct(Punct::Eq) {
            Some(self.parse_initializer()?)
        } else {
            None
        };
        let ty = self.complete_array_type(ty, init.as_ref());

        if self.at_file_scope() {
            let field = Field {
                name,
                ty,
                storage: spec.storage,
                bit_field_width: None,
                init_value: init,
                attributes: attributes.clone(),
            };
            let id = self.add_owned_decl(DeclKind::Field(field), spec.location, &attributes);
            self.compilation.fields.push(id);
            Ok(None)
        } else {
            Ok(Some(Stmt::VarDecl {
                name,
                ty,
                is_static: spec.storage == StorageQualifier::Static,
                init,
                location: declarator.location,
            }))
        }
    }

    /// `int a[] = {1, 2, 3}` has type `int[3]`
    fn complete_array_type(&mut self, ty: TypeId, init: Option<&Expr>) -> TypeId {
        let CType::Array {
            element,
            size: None,
        } = *self.compilation.ty(ty)
        else {
            return ty;
        };
        let size = match init {
            Some(Expr::InitList { items, .. })
                if !items.iter().any(|i| matches!(i, Expr::Designated { .. })) =>
            {
                items.len() as u64
            }
            Some(Expr::StringLiteral(s, _)) => s.len() as u64 + 1,
            _ => return ty,
        };
        self.compilation.types_mut().array_of(element, Some(size))
    }

    /// Add a declaration spanning from `start` to the last consumed token
    /// and make it the parent of its attributes
    fn add_owned_decl(&mut self, kind: DeclKind, start: SourceLocation, attributes: &[DeclId]) -> DeclId {
        let span = Span::new(start, self.previous_location());
        let id = self.compilation.add_decl(Decl::new(kind, span));
        for attribute in attributes {
            self.compilation.decl_mut(*attribute).parent = Some(id);
        }
        id
    }

    fn create_function(
        &mut self,
        spec: &DeclSpec,
        declarator: &Declarator,
        name: &str,
        ty: TypeId,
        definition: Option<&FxHashMap<String, TypeId>>,
    ) -> DeclId {
        let (return_type, is_variadic) = match self.compilation.ty(ty) {
            CType::Function {
                return_type,
                is_variadic,
                ..
            } => (*return_type, *is_variadic),
            _ => (ty, false),
        };
        let list = declarator.function_params().cloned().unwrap_or_default();

        let mut attributes = spec.attributes.clone();
        attributes.extend(declarator.all_attributes());
        let no_return = spec.no_return
            || attributes
                .iter()
                .any(|a| self.compilation.decl(*a).name() == "noreturn");
        let calling_convention = match declarator.calling_convention() {
            CallingConvention::Default => spec.calling_convention,
            cc => cc,
        };

        let function = Function {
            name: name.to_string(),
            return_type,
            parameters: Vec::new(),
            storage: spec.storage,
            linkage: if spec.storage == StorageQualifier::Static {
                LinkageKind::Internal
            } else {
                LinkageKind::External
            },
            flags: FunctionFlags {
                is_inline: spec.is_inline,
                is_variadic,
                has_body: definition.is_some(),
                no_return,
            },
            calling_convention,
            attributes: attributes.clone(),
            body: Vec::new(),
        };
        let id = self.add_owned_decl(DeclKind::Function(function), spec.location, &attributes);

        let int = self.compilation.types_mut().primitive(PrimitiveKind::Int);
        let mut parameters = Vec::with_capacity(list.params.len());
        for param in &list.params {
            let (param_name, param_ty) = if list.identifier_list {
                match definition {
                    Some(types) => (
                        param.name.clone(),
                        types.get(&param.name).copied().unwrap_or(int),
                    ),
                    // a prototype like `void f(HANDLE)` with an unknown type name
                    None => (
                        String::new(),
                        self.compilation
                            .types_mut()
                            .intern(CType::Unexposed(param.name.clone())),
                    ),
                }
            } else {
                (param.name.clone(), param.ty)
            };
            let parameter = Parameter {
                name: param_name,
                ty: param_ty,
            };
            let decl = Decl::new(DeclKind::Parameter(parameter), Span::point(param.location))
                .with_parent(Some(id));
            parameters.push(self.compilation.add_decl(decl));
        }
        if let DeclKind::Function(f) = &mut self.compilation.decl_mut(id).kind {
            f.parameters = parameters;
        }
        self.compilation.functions.push(id);
        id
    }

    fn parse_function_definition(&mut self, spec: &DeclSpec, declarator: Declarator) -> Result<(), ParseError> {
        let name = declarator.name().unwrap_or_default().to_string();
        let ty = self.apply_declarator(spec.ty, &declarator);

        // old-style parameter declarations between `)` and `{`
        let mut declared_types = FxHashMap::default();
        while !self.check_punct(Punct::LBrace) && !self.is_at_end() {
            let param_spec = self.parse_declaration_specifiers()?;
            loop {
                let d = self.parse_declarator(false)?;
                let param_ty = self.apply_declarator(param_spec.ty, &d);
                let param_ty = self.adjust_parameter_type(param_ty);
                if let Some(param_name) = d.name() {
                    declared_types.insert(param_name.to_string(), param_ty);
                }
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_semicolon("after parameter declaration")?;
        }

        self.declare_ordinary(&name, Ordinary::Object);
        let id = self.create_function(spec, &declarator, &name, ty, Some(&declared_types));
        let parameters = self
            .compilation
            .decl(id)
            .as_function()
            .map(|f| f.parameters.clone())
            .unwrap_or_default();

        self.push_scope();
        for parameter in parameters {
            let param_name = self.compilation.decl(parameter).name().to_string();
            self.declare_ordinary(&param_name, Ordinary::Object);
        }
        let body = self.parse_function_body();
        self.pop_scope();
        let body = body?;

        let end = self.previous_location();
        let decl = self.compilation.decl_mut(id);
        decl.span.end = end;
        if let DeclKind::Function(f) = &mut decl.kind {
            f.body = body;
        }
        Ok(())
    }

    fn parse_function_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if !self.function_bodies {
            self.skip_balanced(Punct::LBrace, Punct::RBrace)?;
            return Ok(Vec::new());
        }
        self.expect_lbrace("to open function body")?;
        let statements = self.parse_block_statements();
        self.expect_rbrace("to close function body")?;
        Ok(statements)
    }

    // ===== Specifiers =====

    pub(crate) fn parse_declaration_specifiers(&mut self) -> Result<DeclSpec, ParseError> {
        let location = self.current_location();
        let mut storage = StorageQualifier::None;
        let mut is_typedef = false;
        let mut is_inline = false;
        let mut no_return = false;
        let mut qualifiers = Qualifiers::default();
        let mut specifiers = TypeSpecifiers::default();
        // typedef, record, enum or unexposed type
        let mut named: Option<TypeId> = None;
        let mut unexposed = false;
        let mut calling_convention = CallingConvention::Default;
        let mut attributes = Vec::new();
        let mut tag = None;

        loop {
            match self.peek().clone() {
                Token::Keyword(keyword, _) => {
                    match keyword {
                        Keyword::Typedef => is_typedef = true,
                        Keyword::Extern => storage = StorageQualifier::Extern,
                        Keyword::Static => storage = StorageQualifier::Static,
                        Keyword::Auto => storage = StorageQualifier::Auto,
                        Keyword::Register => storage = StorageQualifier::Register,
                        Keyword::Inline => is_inline = true,
                        Keyword::Noreturn => no_return = true,
                        Keyword::Const => qualifiers.is_const = true,
                        Keyword::Volatile => qualifiers.is_volatile = true,
                        Keyword::Restrict => qualifiers.is_restrict = true,
                        Keyword::Extension | Keyword::MsModifier => {}
                        Keyword::Cdecl | Keyword::Stdcall | Keyword::Fastcall | Keyword::Vectorcall => {
                            calling_convention =
                                calling_convention_of(keyword).unwrap_or(calling_convention);
                        }
                        Keyword::Attribute | Keyword::Declspec => {
                            attributes.extend(self.parse_attribute_specifiers()?);
                            continue;
                        }
                        Keyword::Struct | Keyword::Union | Keyword::Enum => {
                            self.advance();
                            let id = match keyword {
                                Keyword::Struct => self.parse_record_specifier(ClassKind::Struct)?,
                                Keyword::Union => self.parse_record_specifier(ClassKind::Union)?,
                                _ => self.parse_enum_specifier()?,
                            };
                            named = Some(self.compilation.types_mut().intern(CType::Declared(id)));
                            unexposed = false;
                            tag = Some(id);
                            continue;
                        }
                        Keyword::Void
                        | Keyword::Bool
                        | Keyword::Char
                        | Keyword::Short
                        | Keyword::Int
                        | Keyword::Long
                        | Keyword::Signed
                        | Keyword::Unsigned
                        | Keyword::Float
                        | Keyword::Double
                        | Keyword::Int8
                        | Keyword::Int16
                        | Keyword::Int32
                        | Keyword::Int64 => {
                            specifiers.add(keyword);
                            if unexposed {
                                named = None;
                                unexposed = false;
                            }
                        }
                        _ => break,
                    }
                    self.advance();
                }
                Token::Ident(name, _) => {
                    let type_slot_open = (named.is_none() && specifiers.is_empty()) || unexposed;
                    if !type_slot_open {
                        break;
                    }
                    if let Some(ty) = self.lookup_typedef(&name) {
                        named = Some(ty);
                        unexposed = false;
                    } else if self.unknown_type_follows() {
                        named = Some(self.compilation.types_mut().intern(CType::Unexposed(name)));
                        unexposed = true;
                    } else {
                        break;
                    }
                    self.advance();
                }
                _ => break,
            }
        }

        let base = match named {
            Some(ty) => ty,
            None => {
                // implicit int when no type specifier is given
                let kind = if specifiers.is_empty() {
                    PrimitiveKind::Int
                } else {
                    specifiers.primitive()
                };
                self.compilation.types_mut().primitive(kind)
            }
        };
        let ty = self.compilation.types_mut().qualified(base, qualifiers);

        Ok(DeclSpec {
            storage,
            is_typedef,
            is_inline,
            no_return,
            ty,
            calling_convention,
            attributes,
            location,
            tag,
        })
    }

    /// An unknown identifier in specifier position names a type when what
    /// follows can only continue a declaration
    fn unknown_type_follows(&self) -> bool {
        match self.peek_ahead(1) {
            Some(Token::Ident(..)) => true,
            Some(Token::Punct(Punct::Star, _)) => true,
            Some(Token::Keyword(keyword, _)) => is_specifier_keyword(*keyword),
            _ => false,
        }
    }

    pub(crate) fn is_type_start(&self, token: &Token) -> bool {
        match token {
            Token::Keyword(keyword, _) => matches!(
                keyword,
                Keyword::Void
                    | Keyword::Bool
                    | Keyword::Char
                    | Keyword::Short
                    | Keyword::Int
                    | Keyword::Long
                    | Keyword::Float
                    | Keyword::Double
                    | Keyword::Signed
                    | Keyword::Unsigned
                    | Keyword::Struct
                    | Keyword::Union
                    | Keyword::Enum
                    | Keyword::Const
                    | Keyword::Volatile
                    | Keyword::Restrict
                    | Keyword::Int8
                    | Keyword::Int16
                    | Keyword::Int32
                    | Keyword::Int64
                    | Keyword::Attribute
                    | Keyword::Declspec
                    | Keyword::MsModifier
            ),
            Token::Ident(name, _) => self.lookup_typedef(name).is_some(),
            _ => false,
        }
    }

    pub(crate) fn starts_type_name(&self) -> bool {
        self.is_type_start(self.peek())
    }

    /// Does the current token begin a block scope declaration?
    pub(crate) fn starts_declaration(&self) -> bool {
        match self.peek() {
            Token::Keyword(
                Keyword::Typedef
                | Keyword::Extern
                | Keyword::Static
                | Keyword::Auto
                | Keyword::Register
                | Keyword::Inline
                | Keyword::Noreturn,
                _,
            ) => true,
            Token::Ident(name, _) if self.lookup_typedef(name).is_none() => {
                matches!(self.peek_ahead(1), Some(Token::Ident(..)))
            }
            token => self.is_type_start(token),
        }
    }

    /// Parse a type name as used in casts, `sizeof` and compound literals
    pub(crate) fn parse_type_name(&mut self) -> Result<TypeId, ParseError> {
        let spec = self.parse_declaration_specifiers()?;
        let declarator = self.parse_declarator(true)?;
        Ok(self.apply_declarator(spec.ty, &declarator))
    }

    pub(crate) fn is_static_assert(&self) -> bool {
        matches!(self.peek(), Token::Ident(name, _) if name == "_Static_assert" || name == "static_assert")
    }

    pub(crate) fn skip_static_assert(&mut self) -> Result<(), ParseError> {
        self.advance();
        self.skip_parenthesized()?;
        self.expect_semicolon("after static assertion")
    }

    // ===== Records =====

    fn parse_record_specifier(&mut self, kind: ClassKind) -> Result<DeclId, ParseError> {
        let start = self.previous_location();
        let mut attributes = self.parse_attribute_specifiers()?;
        let name = match self.peek() {
            Token::Ident(name, _) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => String::new(),
        };
        let defining = self.check_punct(Punct::LBrace);
        if name.is_empty() && !defining {
            return Err(ParseError {
                message: format!("Expected '{{' or name after '{}', found {}", kind.as_str(), self.peek()),
                location: self.current_location(),
            });
        }

        let existing = self.find_tag(&name, defining).filter(|id| {
            matches!(&self.compilation.decl(*id).kind, DeclKind::Class(c) if c.class_kind == kind)
        });
        let id = match existing {
            Some(id) if defining && self.is_defined_record(id) => {
                self.report(ParseError {
                    message: format!("Redefinition of '{} {}'", kind.as_str(), name),
                    location: start,
                });
                self.new_record(&name, kind, start)
            }
            Some(id) => id,
            None => self.new_record(&name, kind, start),
        };

        if !defining {
            self.attach_class_attributes(id, attributes);
            return Ok(id);
        }

        self.advance();
        self.record_stack.push(id);
        let members = self.nested(|p| p.parse_member_declarations(id));
        self.record_stack.pop();
        let fields = members?;
        self.expect_rbrace("after member list")?;
        attributes.extend(self.parse_attribute_specifiers()?);

        let (size_of, align_of) = self.compilation.layout_record(&fields, kind);
        let end = self.previous_location();
        let decl = self.compilation.decl_mut(id);
        decl.span = Span::new(start, end);
        if let DeclKind::Class(class) = &mut decl.kind {
            class.is_definition = true;
            class.fields = fields;
            class.size_of = size_of;
            class.align_of = align_of;
        }
        self.attach_class_attributes(id, attributes);
        Ok(id)
    }

    /// A tag being declared or defined binds in the current scope; any
    /// other use refers to the innermost visible one
    fn find_tag(&self, name: &str, defining: bool) -> Option<DeclId> {
        if name.is_empty() {
            return None;
        }
        if defining || self.check_punct(Punct::Semicolon) {
            self.lookup_tag_in_current_scope(name)
        } else {
            self.lookup_tag(name)
        }
    }

    fn is_defined_record(&self, id: DeclId) -> bool {
        matches!(&self.compilation.decl(id).kind, DeclKind::Class(c) if c.is_definition)
    }

    fn attach_class_attributes(&mut self, id: DeclId, attributes: Vec<DeclId>) {
        for attribute in &attributes {
            self.compilation.decl_mut(*attribute).parent = Some(id);
        }
        if let DeclKind::Class(class) = &mut self.compilation.decl_mut(id).kind {
            class.attributes.extend(attributes);
        }
    }

    fn new_record(&mut self, name: &str, kind: ClassKind, location: SourceLocation) -> DeclId {
        let parent = self.record_stack.last().copied();
        let class = Class {
            name: name.to_string(),
            class_kind: kind,
            is_definition: false,
            size_of: 0,
            align_of: 0,
            fields: Vec::new(),
            classes: Vec::new(),
            attributes: Vec::new(),
        };
        let id = self
            .compilation
            .add_decl(Decl::new(DeclKind::Class(class), Span::point(location)).with_parent(parent));
        self.declare_tag(name, id);

        match parent {
            Some(outer) => {
                if let DeclKind::Class(c) = &mut self.compilation.decl_mut(outer).kind {
                    c.classes.push(id);
                }
            }
            None if self.at_file_scope() => self.compilation.classes.push(id),
            None => {}
        }
        id
    }

    fn parse_member_declarations(&mut self, record: DeclId) -> Result<Vec<DeclId>, ParseError> {
        let mut fields = Vec::new();

        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            if self.match_punct(Punct::Semicolon) {
                continue;
            }
            if self.is_static_assert() {
                self.skip_static_assert()?;
                continue;
            }

            let spec = self.parse_declaration_specifiers()?;
            if self.match_punct(Punct::Semicolon) {
                // anonymous struct or union member
                let anonymous = spec
                    .tag
                    .is_some_and(|tag| self.compilation.decl(tag).name().is_empty());
                if anonymous {
                    let field = Field {
                        name: String::new(),
                        ty: spec.ty,
                        storage: StorageQualifier::None,
                        bit_field_width: None,
                        init_value: None,
                        attributes: spec.attributes.clone(),
                    };
                    let id = self.add_owned_decl(DeclKind::Field(field), spec.location, &spec.attributes);
                    self.compilation.decl_mut(id).parent = Some(record);
                    fields.push(id);
                }
                continue;
            }

            loop {
                let start = self.current_location();
                let declarator = if self.check_punct(Punct::Colon) {
                    Declarator::empty(start)
                } else {
                    self.parse_declarator(false)?
                };
                let ty = self.apply_declarator(spec.ty, &declarator);
                let bit_field_width = if self.match_punct(Punct::Colon) {
                    Some(self.parse_bit_field_width()?)
                } else {
                    None
                };
                let mut attributes = spec.attributes.clone();
                attributes.extend(declarator.all_attributes());
                attributes.extend(self.parse_attribute_specifiers()?);

                let field = Field {
                    name: declarator.name().unwrap_or_default().to_string(),
                    ty,
                    storage: StorageQualifier::None,
                    bit_field_width,
                    init_value: None,
                    attributes: attributes.clone(),
                };
                let id = self.add_owned_decl(DeclKind::Field(field), spec.location, &attributes);
                self.compilation.decl_mut(id).parent = Some(record);
                fields.push(id);

                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_semicolon("after member declaration")?;
        }

        Ok(fields)
    }

    fn parse_bit_field_width(&mut self) -> Result<u32, ParseError> {
        let location = self.current_location();
        let expr = self.parse_conditional_expression()?;
        self.constant_value(&expr)
            .and_then(|width| u32::try_from(width).ok())
            .ok_or_else(|| ParseError {
                message: "Bit-field width is not a non-negative integer constant".to_string(),
                location,
            })
    }

    // ===== Enums =====

    fn parse_enum_specifier(&mut self) -> Result<DeclId, ParseError> {
        let start = self.previous_location();
        let mut attributes = self.parse_attribute_specifiers()?;
        let name = match self.peek() {
            Token::Ident(name, _) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => String::new(),
        };
        // `enum E : short { ... }`
        let fixed_type = if self.match_punct(Punct::Colon) {
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let defining = self.check_punct(Punct::LBrace);
        if name.is_empty() && !defining {
            return Err(ParseError {
                message: format!("Expected '{{' or name after 'enum', found {}", self.peek()),
                location: self.current_location(),
            });
        }

        let existing = self
            .find_tag(&name, defining)
            .filter(|id| matches!(&self.compilation.decl(*id).kind, DeclKind::Enum(_)));
        let id = match existing {
            Some(id) if !defining || !self.is_defined_enum(id) => id,
            Some(_) => {
                self.report(ParseError {
                    message: format!("Redefinition of 'enum {}'", name),
                    location: start,
                });
                self.new_enum(&name, start)
            }
            None => self.new_enum(&name, start),
        };

        if !defining {
            self.attach_enum_attributes(id, attributes);
            return Ok(id);
        }
        self.advance();

        let mut items = Vec::new();
        let mut values = Vec::new();
        let mut next: i64 = 0;
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            let item_start = self.current_location();
            let item_name = self.expect_identifier()?;
            self.parse_attribute_specifiers()?;
            let value = if self.match_punct(Punct::Eq) {
                let expr = self.parse_conditional_expression()?;
                match self.constant_value(&expr) {
                    Some(value) => value,
                    None => {
                        self.report(ParseError {
                            message: format!("Value of enumerator '{}' is not an integer constant", item_name),
                            location: *expr.location(),
                        });
                        next
                    }
                }
            } else {
                next
            };
            next = value.wrapping_add(1);
            self.declare_ordinary(&item_name, Ordinary::EnumConstant(value));

            let item = EnumItem {
                name: item_name,
                value,
            };
            let span = Span::new(item_start, self.previous_location());
            let decl = Decl::new(DeclKind::EnumItem(item), span).with_parent(Some(id));
            items.push(self.compilation.add_decl(decl));
            values.push(value);

            if !self.match_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_rbrace("after enumerator list")?;
        attributes.extend(self.parse_attribute_specifiers()?);

        let integer_type = match fixed_type {
            Some(ty) => ty,
            None => self.enum_integer_type(&values),
        };
        let end = self.previous_location();
        let decl = self.compilation.decl_mut(id);
        decl.span = Span::new(start, end);
        if let DeclKind::Enum(e) = &mut decl.kind {
            e.is_definition = true;
            e.items = items;
            e.integer_type = integer_type;
        }
        self.attach_enum_attributes(id, attributes);
        Ok(id)
    }

    fn is_defined_enum(&self, id: DeclId) -> bool {
        matches!(&self.compilation.decl(id).kind, DeclKind::Enum(e) if e.is_definition)
    }

    fn attach_enum_attributes(&mut self, id: DeclId, attributes: Vec<DeclId>) {
        for attribute in &attributes {
            self.compilation.decl_mut(*attribute).parent = Some(id);
        }
        if let DeclKind::Enum(e) = &mut self.compilation.decl_mut(id).kind {
            e.attributes.extend(attributes);
        }
    }

    fn new_enum(&mut self, name: &str, location: SourceLocation) -> DeclId {
        let parent = self.record_stack.last().copied();
        let integer_type = self.compilation.types_mut().primitive(PrimitiveKind::Int);
        let e = Enum {
            name: name.to_string(),
            is_definition: false,
            integer_type,
            items: Vec::new(),
            attributes: Vec::new(),
        };
        let id = self
            .compilation
            .add_decl(Decl::new(DeclKind::Enum(e), Span::point(location)).with_parent(parent));
        self.declare_tag(name, id);
        if self.at_file_scope() {
            self.compilation.enums.push(id);
        }
        id
    }

    /// `int` when every value fits, then `unsigned int`, then `long long`.
    /// MSVC always uses `int`.
    fn enum_integer_type(&mut self, values: &[i64]) -> TypeId {
        let fits_int = values.iter().all(|v| i32::try_from(*v).is_ok());
        let fits_uint = values.iter().all(|v| u32::try_from(*v).is_ok());
        let kind = if self.compilation.target().msvc || fits_int {
            PrimitiveKind::Int
        } else if fits_uint {
            PrimitiveKind::UnsignedInt
        } else {
            PrimitiveKind::LongLong
        };
        self.compilation.types_mut().primitive(kind)
    }

    // ===== Declarators =====

    pub(crate) fn parse_declarator(&mut self, abstract_allowed: bool) -> Result<Declarator, ParseError> {
        self.nested(|p| p.declarator(abstract_allowed))
    }

    fn declarator(&mut self, abstract_allowed: bool) -> Result<Declarator, ParseError> {
        let mut declarator = Declarator::empty(self.current_location());
        self.parse_declarator_modifiers(&mut declarator)?;

        while self.match_punct(Punct::Star) {
            let mut qualifiers = Qualifiers::default();
            loop {
                match self.peek() {
                    Token::Keyword(Keyword::Const, _) => qualifiers.is_const = true,
                    Token::Keyword(Keyword::Volatile, _) => qualifiers.is_volatile = true,
                    Token::Keyword(Keyword::Restrict, _) => qualifiers.is_restrict = true,
                    Token::Keyword(
                        Keyword::MsModifier
                        | Keyword::Cdecl
                        | Keyword::Stdcall
                        | Keyword::Fastcall
                        | Keyword::Vectorcall
                        | Keyword::Attribute
                        | Keyword::Declspec,
                        _,
                    ) => {
                        self.parse_declarator_modifiers(&mut declarator)?;
                        continue;
                    }
                    _ => break,
                }
                self.advance();
            }
            declarator.pointers.push(qualifiers);
        }
        self.parse_declarator_modifiers(&mut declarator)?;

        match self.peek().clone() {
            Token::Ident(name, location) => {
                self.advance();
                declarator.name = Some(name);
                declarator.location = location;
            }
            Token::Punct(Punct::LParen, _) if self.is_nested_declarator(abstract_allowed) => {
                self.advance();
                let inner = self.parse_declarator(abstract_allowed)?;
                self.expect_rparen("after nested declarator")?;
                declarator.location = inner.location;
                declarator.inner = Some(Box::new(inner));
            }
            _ if abstract_allowed => {}
            other => {
                return Err(ParseError {
                    message: format!("Expected identifier in declarator, found {}", other),
                    location: other.location(),
                })
            }
        }

        loop {
            if self.check_punct(Punct::LBracket) {
                let size = self.parse_array_suffix()?;
                declarator.suffixes.push(Suffix::Array(size));
            } else if self.match_punct(Punct::LParen) {
                let params = self.parse_parameter_list()?;
                declarator.suffixes.push(Suffix::Function(params));
            } else {
                break;
            }
        }

        // trailing attributes and asm labels
        loop {
            if self.match_keyword(Keyword::Asm) {
                self.skip_parenthesized()?;
            } else if self.check_keyword(Keyword::Attribute) || self.check_keyword(Keyword::Declspec) {
                declarator.attributes.extend(self.parse_attribute_specifiers()?);
            } else {
                break;
            }
        }

        Ok(declarator)
    }

    /// Calling conventions, attributes and ignored MSVC modifiers
    fn parse_declarator_modifiers(&mut self, declarator: &mut Declarator) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Token::Keyword(keyword, _) if calling_convention_of(*keyword).is_some() => {
                    declarator.calling_convention =
                        calling_convention_of(*keyword).unwrap_or_default();
                    self.advance();
                }
                Token::Keyword(Keyword::MsModifier, _) => {
                    self.advance();
                }
                Token::Keyword(Keyword::Attribute | Keyword::Declspec, _) => {
                    declarator.attributes.extend(self.parse_attribute_specifiers()?);
                }
                _ => return Ok(()),
            }
        }
    }

    /// At `(`: does a nested declarator follow, or a parameter list?
    fn is_nested_declarator(&self, abstract_allowed: bool) -> bool {
        match self.peek_ahead(1) {
            Some(Token::Punct(Punct::Star | Punct::Caret, _)) => true,
            Some(Token::Keyword(keyword, _)) => {
                calling_convention_of(*keyword).is_some()
                    || matches!(keyword, Keyword::Attribute | Keyword::Declspec | Keyword::MsModifier)
            }
            Some(Token::Ident(name, _)) => !abstract_allowed && self.lookup_typedef(name).is_none(),
            _ => false,
        }
    }

    fn parse_array_suffix(&mut self) -> Result<Option<u64>, ParseError> {
        self.expect_punct(Punct::LBracket, "Expected '['")?;
        while self.match_keyword(Keyword::Static)
            || self.match_keyword(Keyword::Const)
            || self.match_keyword(Keyword::Volatile)
            || self.match_keyword(Keyword::Restrict)
        {}
        if self.match_punct(Punct::RBracket) {
            return Ok(None);
        }
        if self.check_punct(Punct::Star) && self.peek_ahead(1).is_some_and(|t| t.is_punct(Punct::RBracket)) {
            self.advance();
            self.advance();
            return Ok(None);
        }
        let expr = self.parse_assignment_expression()?;
        let size = match self.constant_value(&expr) {
            Some(n) if n < 0 => {
                return Err(ParseError {
                    message: "Array has negative size".to_string(),
                    location: *expr.location(),
                })
            }
            Some(n) => Some(n as u64),
            // variable length array
            None => None,
        };
        self.expect_punct(Punct::RBracket, "Expected ']' after array size")?;
        Ok(size)
    }

    /// Parse a parameter list; the opening `(` is already consumed
    fn parse_parameter_list(&mut self) -> Result<ParamList, ParseError> {
        let mut list = ParamList::default();
        if self.match_punct(Punct::RParen) {
            return Ok(list);
        }
        if self.check_keyword(Keyword::Void) && self.peek_ahead(1).is_some_and(|t| t.is_punct(Punct::RParen)) {
            self.advance();
            self.advance();
            return Ok(list);
        }

        if self.is_identifier_list() {
            list.identifier_list = true;
            let int = self.compilation.types_mut().primitive(PrimitiveKind::Int);
            loop {
                let location = self.current_location();
                let name = self.expect_identifier()?;
                list.params.push(ParamDecl { name, ty: int, location });
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_rparen("after parameter list")?;
            return Ok(list);
        }

        loop {
            if self.match_punct(Punct::Ellipsis) {
                list.is_variadic = true;
                break;
            }
            let spec = self.parse_declaration_specifiers()?;
            let declarator = self.parse_declarator(true)?;
            let ty = self.apply_declarator(spec.ty, &declarator);
            let ty = self.adjust_parameter_type(ty);
            let (name, location) = match declarator.name() {
                Some(name) => (name.to_string(), declarator.named().location),
                None => (String::new(), spec.location),
            };
            list.params.push(ParamDecl { name, ty, location });
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_rparen("after parameter list")?;
        Ok(list)
    }

    fn is_identifier_list(&self) -> bool {
        match self.peek() {
            Token::Ident(name, _) if self.lookup_typedef(name).is_none() => matches!(
                self.peek_ahead(1),
                Some(Token::Punct(Punct::Comma | Punct::RParen, _))
            ),
            _ => false,
        }
    }

    /// Arrays and functions decay to pointers in parameter position
    fn adjust_parameter_type(&mut self, ty: TypeId) -> TypeId {
        match self.compilation.ty(ty).clone() {
            CType::Array { element, .. } => self.compilation.types_mut().pointer_to(element),
            CType::Function { .. } => self.compilation.types_mut().pointer_to(ty),
            _ => ty,
        }
    }

    /// Build the declared type: pointers bind to the base first, then the
    /// suffixes from the innermost outwards, then the nested declarator.
    pub(crate) fn apply_declarator(&mut self, base: TypeId, declarator: &Declarator) -> TypeId {
        let mut ty = base;
        for qualifiers in &declarator.pointers {
            ty = self.compilation.types_mut().pointer_to(ty);
            ty = self.compilation.types_mut().qualified(ty, *qualifiers);
        }
        for suffix in declarator.suffixes.iter().rev() {
            ty = match suffix {
                Suffix::Array(size) => self.compilation.types_mut().array_of(ty, *size),
                Suffix::Function(list) => {
                    let parameters = self.parameter_types(list);
                    self.compilation.types_mut().intern(CType::Function {
                        return_type: ty,
                        parameters,
                        is_variadic: list.is_variadic,
                    })
                }
            };
        }
        match &declarator.inner {
            Some(inner) => self.apply_declarator(ty, inner),
            None => ty,
        }
    }

    fn parameter_types(&mut self, list: &ParamList) -> Vec<TypeId> {
        if !list.identifier_list {
            return list.params.iter().map(|p| p.ty).collect();
        }
        list.params
            .iter()
            .map(|p| {
                self.compilation
                    .types_mut()
                    .intern(CType::Unexposed(p.name.clone()))
            })
            .collect()
    }

    // ===== Attributes =====

    /// Parse any run of `__attribute__((...))` and `__declspec(...)`
    pub(crate) fn parse_attribute_specifiers(&mut self) -> Result<Vec<DeclId>, ParseError> {
        let mut attributes = Vec::new();
        loop {
            if self.match_keyword(Keyword::Attribute) {
                self.expect_lparen("after '__attribute__'")?;
                self.expect_lparen("after '__attribute__('")?;
                while !self.check_punct(Punct::RParen) && !self.is_at_end() {
                    if self.match_punct(Punct::Comma) {
                        continue;
                    }
                    attributes.push(self.parse_attribute_item(AttributeKind::Gnu)?);
                }
                self.expect_rparen("to close attribute list")?;
                self.expect_rparen("to close '__attribute__'")?;
            } else if self.match_keyword(Keyword::Declspec) {
                self.expect_lparen("after '__declspec'")?;
                while !self.check_punct(Punct::RParen) && !self.is_at_end() {
                    attributes.push(self.parse_attribute_item(AttributeKind::Declspec)?);
                }
                self.expect_rparen("to close '__declspec'")?;
            } else {
                return Ok(attributes);
            }
        }
    }

    fn parse_attribute_item(&mut self, kind: AttributeKind) -> Result<DeclId, ParseError> {
        let location = self.current_location();
        let spelling = match self.peek() {
            Token::Ident(..) | Token::Keyword(..) => self.advance().spelling(),
            other => {
                return Err(ParseError {
                    message: format!("Expected attribute name, found {}", other),
                    location,
                })
            }
        };
        // `__packed__` and `packed` are the same attribute
        let name = match spelling.strip_prefix("__").and_then(|s| s.strip_suffix("__")) {
            Some(inner) if kind == AttributeKind::Gnu && !inner.is_empty() => inner.to_string(),
            _ => spelling,
        };
        let arguments = if self.check_punct(Punct::LParen) {
            Some(join_spelling(&self.skip_parenthesized()?))
        } else {
            None
        };
        let attribute = Attribute {
            name,
            kind,
            arguments,
        };
        let span = Span::new(location, self.previous_location());
        Ok(self.compilation.add_decl(Decl::new(DeclKind::Attribute(attribute), span)))
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::*;
    use crate::config::options::ParserOptions;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Compilation {
        let c = parse_source(source, &ParserOptions::default());
        assert!(!c.has_errors(), "unexpected diagnostics: {:?}", c.diagnostics.messages());
        c
    }

    fn type_of(c: &Compilation, name: &str) -> String {
        let id = c
            .fields
            .iter()
            .chain(c.typedefs.iter())
            .find(|id| c.decl(**id).name() == name)
            .copied()
            .unwrap_or_else(|| panic!("no declaration named {}", name));
        match &c.decl(id).kind {
            DeclKind::Field(f) => c.type_name(f.ty),
            DeclKind::Typedef(t) => c.type_name(t.element_type),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_declarator_shapes() {
        let c = parse(
            "int *a[3];\n\
             int (*b)[3];\n\
             int (*fp)(int, char *);\n\
             const char *const s;\n\
             unsigned long long big;\n\
             typedef void (*handler_t)(int);",
        );
        assert_eq!(type_of(&c, "a"), "int *[3]");
        assert_eq!(type_of(&c, "b"), "int (*)[3]");
        assert_eq!(type_of(&c, "fp"), "int (*)(int, char *)");
        assert_eq!(type_of(&c, "s"), "const char *const");
        assert_eq!(type_of(&c, "big"), "unsigned long long");
        assert_eq!(type_of(&c, "handler_t"), "void (*)(int)");
    }

    #[test]
    fn test_typedef_shares_type_identity() {
        let c = parse("typedef struct Node Node;\nstruct Node { Node *next; int v; };");
        assert_eq!(c.classes.len(), 1);
        let node = c.decl(c.classes[0]).as_class().unwrap();
        assert!(node.is_definition);
        assert_eq!(node.size_of, 16);
        let DeclKind::Field(next) = &c.decl(node.fields[0]).kind else {
            panic!("Expected field");
        };
        let CType::Pointer(pointee) = c.ty(next.ty) else {
            panic!("Expected pointer");
        };
        let CType::Declared(typedef) = c.ty(*pointee) else {
            panic!("Expected typedef");
        };
        let DeclKind::Typedef(t) = &c.decl(*typedef).kind else {
            panic!("Expected typedef decl");
        };
        assert_eq!(c.ty(t.element_type), &CType::Declared(c.classes[0]));
    }

    #[test]
    fn test_enum_values() {
        let c = parse("enum Color { RED, GREEN = 5, BLUE, MASK = 1 << 4, LAST = BLUE + 1 };");
        assert_eq!(c.enums.len(), 1);
        let DeclKind::Enum(e) = &c.decl(c.enums[0]).kind else {
            panic!("Expected enum");
        };
        let values: Vec<(String, i64)> = e
            .items
            .iter()
            .map(|id| match &c.decl(*id).kind {
                DeclKind::EnumItem(item) => (item.name.clone(), item.value),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                ("RED".to_string(), 0),
                ("GREEN".to_string(), 5),
                ("BLUE".to_string(), 6),
                ("MASK".to_string(), 16),
                ("LAST".to_string(), 7),
            ]
        );
        assert_eq!(c.ty(e.integer_type), &CType::Primitive(PrimitiveKind::Int));
        for item in &e.items {
            assert_eq!(c.decl(*item).parent, Some(c.enums[0]));
        }
    }

    #[test]
    fn test_array_size_from_enum_constant() {
        let c = parse("enum { N = 4 };\nint table[N * 2];\nchar name[] = \"abc\";");
        assert_eq!(type_of(&c, "table"), "int [8]");
        assert_eq!(type_of(&c, "name"), "char [4]");
    }

    #[test]
    fn test_function_prototype_and_definition() {
        let c = parse(
            "static inline int add(int a, int b) { return a + b; }\n\
             extern int printf(const char *fmt, ...);\n\
             _Noreturn void die(void);",
        );
        assert_eq!(c.functions.len(), 3);

        let add = c.decl(c.functions[0]).as_function().unwrap();
        assert_eq!(add.linkage, LinkageKind::Internal);
        assert_eq!(add.storage, StorageQualifier::Static);
        assert!(add.flags.is_inline && add.flags.has_body);
        assert_eq!(add.parameters.len(), 2);
        for p in &add.parameters {
            assert_eq!(c.decl(*p).parent, Some(c.functions[0]));
        }

        let printf = c.decl(c.functions[1]).as_function().unwrap();
        assert!(printf.flags.is_variadic);
        assert!(!printf.flags.has_body);
        assert_eq!(printf.linkage, LinkageKind::External);

        let die = c.decl(c.functions[2]).as_function().unwrap();
        assert!(die.flags.no_return);
        assert!(die.parameters.is_empty());
    }

    #[test]
    fn test_old_style_definition() {
        let c = parse("int sum(a, b) int a; long b; { return a + b; }");
        let sum = c.decl(c.functions[0]).as_function().unwrap();
        let types: Vec<String> = sum
            .parameters
            .iter()
            .map(|p| match &c.decl(*p).kind {
                DeclKind::Parameter(p) => format!("{} {}", c.type_name(p.ty), p.name),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(types, vec!["int a", "long b"]);
    }

    #[test]
    fn test_bit_fields_and_nested_records() {
        let c = parse(
            "struct Flags {\n\
                 unsigned a : 1;\n\
                 unsigned b : 3;\n\
                 struct Inner { int x; } inner;\n\
                 union { int i; float f; };\n\
             };",
        );
        assert_eq!(c.classes.len(), 1);
        let flags = c.decl(c.classes[0]).as_class().unwrap();
        assert_eq!(flags.fields.len(), 4);
        assert_eq!(flags.classes.len(), 2);
        let inner = c.decl(flags.classes[0]);
        assert_eq!(inner.name(), "Inner");
        assert_eq!(inner.parent, Some(c.classes[0]));

        let DeclKind::Field(a) = &c.decl(flags.fields[0]).kind else {
            panic!("Expected field");
        };
        assert_eq!(a.bit_field_width, Some(1));
        assert_eq!(flags.size_of, 12);
    }

    #[test]
    fn test_forward_declaration_is_completed_in_place() {
        let c = parse("struct S;\nstruct S *p;\nstruct S { int a; char b; };");
        assert_eq!(c.classes.len(), 1);
        let s = c.decl(c.classes[0]).as_class().unwrap();
        assert!(s.is_definition);
        assert_eq!(s.size_of, 8);
        assert_eq!(type_of(&c, "p"), "struct S *");
    }

    #[test]
    fn test_attributes() {
        let c = parse(
            "struct __attribute__((packed)) P { char c; int i; };\n\
             void fatal(const char *m) __attribute__((__noreturn__, format(printf, 1, 2)));",
        );
        let p = c.decl(c.classes[0]).as_class().unwrap();
        assert_eq!(p.attributes.len(), 1);
        assert_eq!(c.decl(p.attributes[0]).name(), "packed");

        let fatal = c.decl(c.functions[0]).as_function().unwrap();
        assert!(fatal.flags.no_return);
        let DeclKind::Attribute(format) = &c.decl(fatal.attributes[1]).kind else {
            panic!("Expected attribute");
        };
        assert_eq!(format.name, "format");
        assert_eq!(format.kind, AttributeKind::Gnu);
        assert_eq!(format.arguments.as_deref(), Some("printf, 1, 2"));
        assert_eq!(c.decl(fatal.attributes[0]).parent, Some(c.functions[0]));
    }

    #[test]
    fn test_unknown_type_names_are_unexposed() {
        let c = parse("HANDLE h;\nconst WCHAR *name;\nvoid close_it(HANDLE);");
        assert_eq!(type_of(&c, "h"), "HANDLE");
        assert_eq!(type_of(&c, "name"), "const WCHAR *");
        let close_it = c.decl(c.functions[0]).as_function().unwrap();
        let DeclKind::Parameter(p) = &c.decl(close_it.parameters[0]).kind else {
            panic!("Expected parameter");
        };
        assert_eq!(c.ty(p.ty), &CType::Unexposed("HANDLE".to_string()));
    }
}
