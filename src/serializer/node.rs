// Field extraction: what each output object contains, before rules apply

use std::borrow::Cow;

use crate::compilation::{CType, Compilation, DeclId, DeclKind, Span, TypeId};
use crate::parser::ast::{Expr, Stmt};
use crate::serializer::rules::NodeKind;
use crate::snapshot::Snapshot;

/// An object with identity: reaching it twice yields a `$ref`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Node {
    Decl(DeclId),
    /// Never a `CType::Declared`; those are the declaration itself
    Type(TypeId),
}

/// Anything that serializes as a JSON object
#[derive(Debug, Clone, Copy)]
pub(crate) enum Item<'a> {
    Snapshot,
    Node(Node),
    Statement(&'a Stmt),
    Expression(&'a Expr),
}

/// Value of one field
#[derive(Debug, Clone)]
pub(crate) enum Value<'a> {
    /// The field does not apply to this variant and is left out
    Absent,
    Null,
    Bool(bool),
    Int(i64),
    Unsigned(u64),
    Float(f64),
    Text(Cow<'a, str>),
    Names(Vec<&'a str>),
    Span(Span),
    Item(Item<'a>),
    Items(Vec<Item<'a>>),
    Map(Vec<(&'a str, Value<'a>)>),
}

/// The node a type reference resolves to
pub(crate) fn type_node(compilation: &Compilation, ty: TypeId) -> Node {
    match compilation.ty(ty) {
        CType::Declared(decl) => Node::Decl(*decl),
        _ => Node::Type(ty),
    }
}

fn type_item<'a>(compilation: &Compilation, ty: TypeId) -> Value<'a> {
    Value::Item(Item::Node(type_node(compilation, ty)))
}

fn decls<'a>(ids: &[DeclId]) -> Value<'a> {
    Value::Items(ids.iter().map(|id| Item::Node(Node::Decl(*id))).collect())
}

fn text(s: &str) -> Value<'_> {
    Value::Text(Cow::Borrowed(s))
}

fn expr(e: &Expr) -> Value<'_> {
    Value::Item(Item::Expression(e))
}

fn opt_expr(e: Option<&Expr>) -> Value<'_> {
    e.map(expr).unwrap_or(Value::Null)
}

fn stmt(s: &Stmt) -> Value<'_> {
    Value::Item(Item::Statement(s))
}

fn stmts(list: &[Stmt]) -> Value<'_> {
    Value::Items(list.iter().map(Item::Statement).collect())
}

impl<'a> Item<'a> {
    pub(crate) fn kind(self, compilation: &Compilation) -> NodeKind {
        match self {
            Item::Snapshot => NodeKind::Snapshot,
            Item::Statement(_) => NodeKind::Statement,
            Item::Expression(_) => NodeKind::Expression,
            Item::Node(Node::Decl(id)) => match &compilation.decl(id).kind {
                DeclKind::Attribute(_) => NodeKind::Attribute,
                DeclKind::Class(_) => NodeKind::Class,
                DeclKind::Enum(_) => NodeKind::Enum,
                DeclKind::EnumItem(_) => NodeKind::EnumItem,
                DeclKind::Field(_) => NodeKind::Field,
                DeclKind::Function(_) => NodeKind::Function,
                DeclKind::Parameter(_) => NodeKind::Parameter,
                DeclKind::Typedef(_) => NodeKind::Typedef,
                DeclKind::Macro(_) => NodeKind::Macro,
                DeclKind::Namespace(_) => NodeKind::Namespace,
            },
            Item::Node(Node::Type(ty)) => match compilation.ty(ty) {
                CType::Primitive(_) => NodeKind::PrimitiveType,
                CType::Pointer(_) => NodeKind::PointerType,
                CType::Array { .. } => NodeKind::ArrayType,
                CType::Function { .. } => NodeKind::FunctionType,
                CType::Qualified { .. } => NodeKind::QualifiedType,
                CType::Declared(_) | CType::Unexposed(_) => NodeKind::UnexposedType,
            },
        }
    }

    /// Value of `field`; `field` is one of `self.kind().fields()`
    pub(crate) fn field(self, snapshot: &'a Snapshot<'_>, field: &str) -> Value<'a> {
        let compilation = snapshot.compilation();
        match self {
            Item::Snapshot => snapshot_field(snapshot, field),
            Item::Node(Node::Decl(id)) => decl_field(compilation, id, field),
            Item::Node(Node::Type(ty)) => type_field(compilation, ty, field),
            Item::Statement(s) => statement_field(compilation, s, field),
            Item::Expression(e) => expression_field(compilation, e, field),
        }
    }
}

fn snapshot_field<'a>(snapshot: &'a Snapshot<'_>, field: &str) -> Value<'a> {
    match field {
        "attributes" => decls(&snapshot.attributes),
        "classes" => decls(&snapshot.classes),
        "enums" => decls(&snapshot.enums),
        "fields" => decls(&snapshot.fields),
        "functions" => decls(&snapshot.functions),
        "typedefs" => decls(&snapshot.typedefs),
        "macros" => decls(&snapshot.macros),
        "namespaces" => decls(&snapshot.namespaces),
        "func_map" => Value::Map(
            snapshot
                .func_map
                .iter()
                .map(|(name, children)| {
                    let items = children.iter().map(|s| Item::Statement(*s)).collect();
                    (name.as_str(), Value::Items(items))
                })
                .collect(),
        ),
        _ => Value::Absent,
    }
}

fn decl_field<'a>(compilation: &'a Compilation, id: DeclId, field: &str) -> Value<'a> {
    let decl = compilation.decl(id);
    match field {
        "name" => return text(decl.name()),
        "parent" => {
            return decl
                .parent
                .map(|p| Value::Item(Item::Node(Node::Decl(p))))
                .unwrap_or(Value::Null);
        }
        "span" => return Value::Span(decl.span),
        _ => {}
    }

    match (&decl.kind, field) {
        (DeclKind::Attribute(a), "kind") => text(a.kind.as_str()),
        (DeclKind::Attribute(a), "arguments") => a.arguments.as_deref().map(text).unwrap_or(Value::Null),

        (DeclKind::Class(c), "class_kind") => text(c.class_kind.as_str()),
        (DeclKind::Class(c), "is_definition") => Value::Bool(c.is_definition),
        (DeclKind::Class(c), "size_of") => Value::Unsigned(c.size_of),
        (DeclKind::Class(c), "align_of") => Value::Unsigned(c.align_of),
        (DeclKind::Class(_), "type_kind") => text("struct_or_class"),
        (DeclKind::Class(c), "fields") => decls(&c.fields),
        (DeclKind::Class(c), "classes") => decls(&c.classes),
        (DeclKind::Class(c), "attributes") => decls(&c.attributes),

        (DeclKind::Enum(e), "is_definition") => Value::Bool(e.is_definition),
        (DeclKind::Enum(_), "size_of") => Value::Unsigned(compilation.decl_size_of(id)),
        (DeclKind::Enum(_), "type_kind") => text("enum"),
        (DeclKind::Enum(e), "integer_type") => type_item(compilation, e.integer_type),
        (DeclKind::Enum(e), "items") => decls(&e.items),
        (DeclKind::Enum(e), "attributes") => decls(&e.attributes),

        (DeclKind::EnumItem(i), "value") => Value::Int(i.value),

        (DeclKind::Field(f), "type") => type_item(compilation, f.ty),
        (DeclKind::Field(f), "bit_field_width") => {
            f.bit_field_width.map(|w| Value::Unsigned(u64::from(w))).unwrap_or(Value::Null)
        }
        (DeclKind::Field(f), "storage_qualifier") => text(f.storage.as_str()),
        (DeclKind::Field(f), "init_value") => opt_expr(f.init_value.as_ref()),
        (DeclKind::Field(f), "attributes") => decls(&f.attributes),

        (DeclKind::Function(f), "flags") => Value::Names(f.flags.names()),
        (DeclKind::Function(f), "linkage_kind") => text(f.linkage.as_str()),
        (DeclKind::Function(f), "calling_convention") => text(f.calling_convention.as_str()),
        (DeclKind::Function(f), "return_type") => type_item(compilation, f.return_type),
        (DeclKind::Function(f), "parameters") => decls(&f.parameters),
        (DeclKind::Function(f), "storage_qualifier") => text(f.storage.as_str()),
        (DeclKind::Function(f), "attributes") => decls(&f.attributes),

        (DeclKind::Parameter(p), "type") => type_item(compilation, p.ty),

        (DeclKind::Typedef(_), "size_of") => Value::Unsigned(compilation.decl_size_of(id)),
        (DeclKind::Typedef(_), "type_kind") => text("typedef"),
        (DeclKind::Typedef(t), "element_type") => type_item(compilation, t.element_type),
        (DeclKind::Typedef(t), "attributes") => decls(&t.attributes),

        (DeclKind::Macro(m), "parameters") => match &m.parameters {
            Some(params) => Value::Names(params.iter().map(String::as_str).collect()),
            None => Value::Null,
        },
        (DeclKind::Macro(m), "value") => text(&m.value),

        (DeclKind::Namespace(n), "classes") => decls(&n.classes),
        (DeclKind::Namespace(n), "enums") => decls(&n.enums),
        (DeclKind::Namespace(n), "fields") => decls(&n.fields),
        (DeclKind::Namespace(n), "functions") => decls(&n.functions),
        (DeclKind::Namespace(n), "typedefs") => decls(&n.typedefs),
        (DeclKind::Namespace(n), "namespaces") => decls(&n.namespaces),

        _ => Value::Absent,
    }
}

fn type_field<'a>(compilation: &'a Compilation, ty: TypeId, field: &str) -> Value<'a> {
    match field {
        "type_kind" => return text(compilation.type_kind(ty).as_str()),
        "size_of" => return Value::Unsigned(compilation.size_of(ty)),
        _ => {}
    }

    match (compilation.ty(ty), field) {
        (CType::Primitive(kind), "kind") => text(kind.name()),
        (CType::Pointer(element), "element_type") => type_item(compilation, *element),
        (CType::Array { size, .. }, "size") => size.map(Value::Unsigned).unwrap_or(Value::Null),
        (CType::Array { element, .. }, "element_type") => type_item(compilation, *element),
        (CType::Function { return_type, .. }, "return_type") => type_item(compilation, *return_type),
        (CType::Function { parameters, .. }, "parameters") => Value::Items(
            parameters
                .iter()
                .map(|p| Item::Node(type_node(compilation, *p)))
                .collect(),
        ),
        (CType::Function { is_variadic, .. }, "is_variadic") => Value::Bool(*is_variadic),
        (CType::Qualified { qualifiers, .. }, "qualifiers") => Value::Names(qualifiers.names()),
        (CType::Qualified { element, .. }, "element_type") => type_item(compilation, *element),
        (CType::Unexposed(name), "name") => text(name),
        _ => Value::Absent,
    }
}

fn statement_field<'a>(compilation: &Compilation, s: &'a Stmt, field: &str) -> Value<'a> {
    match field {
        "kind" => return text(s.kind_name()),
        "span" => return Value::Span(Span::point(*s.location())),
        _ => {}
    }

    match (s, field) {
        (Stmt::VarDecl { name, .. }, "name") => text(name),
        (Stmt::VarDecl { ty, .. }, "type") => type_item(compilation, *ty),
        (Stmt::VarDecl { is_static, .. }, "is_static") => Value::Bool(*is_static),
        (Stmt::VarDecl { init, .. }, "init") => opt_expr(init.as_ref()),

        (Stmt::Expr { expr: e, .. }, "expr") => expr(e),
        (Stmt::Block { statements, .. }, "body") => stmts(statements),
        (Stmt::Return { expr: value, .. }, "value") => opt_expr(value.as_ref()),

        (Stmt::If { condition, .. }, "condition") => expr(condition),
        (Stmt::If { then_branch, .. }, "then") => stmt(then_branch),
        (Stmt::If { else_branch, .. }, "else") => else_branch.as_deref().map(stmt).unwrap_or(Value::Null),

        (Stmt::While { condition, .. } | Stmt::DoWhile { condition, .. }, "condition") => expr(condition),
        (Stmt::While { body, .. } | Stmt::DoWhile { body, .. }, "body") => stmt(body),

        (Stmt::For { init, .. }, "init") => init.as_deref().map(stmt).unwrap_or(Value::Null),
        (Stmt::For { condition, .. }, "condition") => opt_expr(condition.as_ref()),
        (Stmt::For { increment, .. }, "increment") => opt_expr(increment.as_ref()),
        (Stmt::For { body, .. }, "body") => stmt(body),

        (Stmt::Switch { expr: e, .. }, "expr") => expr(e),
        (Stmt::Switch { cases, .. }, "cases") => stmts(cases),
        (Stmt::Case { value, .. }, "value") => opt_expr(value.as_ref()),
        (Stmt::Case { statements, .. }, "body") => stmts(statements),

        (Stmt::Goto { label, .. }, "label") => text(label),
        (Stmt::Label { name, .. }, "name") => text(name),

        _ => Value::Absent,
    }
}

fn expression_field<'a>(compilation: &Compilation, e: &'a Expr, field: &str) -> Value<'a> {
    match field {
        "kind" => return text(e.kind_name()),
        "span" => return Value::Span(Span::point(*e.location())),
        _ => {}
    }

    match (e, field) {
        (Expr::IntLiteral(v, _), "value") => Value::Unsigned(*v),
        (Expr::FloatLiteral(v, _), "value") => Value::Float(*v),
        (Expr::CharLiteral(v, _), "value") => Value::Int(*v),
        (Expr::StringLiteral(s, _), "value") => text(s),
        (Expr::Ident(name, _), "name") => text(name),

        (Expr::Binary { op, .. }, "op") => text(op.as_str()),
        (Expr::Binary { left, .. } | Expr::Comma { left, .. }, "left") => expr(left),
        (Expr::Binary { right, .. } | Expr::Comma { right, .. }, "right") => expr(right),

        (Expr::Unary { op, .. }, "op") => text(op.as_str()),
        (Expr::Unary { operand, .. }, "operand") => expr(operand),

        (Expr::Assign { op, .. }, "op") => text(op.as_str()),
        (Expr::Assign { target, .. }, "left") => expr(target),
        (Expr::Assign { value, .. }, "right") => expr(value),

        (Expr::Conditional { condition, .. }, "condition") => expr(condition),
        (Expr::Conditional { then_expr, .. }, "then") => expr(then_expr),
        (Expr::Conditional { else_expr, .. }, "else") => expr(else_expr),

        (Expr::Call { callee, .. }, "callee") => expr(callee),
        (Expr::Call { args, .. }, "arguments") => Value::Items(args.iter().map(Item::Expression).collect()),

        (Expr::Index { base, .. } | Expr::Member { base, .. }, "base") => expr(base),
        (Expr::Index { index, .. }, "index") => expr(index),
        (Expr::Member { member, .. }, "name") => text(member),
        (Expr::Member { is_arrow, .. }, "is_arrow") => Value::Bool(*is_arrow),

        (
            Expr::Cast { ty, .. }
            | Expr::SizeofType { ty, .. }
            | Expr::CompoundLiteral { ty, .. }
            | Expr::TypeArg { ty, .. },
            "type",
        ) => type_item(compilation, *ty),
        (Expr::Cast { expr: operand, .. } | Expr::SizeofExpr { expr: operand, .. }, "operand") => expr(operand),

        (Expr::InitList { items, .. }, "items") => Value::Items(items.iter().map(Item::Expression).collect()),
        (Expr::Designated { designator, .. }, "name") => text(designator),
        (Expr::Designated { value, .. }, "value") => expr(value),
        (Expr::CompoundLiteral { init, .. }, "value") => expr(init),

        _ => Value::Absent,
    }
}
