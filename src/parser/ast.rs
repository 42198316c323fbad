// Statement and expression trees for function bodies and initialisers

use crate::compilation::TypeId;

/// Index into [`crate::compilation::Compilation`]'s file table
pub type FileId = u32;

/// Source location information for diagnostics and spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    pub file: FileId,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: FileId, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

/// Assignment operators; `Assign` is plain `=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinOp),
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Compound(BinOp::Add) => "+=",
            AssignOp::Compound(BinOp::Sub) => "-=",
            AssignOp::Compound(BinOp::Mul) => "*=",
            AssignOp::Compound(BinOp::Div) => "/=",
            AssignOp::Compound(BinOp::Mod) => "%=",
            AssignOp::Compound(BinOp::Shl) => "<<=",
            AssignOp::Compound(BinOp::Shr) => ">>=",
            AssignOp::Compound(BinOp::BitAnd) => "&=",
            AssignOp::Compound(BinOp::BitOr) => "|=",
            AssignOp::Compound(BinOp::BitXor) => "^=",
            AssignOp::Compound(_) => "?=",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Plus,    // +x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
    Deref,   // *x
    AddrOf,  // &x
}

impl UnOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Plus => "+",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::PreInc => "++",
            UnOp::PreDec => "--",
            UnOp::PostInc => "post++",
            UnOp::PostDec => "post--",
            UnOp::Deref => "*",
            UnOp::AddrOf => "&",
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral(u64, SourceLocation),
    FloatLiteral(f64, SourceLocation),
    CharLiteral(i64, SourceLocation),
    StringLiteral(String, SourceLocation),
    Ident(String, SourceLocation),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        location: SourceLocation,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        location: SourceLocation,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        location: SourceLocation,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        location: SourceLocation,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        location: SourceLocation,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        location: SourceLocation,
    },
    Member {
        base: Box<Expr>,
        member: String,
        is_arrow: bool,
        location: SourceLocation,
    },
    Cast {
        ty: TypeId,
        expr: Box<Expr>,
        location: SourceLocation,
    },
    SizeofType {
        ty: TypeId,
        location: SourceLocation,
    },
    SizeofExpr {
        expr: Box<Expr>,
        location: SourceLocation,
    },
    Comma {
        left: Box<Expr>,
        right: Box<Expr>,
        location: SourceLocation,
    },
    /// `{ a, b, .x = c }`
    InitList {
        items: Vec<Expr>,
        location: SourceLocation,
    },
    /// `.field = value` or `[index] = value` inside an initialiser list
    Designated {
        designator: String,
        value: Box<Expr>,
        location: SourceLocation,
    },
    /// `(type){ ... }`
    CompoundLiteral {
        ty: TypeId,
        init: Box<Expr>,
        location: SourceLocation,
    },
    /// A type name in argument position, e.g. `__builtin_va_arg(ap, int)`
    TypeArg {
        ty: TypeId,
        location: SourceLocation,
    },
}

impl Expr {
    /// Get the source location of this node
    pub fn location(&self) -> &SourceLocation {
        match self {
            Expr::IntLiteral(_, loc)
            | Expr::FloatLiteral(_, loc)
            | Expr::CharLiteral(_, loc)
            | Expr::StringLiteral(_, loc)
            | Expr::Ident(_, loc) => loc,
            Expr::Binary { location, .. }
            | Expr::Unary { location, .. }
            | Expr::Assign { location, .. }
            | Expr::Conditional { location, .. }
            | Expr::Call { location, .. }
            | Expr::Index { location, .. }
            | Expr::Member { location, .. }
            | Expr::Cast { location, .. }
            | Expr::SizeofType { location, .. }
            | Expr::SizeofExpr { location, .. }
            | Expr::Comma { location, .. }
            | Expr::InitList { location, .. }
            | Expr::Designated { location, .. }
            | Expr::CompoundLiteral { location, .. }
            | Expr::TypeArg { location, .. } => location,
        }
    }

    /// Short tag used as the `kind` field when serialized
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::IntLiteral(..) => "int_literal",
            Expr::FloatLiteral(..) => "float_literal",
            Expr::CharLiteral(..) => "char_literal",
            Expr::StringLiteral(..) => "string_literal",
            Expr::Ident(..) => "identifier",
            Expr::Binary { .. } => "binary",
            Expr::Unary { .. } => "unary",
            Expr::Assign { .. } => "assign",
            Expr::Conditional { .. } => "conditional",
            Expr::Call { .. } => "call",
            Expr::Index { .. } => "index",
            Expr::Member { .. } => "member",
            Expr::Cast { .. } => "cast",
            Expr::SizeofType { .. } => "sizeof_type",
            Expr::SizeofExpr { .. } => "sizeof_expr",
            Expr::Comma { .. } => "comma",
            Expr::InitList { .. } => "init_list",
            Expr::Designated { .. } => "designated",
            Expr::CompoundLiteral { .. } => "compound_literal",
            Expr::TypeArg { .. } => "type_name",
        }
    }
}

/// Statements inside a function body
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Block-scope variable; one per declarator
    VarDecl {
        name: String,
        ty: TypeId,
        is_static: bool,
        init: Option<Expr>,
        location: SourceLocation,
    },
    Expr {
        expr: Expr,
        location: SourceLocation,
    },
    Block {
        statements: Vec<Stmt>,
        location: SourceLocation,
    },
    Return {
        expr: Option<Expr>,
        location: SourceLocation,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        location: SourceLocation,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        location: SourceLocation,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        location: SourceLocation,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
        location: SourceLocation,
    },
    Switch {
        expr: Expr,
        cases: Vec<Stmt>,
        location: SourceLocation,
    },
    /// `case value:` group, or `default:` when `value` is `None`
    Case {
        value: Option<Expr>,
        statements: Vec<Stmt>,
        location: SourceLocation,
    },
    Break {
        location: SourceLocation,
    },
    Continue {
        location: SourceLocation,
    },
    Goto {
        label: String,
        location: SourceLocation,
    },
    Label {
        name: String,
        location: SourceLocation,
    },
    Empty {
        location: SourceLocation,
    },
}

impl Stmt {
    /// Get the source location of this node
    pub fn location(&self) -> &SourceLocation {
        match self {
            Stmt::VarDecl { location, .. }
            | Stmt::Expr { location, .. }
            | Stmt::Block { location, .. }
            | Stmt::Return { location, .. }
            | Stmt::If { location, .. }
            | Stmt::While { location, .. }
            | Stmt::DoWhile { location, .. }
            | Stmt::For { location, .. }
            | Stmt::Switch { location, .. }
            | Stmt::Case { location, .. }
            | Stmt::Break { location }
            | Stmt::Continue { location }
            | Stmt::Goto { location, .. }
            | Stmt::Label { location, .. }
            | Stmt::Empty { location } => location,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::VarDecl { .. } => "var_decl",
            Stmt::Expr { .. } => "expression",
            Stmt::Block { .. } => "block",
            Stmt::Return { .. } => "return",
            Stmt::If { .. } => "if",
            Stmt::While { .. } => "while",
            Stmt::DoWhile { .. } => "do_while",
            Stmt::For { .. } => "for",
            Stmt::Switch { .. } => "switch",
            Stmt::Case { value: Some(_), .. } => "case",
            Stmt::Case { value: None, .. } => "default",
            Stmt::Break { .. } => "break",
            Stmt::Continue { .. } => "continue",
            Stmt::Goto { .. } => "goto",
            Stmt::Label { .. } => "label",
            Stmt::Empty { .. } => "empty",
        }
    }
}
