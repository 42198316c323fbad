//! Integer constant expressions
//!
//! Used for enumerator values, array sizes, bit-field widths and `#if`
//! conditions. Arithmetic is done in wrapping 64-bit signed integers;
//! anything that is not an integer constant (division by zero, a call, an
//! unknown identifier) evaluates to `None`.

use crate::compilation::{CType, Compilation, DeclKind, PrimitiveKind, TypeId};
use crate::parser::ast::{BinOp, Expr, UnOp};

/// Evaluate `expr`; `lookup` resolves enumeration constants by name
pub(crate) fn evaluate(expr: &Expr, compilation: &Compilation, lookup: &dyn Fn(&str) -> Option<i64>) -> Option<i64> {
    let eval = |e: &Expr| evaluate(e, compilation, lookup);

    match expr {
        Expr::IntLiteral(value, _) => Some(*value as i64),
        Expr::CharLiteral(value, _) => Some(*value),
        Expr::Ident(name, _) => lookup(name),
        Expr::Unary { op, operand, .. } => {
            let value = eval(operand)?;
            match op {
                UnOp::Neg => Some(value.wrapping_neg()),
                UnOp::Plus => Some(value),
                UnOp::Not => Some((value == 0) as i64),
                UnOp::BitNot => Some(!value),
                _ => None,
            }
        }
        Expr::Binary { op, left, right, .. } => {
            let lhs = eval(left)?;
            // && and || do not evaluate the right side when the left decides
            match op {
                BinOp::And if lhs == 0 => return Some(0),
                BinOp::Or if lhs != 0 => return Some(1),
                _ => {}
            }
            let rhs = eval(right)?;
            binary(*op, lhs, rhs)
        }
        Expr::Conditional {
            condition,
            then_expr,
            else_expr,
            ..
        } => {
            if eval(condition)? != 0 {
                eval(then_expr)
            } else {
                eval(else_expr)
            }
        }
        Expr::Cast { ty, expr, .. } => {
            let value = match expr.as_ref() {
                Expr::FloatLiteral(f, _) => *f as i64,
                other => eval(other)?,
            };
            Some(convert(compilation, *ty, value))
        }
        Expr::SizeofType { ty, .. } => match compilation.size_of(*ty) {
            0 => None,
            size => Some(size as i64),
        },
        Expr::SizeofExpr { expr, .. } => match expr.as_ref() {
            Expr::StringLiteral(s, _) => Some(s.len() as i64 + 1),
            _ => None,
        },
        Expr::Comma { right, .. } => eval(right),
        _ => None,
    }
}

fn binary(op: BinOp, lhs: i64, rhs: i64) -> Option<i64> {
    let value = match op {
        BinOp::Add => lhs.wrapping_add(rhs),
        BinOp::Sub => lhs.wrapping_sub(rhs),
        BinOp::Mul => lhs.wrapping_mul(rhs),
        BinOp::Div => lhs.checked_div(rhs)?,
        BinOp::Mod => lhs.checked_rem(rhs)?,
        BinOp::Shl => lhs.checked_shl(u32::try_from(rhs).ok()?)?,
        BinOp::Shr => lhs.checked_shr(u32::try_from(rhs).ok()?)?,
        BinOp::BitAnd => lhs & rhs,
        BinOp::BitOr => lhs | rhs,
        BinOp::BitXor => lhs ^ rhs,
        BinOp::Eq => (lhs == rhs) as i64,
        BinOp::Ne => (lhs != rhs) as i64,
        BinOp::Lt => (lhs < rhs) as i64,
        BinOp::Le => (lhs <= rhs) as i64,
        BinOp::Gt => (lhs > rhs) as i64,
        BinOp::Ge => (lhs >= rhs) as i64,
        BinOp::And => (lhs != 0 && rhs != 0) as i64,
        BinOp::Or => (lhs != 0 || rhs != 0) as i64,
    };
    Some(value)
}

/// Primitive behind typedefs, enums and qualifiers
fn underlying_primitive(compilation: &Compilation, ty: TypeId) -> Option<PrimitiveKind> {
    match compilation.ty(ty) {
        CType::Primitive(kind) => Some(*kind),
        CType::Qualified { element, .. } => underlying_primitive(compilation, *element),
        CType::Declared(decl) => match &compilation.decl(*decl).kind {
            DeclKind::Typedef(t) => underlying_primitive(compilation, t.element_type),
            DeclKind::Enum(e) => underlying_primitive(compilation, e.integer_type),
            _ => None,
        },
        _ => None,
    }
}

/// Truncate or sign-extend `value` to the width of `ty`
fn convert(compilation: &Compilation, ty: TypeId, value: i64) -> i64 {
    let Some(kind) = underlying_primitive(compilation, ty) else {
        return value;
    };
    if kind == PrimitiveKind::Bool {
        return (value != 0) as i64;
    }
    let bits = compilation.size_of(ty) * 8;
    if bits == 0 || bits >= 64 {
        return value;
    }
    let signed = matches!(
        kind,
        PrimitiveKind::Char
            | PrimitiveKind::SignedChar
            | PrimitiveKind::Short
            | PrimitiveKind::Int
            | PrimitiveKind::Long
            | PrimitiveKind::LongLong
    );
    let shift = 64 - bits as u32;
    if signed {
        (value << shift) >> shift
    } else {
        ((value as u64) << shift >> shift) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::SourceLocation;

    fn int(v: u64) -> Box<Expr> {
        Box::new(Expr::IntLiteral(v, SourceLocation::default()))
    }

    fn bin(op: BinOp, left: Box<Expr>, right: Box<Expr>) -> Box<Expr> {
        Box::new(Expr::Binary {
            op,
            left,
            right,
            location: SourceLocation::default(),
        })
    }

    fn eval(expr: &Expr) -> Option<i64> {
        let c = Compilation::default();
        evaluate(expr, &c, &|name: &str| (name == "TEN").then_some(10))
    }

    #[test]
    fn test_arithmetic() {
        let e = bin(BinOp::Sub, bin(BinOp::Mul, int(6), int(7)), int(2));
        assert_eq!(eval(&e), Some(40));
        let e = bin(BinOp::Shl, int(1), int(10));
        assert_eq!(eval(&e), Some(1024));
    }

    #[test]
    fn test_division_by_zero_is_not_constant() {
        assert_eq!(eval(&bin(BinOp::Div, int(1), int(0))), None);
        assert_eq!(eval(&bin(BinOp::Mod, int(1), int(0))), None);
    }

    #[test]
    fn test_short_circuit_skips_unknown_operand() {
        let unknown = Box::new(Expr::Ident("missing".to_string(), SourceLocation::default()));
        assert_eq!(eval(&bin(BinOp::And, int(0), unknown.clone())), Some(0));
        assert_eq!(eval(&bin(BinOp::Or, int(2), unknown.clone())), Some(1));
        assert_eq!(eval(&bin(BinOp::Or, int(0), unknown)), None);
    }

    #[test]
    fn test_lookup_and_conditional() {
        let e = Expr::Conditional {
            condition: bin(BinOp::Gt, Box::new(Expr::Ident("TEN".to_string(), SourceLocation::default())), int(5)),
            then_expr: int(1),
            else_expr: int(2),
            location: SourceLocation::default(),
        };
        assert_eq!(eval(&e), Some(1));
    }

    #[test]
    fn test_cast_truncates() {
        let mut c = Compilation::default();
        let uchar = c.types_mut().primitive(PrimitiveKind::UnsignedChar);
        let schar = c.types_mut().primitive(PrimitiveKind::SignedChar);
        let cast = |ty| Expr::Cast {
            ty,
            expr: int(300),
            location: SourceLocation::default(),
        };
        let none = |_: &str| -> Option<i64> { None };
        assert_eq!(evaluate(&cast(uchar), &c, &none), Some(44));
        let cast = Expr::Cast {
            ty: schar,
            expr: int(200),
            location: SourceLocation::default(),
        };
        assert_eq!(evaluate(&cast, &c, &none), Some(-56));
    }
}
