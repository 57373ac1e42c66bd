use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value appearing in an expression: a Boolean, an integer, or an
/// exact rational (used for likelihoods and reward values).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Rational(Rational64),
}

impl Literal {
    /// Numeric view of the literal; Booleans count as `0`/`1`.
    pub fn as_rational(&self) -> Rational64 {
        match self {
            Literal::Bool(value) => Rational64::from_integer(i64::from(*value)),
            Literal::Int(value) => Rational64::from_integer(*value),
            Literal::Rational(value) => *value,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Rational(value) => write!(f, "{}/{}", value.numer(), value.denom()),
        }
    }
}

/// Unary operators of the expression language.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    Floor,
    Ceil,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Floor => write!(f, "floor"),
            UnaryOp::Ceil => write!(f, "ceil"),
        }
    }
}

/// Binary operators of the expression language. Boolean connectives operate
/// on Boolean operands, comparisons produce Booleans, the rest are numeric.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Implies,
    Iff,
    Plus,
    Minus,
    Times,
    Divide,
    Min,
    Max,
    Pow,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let token = match self {
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Implies => "=>",
            BinaryOp::Iff => "<=>",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Times => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Pow => "pow",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        write!(f, "{token}")
    }
}

impl BinaryOp {
    /// Operators rendered as `op(left, right)` instead of infix.
    pub(crate) fn is_functional(&self) -> bool {
        matches!(
            self,
            BinaryOp::Min | BinaryOp::Max | BinaryOp::Pow | BinaryOp::Mod
        )
    }
}
