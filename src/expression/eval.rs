use crate::expression::{BinaryOp, Expression, Literal, UnaryOp};
use num_rational::Rational64;
use num_traits::{Signed, Zero};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised while evaluating or translating expressions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression references a name with no known meta-variable.
    #[error("expression references unknown variable `{name}`")]
    UnknownVariable { name: String },
    /// Static evaluation hit a variable reference.
    #[error("expression is not constant; it still references `{name}`")]
    NotConstant { name: String },
    /// An operator was applied to a value of the wrong type.
    #[error("operator `{op}` cannot be applied to `{operand}`")]
    TypeError { op: String, operand: String },
    #[error("division by zero during constant evaluation")]
    DivisionByZero,
}

impl Expression {
    /// Replace every [Expression::Variable] whose name occurs in `map` by the
    /// mapped expression. Used for constant substitution; the replacement is
    /// repeated by the caller until a fixpoint when constants reference
    /// other constants.
    #[must_use]
    pub fn substitute(&self, map: &HashMap<String, Expression>) -> Expression {
        match self {
            Expression::Literal(_) => self.clone(),
            Expression::Variable(name) => match map.get(name) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            Expression::Unary(op, child) => Expression::mk_unary(*op, child.substitute(map)),
            Expression::Binary(op, left, right) => {
                Expression::mk_binary(*op, left.substitute(map), right.substitute(map))
            }
            Expression::Ite(condition, then, other) => Expression::mk_ite(
                condition.substitute(map),
                then.substitute(map),
                other.substitute(map),
            ),
        }
    }

    /// Collect the names of all referenced variables.
    pub fn support(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_support(&mut names);
        names
    }

    fn collect_support(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Variable(name) => {
                names.insert(name.clone());
            }
            Expression::Unary(_, child) => child.collect_support(names),
            Expression::Binary(_, left, right) => {
                left.collect_support(names);
                right.collect_support(names);
            }
            Expression::Ite(condition, then, other) => {
                condition.collect_support(names);
                then.collect_support(names);
                other.collect_support(names);
            }
        }
    }

    /// Statically evaluate a closed expression to a [Literal].
    pub fn eval_const(&self) -> Result<Literal, ExpressionError> {
        match self {
            Expression::Literal(literal) => Ok(*literal),
            Expression::Variable(name) => Err(ExpressionError::NotConstant { name: name.clone() }),
            Expression::Unary(op, child) => eval_unary(*op, child.eval_const()?),
            Expression::Binary(op, left, right) => {
                eval_binary(*op, left.eval_const()?, right.eval_const()?)
            }
            Expression::Ite(condition, then, other) => {
                if expect_bool(condition.eval_const()?, "?:")? {
                    then.eval_const()
                } else {
                    other.eval_const()
                }
            }
        }
    }

    /// Statically evaluate to an integer; rejects fractional results.
    pub fn eval_const_int(&self) -> Result<i64, ExpressionError> {
        match self.eval_const()? {
            Literal::Bool(_) => Err(ExpressionError::TypeError {
                op: "integer bound".to_string(),
                operand: self.to_string(),
            }),
            Literal::Int(value) => Ok(value),
            Literal::Rational(value) if value.is_integer() => Ok(value.to_integer()),
            Literal::Rational(_) => Err(ExpressionError::TypeError {
                op: "integer bound".to_string(),
                operand: self.to_string(),
            }),
        }
    }
}

fn expect_bool(literal: Literal, op: &str) -> Result<bool, ExpressionError> {
    match literal {
        Literal::Bool(value) => Ok(value),
        other => Err(ExpressionError::TypeError {
            op: op.to_string(),
            operand: other.to_string(),
        }),
    }
}

fn mk_number(value: Rational64) -> Literal {
    if value.is_integer() {
        Literal::Int(value.to_integer())
    } else {
        Literal::Rational(value)
    }
}

fn eval_unary(op: UnaryOp, child: Literal) -> Result<Literal, ExpressionError> {
    match op {
        UnaryOp::Not => Ok(Literal::Bool(!expect_bool(child, "!")?)),
        UnaryOp::Negate => Ok(mk_number(-child.as_rational())),
        UnaryOp::Floor => Ok(Literal::Int(child.as_rational().floor().to_integer())),
        UnaryOp::Ceil => Ok(Literal::Int(child.as_rational().ceil().to_integer())),
    }
}

fn eval_binary(op: BinaryOp, left: Literal, right: Literal) -> Result<Literal, ExpressionError> {
    let result = match op {
        BinaryOp::And => Literal::Bool(expect_bool(left, "&")? && expect_bool(right, "&")?),
        BinaryOp::Or => Literal::Bool(expect_bool(left, "|")? || expect_bool(right, "|")?),
        BinaryOp::Implies => Literal::Bool(!expect_bool(left, "=>")? || expect_bool(right, "=>")?),
        BinaryOp::Iff => Literal::Bool(expect_bool(left, "<=>")? == expect_bool(right, "<=>")?),
        BinaryOp::Plus => mk_number(left.as_rational() + right.as_rational()),
        BinaryOp::Minus => mk_number(left.as_rational() - right.as_rational()),
        BinaryOp::Times => mk_number(left.as_rational() * right.as_rational()),
        BinaryOp::Divide => {
            let divisor = right.as_rational();
            if divisor.is_zero() {
                return Err(ExpressionError::DivisionByZero);
            }
            mk_number(left.as_rational() / divisor)
        }
        BinaryOp::Min => mk_number(left.as_rational().min(right.as_rational())),
        BinaryOp::Max => mk_number(left.as_rational().max(right.as_rational())),
        BinaryOp::Pow => mk_number(rational_pow(left.as_rational(), right)?),
        BinaryOp::Mod => {
            let (Literal::Int(a), Literal::Int(b)) = (left, right) else {
                return Err(ExpressionError::TypeError {
                    op: "mod".to_string(),
                    operand: format!("{left}, {right}"),
                });
            };
            if b == 0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Literal::Int(a.rem_euclid(b))
        }
        BinaryOp::Eq => Literal::Bool(left.as_rational() == right.as_rational()),
        BinaryOp::Ne => Literal::Bool(left.as_rational() != right.as_rational()),
        BinaryOp::Lt => Literal::Bool(left.as_rational() < right.as_rational()),
        BinaryOp::Le => Literal::Bool(left.as_rational() <= right.as_rational()),
        BinaryOp::Gt => Literal::Bool(left.as_rational() > right.as_rational()),
        BinaryOp::Ge => Literal::Bool(left.as_rational() >= right.as_rational()),
    };
    Ok(result)
}

fn rational_pow(base: Rational64, exponent: Literal) -> Result<Rational64, ExpressionError> {
    let exponent = match exponent {
        Literal::Int(value) => value,
        Literal::Rational(value) if value.is_integer() => value.to_integer(),
        other => {
            return Err(ExpressionError::TypeError {
                op: "pow".to_string(),
                operand: other.to_string(),
            });
        }
    };
    if exponent < 0 && base.is_zero() {
        return Err(ExpressionError::DivisionByZero);
    }
    let magnitude = base.abs().pow(exponent.unsigned_abs() as i32);
    let signed = if base.is_negative() && exponent % 2 != 0 {
        -magnitude
    } else {
        magnitude
    };
    if exponent < 0 {
        Ok(signed.recip())
    } else {
        Ok(signed)
    }
}
