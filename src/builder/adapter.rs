use crate::dd::{Add, DdManager, MetaVariableId};
use crate::expression::{BinaryOp, Expression, ExpressionError, Literal, UnaryOp};
use std::collections::HashMap;

/// Translates scalar expressions over program variables into arithmetic
/// decision diagrams.
///
/// The adapter is indexed by a variable→meta-variable map; the builder
/// keeps a row-indexed and a column-indexed instance so that source- and
/// target-state predicates can be translated against the respective
/// encodings. Boolean expressions translate into 0/1 diagrams.
#[derive(Clone)]
pub struct AddExpressionAdapter {
    manager: DdManager,
    variable_map: HashMap<String, MetaVariableId>,
}

impl AddExpressionAdapter {
    pub fn new(manager: DdManager, variable_map: HashMap<String, MetaVariableId>) -> Self {
        AddExpressionAdapter {
            manager,
            variable_map,
        }
    }

    /// Translate `expression` into an ADD whose value at every assignment
    /// equals the expression's value there.
    pub fn translate(&self, expression: &Expression) -> Result<Add, ExpressionError> {
        match expression {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Bool(true) => self.manager.one(),
                Literal::Bool(false) => self.manager.zero(),
                other => self.manager.constant(other.as_rational()),
            }),
            Expression::Variable(name) => {
                let variable = self.variable_map.get(name).ok_or_else(|| {
                    ExpressionError::UnknownVariable { name: name.clone() }
                })?;
                Ok(self.manager.value_add(*variable))
            }
            Expression::Unary(op, child) => {
                let child = self.translate(child)?;
                Ok(match op {
                    UnaryOp::Not => self.manager.one().minus(&child),
                    UnaryOp::Negate => self.manager.zero().minus(&child),
                    UnaryOp::Floor => child.floor(),
                    UnaryOp::Ceil => child.ceil(),
                })
            }
            Expression::Binary(op, left, right) => {
                let left = self.translate(left)?;
                let right = self.translate(right)?;
                Ok(self.translate_binary(*op, &left, &right))
            }
            Expression::Ite(condition, then, other) => {
                let condition = self.translate(condition)?;
                let then = self.translate(then)?;
                let other = self.translate(other)?;
                Ok(condition.ite(&then, &other))
            }
        }
    }

    fn translate_binary(&self, op: BinaryOp, left: &Add, right: &Add) -> Add {
        match op {
            BinaryOp::And => left.times(right),
            BinaryOp::Or => left.max(right),
            BinaryOp::Implies => self.manager.one().minus(left).max(right),
            BinaryOp::Iff => left.equals(right),
            BinaryOp::Plus => left.plus(right),
            BinaryOp::Minus => left.minus(right),
            BinaryOp::Times => left.times(right),
            BinaryOp::Divide => left.divide(right),
            BinaryOp::Min => left.min(right),
            BinaryOp::Max => left.max(right),
            BinaryOp::Pow => left.pow(right),
            BinaryOp::Mod => left.modulo(right),
            BinaryOp::Eq => left.equals(right),
            BinaryOp::Ne => self.manager.one().minus(&left.equals(right)),
            BinaryOp::Lt => left.less(right),
            BinaryOp::Le => left.less_eq(right),
            BinaryOp::Gt => right.less(left),
            BinaryOp::Ge => right.less_eq(left),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::AddExpressionAdapter;
    use crate::dd::DdManager;
    use crate::expression::Expression;
    use num_rational::Rational64;
    use std::collections::HashMap;

    #[test]
    fn translates_guards_into_indicator_diagrams() {
        let manager = DdManager::new();
        let (x, _) = manager.new_integer_pair("x", 0, 3);
        let adapter = AddExpressionAdapter::new(
            manager.clone(),
            HashMap::from([("x".to_string(), x)]),
        );

        // x <= 1 holds for the encodings of 0 and 1.
        let guard = Expression::mk_le(Expression::mk_var("x"), Expression::mk_int(1));
        let guard_dd = adapter.translate(&guard).unwrap();
        assert_eq!(guard_dd.not_zero().sat_count(&[x]), 2);

        // !(x <= 1) restricted to the range holds for 2 and 3.
        let negated = adapter.translate(&Expression::mk_not(guard)).unwrap();
        let in_range = negated.times(&manager.range_bdd(x).to_add());
        assert_eq!(in_range.not_zero().sat_count(&[x]), 2);
    }

    #[test]
    fn translates_arithmetic_over_variables() {
        let manager = DdManager::new();
        let (x, _) = manager.new_integer_pair("x", 0, 3);
        let adapter = AddExpressionAdapter::new(
            manager.clone(),
            HashMap::from([("x".to_string(), x)]),
        );

        // (x + 1) / 2 at x = 3 is 2.
        let expression = Expression::mk_binary(
            crate::expression::BinaryOp::Divide,
            Expression::mk_plus(Expression::mk_var("x"), Expression::mk_int(1)),
            Expression::mk_int(2),
        );
        let dd = adapter.translate(&expression).unwrap();
        let at_three = dd.times(&manager.encoding_bdd(x, 3).to_add());
        assert_eq!(at_three.max_value(), Rational64::from_integer(2));
    }

    #[test]
    fn unknown_variables_are_rejected() {
        let manager = DdManager::new();
        let adapter = AddExpressionAdapter::new(manager, HashMap::new());
        assert!(adapter.translate(&Expression::mk_var("y")).is_err());
    }
}
