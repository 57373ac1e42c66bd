use crate::expression::{Expression, ExpressionError};
use serde::{Deserialize, Serialize};

/// A Boolean program variable. Boolean variables range over `{false, true}`
/// and need no declared bounds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BooleanVariable {
    pub name: String,
}

impl BooleanVariable {
    pub fn new(name: &str) -> Self {
        BooleanVariable {
            name: name.to_string(),
        }
    }
}

/// A bounded integer program variable with inclusive `[lower, upper]`
/// bounds. Bounds are expressions, but they must be closed once constants
/// are substituted; [IntegerVariable::bounds] evaluates them statically.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntegerVariable {
    pub name: String,
    pub lower_bound: Expression,
    pub upper_bound: Expression,
}

impl IntegerVariable {
    pub fn new(name: &str, lower_bound: Expression, upper_bound: Expression) -> Self {
        IntegerVariable {
            name: name.to_string(),
            lower_bound,
            upper_bound,
        }
    }

    /// Convenience constructor for constant bounds.
    pub fn with_range(name: &str, lower: i64, upper: i64) -> Self {
        Self::new(name, Expression::mk_int(lower), Expression::mk_int(upper))
    }

    /// Statically evaluate the inclusive bounds.
    pub fn bounds(&self) -> Result<(i64, i64), ExpressionError> {
        Ok((
            self.lower_bound.eval_const_int()?,
            self.upper_bound.eval_const_int()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::Expression;
    use crate::program::IntegerVariable;

    #[test]
    fn bounds_evaluate_after_substitution() {
        let variable = IntegerVariable::new(
            "x",
            Expression::mk_int(0),
            Expression::mk_minus(Expression::mk_int(8), Expression::mk_int(1)),
        );
        assert_eq!(variable.bounds().unwrap(), (0, 7));
    }

    #[test]
    fn unresolved_bounds_are_rejected() {
        let variable = IntegerVariable::new("x", Expression::mk_int(0), Expression::mk_var("N"));
        assert!(variable.bounds().is_err());
    }
}
