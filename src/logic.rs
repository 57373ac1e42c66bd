//! A minimal state/path formula language.
//!
//! The builder does not check formulas; it only inspects them to decide
//! which reward structures and labels a later analysis will need (see
//! [`crate::builder::BuildOptions::preserve_formula`]).

use crate::expression::Expression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A state or path formula. Atoms are named labels and raw state
/// predicates; temporal operators cover the usual PCTL/CSL fragment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formula {
    True,
    /// A named state label, resolved against the program's label list.
    Label(String),
    /// A raw Boolean expression over the program variables.
    Expression(Expression),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Next(Box<Formula>),
    Until(Box<Formula>, Box<Formula>),
    Eventually(Box<Formula>),
    Globally(Box<Formula>),
    /// A probability operator wrapping a path formula.
    Probability(Box<Formula>),
    /// A reward operator, optionally naming the reward structure it
    /// refers to (`None` selects the program's single/default structure).
    Reward {
        reward_model: Option<String>,
        formula: Box<Formula>,
    },
}

impl Formula {
    /// Names of all reward structures referenced by reward operators.
    pub fn referenced_reward_models(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.visit(&mut |formula| {
            if let Formula::Reward {
                reward_model: Some(name),
                ..
            } = formula
            {
                names.insert(name.clone());
            }
        });
        names
    }

    /// Names of all label atoms.
    pub fn atomic_labels(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.visit(&mut |formula| {
            if let Formula::Label(name) = formula {
                names.insert(name.clone());
            }
        });
        names
    }

    /// All raw predicate atoms, in syntactic order.
    pub fn atomic_expressions(&self) -> Vec<Expression> {
        let mut expressions = Vec::new();
        self.visit(&mut |formula| {
            if let Formula::Expression(expression) = formula {
                expressions.push(expression.clone());
            }
        });
        expressions
    }

    fn visit(&self, f: &mut impl FnMut(&Formula)) {
        f(self);
        match self {
            Formula::True | Formula::Label(_) | Formula::Expression(_) => {}
            Formula::Not(inner)
            | Formula::Next(inner)
            | Formula::Eventually(inner)
            | Formula::Globally(inner)
            | Formula::Probability(inner) => inner.visit(f),
            Formula::And(left, right) | Formula::Or(left, right) | Formula::Until(left, right) => {
                left.visit(f);
                right.visit(f);
            }
            Formula::Reward { formula, .. } => formula.visit(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::Expression;
    use crate::logic::Formula;

    #[test]
    fn collectors_walk_the_whole_tree() {
        let formula = Formula::And(
            Box::new(Formula::Probability(Box::new(Formula::Until(
                Box::new(Formula::Label("safe".to_string())),
                Box::new(Formula::Expression(Expression::mk_var("done"))),
            )))),
            Box::new(Formula::Reward {
                reward_model: Some("energy".to_string()),
                formula: Box::new(Formula::Eventually(Box::new(Formula::Label(
                    "goal".to_string(),
                )))),
            }),
        );

        assert_eq!(
            formula.referenced_reward_models().into_iter().collect::<Vec<_>>(),
            vec!["energy".to_string()]
        );
        assert_eq!(
            formula.atomic_labels().into_iter().collect::<Vec<_>>(),
            vec!["goal".to_string(), "safe".to_string()]
        );
        assert_eq!(
            formula.atomic_expressions(),
            vec![Expression::mk_var("done")]
        );
    }
}
