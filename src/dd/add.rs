use crate::dd::Bdd;
use crate::dd::manager::{ApplyOp, DdManager, MetaVariableId, NodeId, UnaryApplyOp};
use num_rational::Rational64;
use std::collections::HashMap;
use std::fmt;

/// An arithmetic decision diagram: a function from meta-variable
/// assignments to rational values, represented as a reduced ordered
/// diagram inside a [DdManager] arena.
///
/// Handles are cheap to clone; all operators are pure and return fresh
/// handles. Operands must come from the same manager.
#[derive(Clone)]
pub struct Add {
    manager: DdManager,
    pub(crate) root: NodeId,
}

impl Add {
    pub(crate) fn new(manager: DdManager, root: NodeId) -> Self {
        Add { manager, root }
    }

    pub fn manager(&self) -> &DdManager {
        &self.manager
    }

    fn binary(&self, other: &Add, op: ApplyOp) -> Add {
        assert!(
            self.manager.same_manager(&other.manager),
            "cannot combine diagrams from different managers"
        );
        let root = self.manager.inner.borrow_mut().apply(op, self.root, other.root);
        Add::new(self.manager.clone(), root)
    }

    pub fn plus(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Plus)
    }

    pub fn minus(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Minus)
    }

    pub fn times(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Times)
    }

    /// Pointwise division, total with `x / 0 = 0`.
    pub fn divide(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Divide)
    }

    pub fn min(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Min)
    }

    pub fn max(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Max)
    }

    /// Pointwise equality as a 0/1 diagram.
    pub fn equals(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Equals)
    }

    /// Pointwise `<` as a 0/1 diagram.
    pub fn less(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Less)
    }

    /// Pointwise `<=` as a 0/1 diagram.
    pub fn less_eq(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::LessEq)
    }

    /// Pointwise exponentiation; exponent values must be integers.
    pub fn pow(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Pow)
    }

    /// Pointwise Euclidean remainder; operand values must be integers.
    pub fn modulo(&self, other: &Add) -> Add {
        self.binary(other, ApplyOp::Mod)
    }

    pub fn floor(&self) -> Add {
        let root = self
            .manager
            .inner
            .borrow_mut()
            .apply_unary(UnaryApplyOp::Floor, self.root);
        Add::new(self.manager.clone(), root)
    }

    pub fn ceil(&self) -> Add {
        let root = self
            .manager
            .inner
            .borrow_mut()
            .apply_unary(UnaryApplyOp::Ceil, self.root);
        Add::new(self.manager.clone(), root)
    }

    /// If-then-else: `self` must be a 0/1 diagram selecting between
    /// `then` and `other`.
    pub fn ite(&self, then: &Add, other: &Add) -> Add {
        assert!(
            self.manager.same_manager(&then.manager)
                && self.manager.same_manager(&other.manager),
            "cannot combine diagrams from different managers"
        );
        let root = self
            .manager
            .inner
            .borrow_mut()
            .ite(self.root, then.root, other.root);
        Add::new(self.manager.clone(), root)
    }

    /// Sum out all encoding bits of the given meta-variables.
    pub fn sum_abstract(&self, variables: &[MetaVariableId]) -> Add {
        let levels = self.manager.levels_of(variables);
        let mut memo = HashMap::new();
        let root = self
            .manager
            .inner
            .borrow_mut()
            .sum_abstract(self.root, &levels, 0, &mut memo);
        Add::new(self.manager.clone(), root)
    }

    /// The 0/1 diagram of assignments with a non-zero value.
    pub fn not_zero(&self) -> Bdd {
        let root = self
            .manager
            .inner
            .borrow_mut()
            .apply_unary(UnaryApplyOp::NotZero, self.root);
        Bdd::new(self.manager.clone(), root)
    }

    /// Alias of [Add::not_zero], matching the usual ADD→BDD conversion.
    pub fn to_bdd(&self) -> Bdd {
        self.not_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.root == self.manager.inner.borrow().zero
    }

    pub fn is_one(&self) -> bool {
        self.root == self.manager.inner.borrow().one
    }

    /// The largest terminal value reachable in the diagram.
    pub fn max_value(&self) -> Rational64 {
        self.manager.inner.borrow().extreme_value(self.root, true)
    }

    /// The smallest terminal value reachable in the diagram.
    pub fn min_value(&self) -> Rational64 {
        self.manager.inner.borrow().extreme_value(self.root, false)
    }
}

impl PartialEq for Add {
    fn eq(&self, other: &Self) -> bool {
        self.manager.same_manager(&other.manager) && self.root == other.root
    }
}

impl Eq for Add {}

impl fmt::Debug for Add {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Add").field("root", &self.root).finish()
    }
}
