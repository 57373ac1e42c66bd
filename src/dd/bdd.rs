use crate::dd::Add;
use crate::dd::manager::{ApplyOp, DdManager, MetaVariableId, NodeId};
use std::collections::HashMap;
use std::fmt;

/// A Boolean decision diagram: a 0/1-valued diagram sharing the arena of
/// its [DdManager] with the arithmetic diagrams.
#[derive(Clone)]
pub struct Bdd {
    manager: DdManager,
    pub(crate) root: NodeId,
}

impl Bdd {
    pub(crate) fn new(manager: DdManager, root: NodeId) -> Self {
        Bdd { manager, root }
    }

    pub fn manager(&self) -> &DdManager {
        &self.manager
    }

    fn binary(&self, other: &Bdd, op: ApplyOp) -> Bdd {
        assert!(
            self.manager.same_manager(&other.manager),
            "cannot combine diagrams from different managers"
        );
        let root = self.manager.inner.borrow_mut().apply(op, self.root, other.root);
        Bdd::new(self.manager.clone(), root)
    }

    pub fn and(&self, other: &Bdd) -> Bdd {
        self.binary(other, ApplyOp::Times)
    }

    pub fn or(&self, other: &Bdd) -> Bdd {
        self.binary(other, ApplyOp::Max)
    }

    pub fn not(&self) -> Bdd {
        let one = self.manager.inner.borrow().one;
        let root = self.manager.inner.borrow_mut().apply(ApplyOp::Minus, one, self.root);
        Bdd::new(self.manager.clone(), root)
    }

    pub fn and_not(&self, other: &Bdd) -> Bdd {
        self.and(&other.not())
    }

    /// Existentially quantify all encoding bits of `variables`.
    pub fn exists_abstract(&self, variables: &[MetaVariableId]) -> Bdd {
        let levels = self.manager.levels_of(variables);
        let mut memo = HashMap::new();
        let root = self
            .manager
            .inner
            .borrow_mut()
            .exists_abstract(self.root, &levels, 0, &mut memo);
        Bdd::new(self.manager.clone(), root)
    }

    /// Conjunction followed by existential quantification.
    pub fn and_exists(&self, other: &Bdd, variables: &[MetaVariableId]) -> Bdd {
        self.and(other).exists_abstract(variables)
    }

    /// Rename the diagram along the given row/column pairs, swapping each
    /// pair's encodings. The diagram must depend on at most one member of
    /// every pair (which holds for abstracted frontiers and state sets);
    /// the level order is then preserved and the renaming is sound.
    pub fn swap_variables(&self, pairs: &[(MetaVariableId, MetaVariableId)]) -> Bdd {
        let mut permutation: HashMap<u32, u32> = HashMap::new();
        {
            let inner = self.manager.inner.borrow();
            for (row, column) in pairs {
                let row_levels = &inner.info(*row).levels;
                let column_levels = &inner.info(*column).levels;
                debug_assert_eq!(row_levels.len(), column_levels.len());
                for (row_level, column_level) in row_levels.iter().zip(column_levels.iter()) {
                    permutation.insert(*row_level, *column_level);
                    permutation.insert(*column_level, *row_level);
                }
            }
        }
        debug_assert!(
            {
                let inner = self.manager.inner.borrow();
                let support: Vec<u32> = inner.support(self.root).into_iter().collect();
                let mapped: Vec<u32> = support
                    .iter()
                    .map(|level| *permutation.get(level).unwrap_or(level))
                    .collect();
                mapped.windows(2).all(|pair| pair[0] < pair[1])
            },
            "swap_variables operand depends on both members of a pair"
        );
        let mut memo = HashMap::new();
        let root = self
            .manager
            .inner
            .borrow_mut()
            .rename_levels(self.root, &permutation, &mut memo);
        Bdd::new(self.manager.clone(), root)
    }

    /// View this 0/1 diagram as an arithmetic diagram.
    pub fn to_add(&self) -> Add {
        Add::new(self.manager.clone(), self.root)
    }

    pub fn is_false(&self) -> bool {
        self.root == self.manager.inner.borrow().zero
    }

    pub fn is_true(&self) -> bool {
        self.root == self.manager.inner.borrow().one
    }

    /// Count satisfying assignments over exactly the encoding bits of
    /// `variables`; the diagram's support must be contained in them.
    pub fn sat_count(&self, variables: &[MetaVariableId]) -> u64 {
        let levels = self.manager.levels_of(variables);
        let mut memo = HashMap::new();
        self.manager
            .inner
            .borrow()
            .sat_count(self.root, &levels, 0, &mut memo)
    }
}

impl PartialEq for Bdd {
    fn eq(&self, other: &Self) -> bool {
        self.manager.same_manager(&other.manager) && self.root == other.root
    }
}

impl Eq for Bdd {}

impl fmt::Debug for Bdd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Bdd").field("root", &self.root).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::dd::DdManager;

    #[test]
    fn boolean_algebra() {
        let manager = DdManager::new();
        let (a, _) = manager.new_boolean_pair("a");
        let (b, _) = manager.new_boolean_pair("b");
        let a1 = manager.encoding_bdd(a, 1);
        let b1 = manager.encoding_bdd(b, 1);

        let both = a1.and(&b1);
        assert_eq!(both.sat_count(&[a, b]), 1);
        let either = a1.or(&b1);
        assert_eq!(either.sat_count(&[a, b]), 3);
        assert_eq!(either.not().sat_count(&[a, b]), 1);
        assert!(a1.and(&a1.not()).is_false());
        assert!(a1.or(&a1.not()).is_true());
    }

    #[test]
    fn range_counts_valid_encodings() {
        let manager = DdManager::new();
        let (x, _) = manager.new_integer_pair("x", 0, 4);
        // Three bits encode eight states, five of which are in range.
        assert_eq!(manager.range_bdd(x).sat_count(&[x]), 5);
    }

    #[test]
    fn encodings_are_disjoint_cubes() {
        let manager = DdManager::new();
        let (x, _) = manager.new_integer_pair("x", 2, 5);
        for value in 2..=5i64 {
            assert_eq!(manager.encoding_bdd(x, value).sat_count(&[x]), 1);
        }
        let two = manager.encoding_bdd(x, 2);
        let three = manager.encoding_bdd(x, 3);
        assert!(two.and(&three).is_false());
    }

    #[test]
    fn exists_abstract_projects_out_variables() {
        let manager = DdManager::new();
        let (x, _) = manager.new_integer_pair("x", 0, 3);
        let (y, _) = manager.new_integer_pair("y", 0, 3);
        let constraint = manager.encoding_bdd(x, 1).and(&manager.encoding_bdd(y, 2));
        let projected = constraint.exists_abstract(&[y]);
        assert_eq!(projected, manager.encoding_bdd(x, 1));
    }

    #[test]
    fn swap_moves_column_constraints_to_rows() {
        let manager = DdManager::new();
        let (x, x_column) = manager.new_integer_pair("x", 0, 5);
        let on_column = manager.encoding_bdd(x_column, 3);
        let on_row = on_column.swap_variables(&[(x, x_column)]);
        assert_eq!(on_row, manager.encoding_bdd(x, 3));
        // Swapping twice is the identity.
        assert_eq!(on_row.swap_variables(&[(x, x_column)]), on_column);
    }
}
