use crate::dd::{Add, Bdd};
use num_rational::Rational64;
use num_traits::{Signed, Zero};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

pub(crate) type NodeId = u32;

/// Terminal nodes sit conceptually below every decision level.
pub(crate) const TERMINAL_LEVEL: u32 = u32::MAX;

/// Identifies a meta-variable owned by a [DdManager]: a named group of
/// Boolean decision levels encoding one program-level variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaVariableId(pub(crate) usize);

#[derive(Clone, Debug)]
pub(crate) enum Node {
    Terminal(Rational64),
    Internal { level: u32, low: NodeId, high: NodeId },
}

pub(crate) struct MetaVariableInfo {
    pub name: String,
    pub lower: i64,
    pub upper: i64,
    /// Decision levels of the encoding bits, most significant first.
    pub levels: Vec<u32>,
}

/// Binary terminal operations lifted pointwise over diagrams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ApplyOp {
    Plus,
    Minus,
    Times,
    Divide,
    Min,
    Max,
    Equals,
    Less,
    LessEq,
    Pow,
    Mod,
}

impl ApplyOp {
    fn is_commutative(&self) -> bool {
        matches!(
            self,
            ApplyOp::Plus | ApplyOp::Times | ApplyOp::Min | ApplyOp::Max | ApplyOp::Equals
        )
    }

    fn eval(&self, a: Rational64, b: Rational64) -> Rational64 {
        let bool_value = |v: bool| Rational64::from_integer(i64::from(v));
        match self {
            ApplyOp::Plus => a + b,
            ApplyOp::Minus => a - b,
            ApplyOp::Times => a * b,
            // Total division with `x / 0 = 0`; the row normalisation and
            // reward scaling depend on `0 / 0 = 0`.
            ApplyOp::Divide => {
                if b.is_zero() {
                    Rational64::zero()
                } else {
                    a / b
                }
            }
            ApplyOp::Min => a.min(b),
            ApplyOp::Max => a.max(b),
            ApplyOp::Equals => bool_value(a == b),
            ApplyOp::Less => bool_value(a < b),
            ApplyOp::LessEq => bool_value(a <= b),
            ApplyOp::Pow => rational_pow(a, b),
            ApplyOp::Mod => rational_mod(a, b),
        }
    }
}

/// Unary terminal operations lifted pointwise over diagrams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum UnaryApplyOp {
    NotZero,
    Floor,
    Ceil,
}

impl UnaryApplyOp {
    fn eval(&self, a: Rational64) -> Rational64 {
        match self {
            UnaryApplyOp::NotZero => Rational64::from_integer(i64::from(!a.is_zero())),
            UnaryApplyOp::Floor => a.floor(),
            UnaryApplyOp::Ceil => a.ceil(),
        }
    }
}

fn rational_pow(base: Rational64, exponent: Rational64) -> Rational64 {
    assert!(
        exponent.is_integer(),
        "pow requires an integer exponent, got {exponent}"
    );
    let exponent = exponent.to_integer();
    if exponent < 0 && base.is_zero() {
        panic!("pow of zero with a negative exponent");
    }
    let magnitude = base.abs().pow(exponent.unsigned_abs() as i32);
    let signed = if base.is_negative() && exponent % 2 != 0 {
        -magnitude
    } else {
        magnitude
    };
    if exponent < 0 { signed.recip() } else { signed }
}

fn rational_mod(a: Rational64, b: Rational64) -> Rational64 {
    assert!(
        a.is_integer() && b.is_integer() && !b.is_zero(),
        "mod requires integer operands and a non-zero divisor"
    );
    Rational64::from_integer(a.to_integer().rem_euclid(b.to_integer()))
}

pub(crate) struct ManagerInner {
    nodes: Vec<Node>,
    unique: HashMap<(u32, NodeId, NodeId), NodeId>,
    terminals: HashMap<Rational64, NodeId>,
    apply_cache: HashMap<(ApplyOp, NodeId, NodeId), NodeId>,
    unary_cache: HashMap<(UnaryApplyOp, NodeId), NodeId>,
    ite_cache: HashMap<(NodeId, NodeId, NodeId), NodeId>,
    meta_variables: Vec<MetaVariableInfo>,
    next_level: u32,
    pub(crate) zero: NodeId,
    pub(crate) one: NodeId,
}

impl ManagerInner {
    fn new() -> Self {
        let mut inner = ManagerInner {
            nodes: Vec::new(),
            unique: HashMap::new(),
            terminals: HashMap::new(),
            apply_cache: HashMap::new(),
            unary_cache: HashMap::new(),
            ite_cache: HashMap::new(),
            meta_variables: Vec::new(),
            next_level: 0,
            zero: 0,
            one: 0,
        };
        inner.zero = inner.terminal(Rational64::zero());
        inner.one = inner.terminal(Rational64::from_integer(1));
        inner
    }

    pub(crate) fn terminal(&mut self, value: Rational64) -> NodeId {
        if let Some(id) = self.terminals.get(&value) {
            return *id;
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::Terminal(value));
        self.terminals.insert(value, id);
        id
    }

    pub(crate) fn mk_node(&mut self, level: u32, low: NodeId, high: NodeId) -> NodeId {
        if low == high {
            return low;
        }
        if let Some(id) = self.unique.get(&(level, low, high)) {
            return *id;
        }
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::Internal { level, low, high });
        self.unique.insert((level, low, high), id);
        id
    }

    pub(crate) fn level(&self, node: NodeId) -> u32 {
        match &self.nodes[node as usize] {
            Node::Terminal(_) => TERMINAL_LEVEL,
            Node::Internal { level, .. } => *level,
        }
    }

    fn terminal_value(&self, node: NodeId) -> Option<Rational64> {
        match &self.nodes[node as usize] {
            Node::Terminal(value) => Some(*value),
            Node::Internal { .. } => None,
        }
    }

    /// Cofactors of `node` with respect to `level`; identity when the node
    /// does not branch on `level`.
    fn cofactors(&self, node: NodeId, level: u32) -> (NodeId, NodeId) {
        match &self.nodes[node as usize] {
            Node::Internal {
                level: node_level,
                low,
                high,
            } if *node_level == level => (*low, *high),
            _ => (node, node),
        }
    }

    pub(crate) fn apply(&mut self, op: ApplyOp, a: NodeId, b: NodeId) -> NodeId {
        if let Some(result) = self.apply_shortcut(op, a, b) {
            return result;
        }
        if let (Some(va), Some(vb)) = (self.terminal_value(a), self.terminal_value(b)) {
            return self.terminal(op.eval(va, vb));
        }
        let key = if op.is_commutative() && b < a {
            (op, b, a)
        } else {
            (op, a, b)
        };
        if let Some(result) = self.apply_cache.get(&key) {
            return *result;
        }
        let level = self.level(a).min(self.level(b));
        let (a_low, a_high) = self.cofactors(a, level);
        let (b_low, b_high) = self.cofactors(b, level);
        let low = self.apply(op, a_low, b_low);
        let high = self.apply(op, a_high, b_high);
        let result = self.mk_node(level, low, high);
        self.apply_cache.insert(key, result);
        result
    }

    fn apply_shortcut(&self, op: ApplyOp, a: NodeId, b: NodeId) -> Option<NodeId> {
        let result = match op {
            ApplyOp::Plus if a == self.zero => b,
            ApplyOp::Plus if b == self.zero => a,
            ApplyOp::Minus if b == self.zero => a,
            ApplyOp::Minus if a == b => self.zero,
            ApplyOp::Times if a == self.zero || b == self.zero => self.zero,
            ApplyOp::Times if a == self.one => b,
            ApplyOp::Times if b == self.one => a,
            ApplyOp::Divide if a == self.zero => self.zero,
            ApplyOp::Divide if b == self.one => a,
            ApplyOp::Min | ApplyOp::Max if a == b => a,
            ApplyOp::Equals | ApplyOp::LessEq if a == b => self.one,
            ApplyOp::Less if a == b => self.zero,
            _ => return None,
        };
        Some(result)
    }

    pub(crate) fn apply_unary(&mut self, op: UnaryApplyOp, a: NodeId) -> NodeId {
        if let Some(value) = self.terminal_value(a) {
            return self.terminal(op.eval(value));
        }
        if let Some(result) = self.unary_cache.get(&(op, a)) {
            return *result;
        }
        let (level, low, high) = match &self.nodes[a as usize] {
            Node::Internal { level, low, high } => (*level, *low, *high),
            Node::Terminal(_) => unreachable!(),
        };
        let low = self.apply_unary(op, low);
        let high = self.apply_unary(op, high);
        let result = self.mk_node(level, low, high);
        self.unary_cache.insert((op, a), result);
        result
    }

    /// If-then-else over a 0/1 condition diagram.
    pub(crate) fn ite(&mut self, f: NodeId, g: NodeId, h: NodeId) -> NodeId {
        if f == self.one {
            return g;
        }
        if f == self.zero {
            return h;
        }
        if g == h {
            return g;
        }
        if let Some(value) = self.terminal_value(f) {
            return if value.is_zero() { h } else { g };
        }
        if let Some(result) = self.ite_cache.get(&(f, g, h)) {
            return *result;
        }
        let level = self.level(f).min(self.level(g)).min(self.level(h));
        let (f_low, f_high) = self.cofactors(f, level);
        let (g_low, g_high) = self.cofactors(g, level);
        let (h_low, h_high) = self.cofactors(h, level);
        let low = self.ite(f_low, g_low, h_low);
        let high = self.ite(f_high, g_high, h_high);
        let result = self.mk_node(level, low, high);
        self.ite_cache.insert((f, g, h), result);
        result
    }

    /// Sum out the given decision levels. A level the diagram does not
    /// branch on still doubles the result (both assignments contribute).
    pub(crate) fn sum_abstract(
        &mut self,
        node: NodeId,
        levels: &[u32],
        index: usize,
        memo: &mut HashMap<(NodeId, usize), NodeId>,
    ) -> NodeId {
        if index == levels.len() {
            return node;
        }
        if let Some(result) = memo.get(&(node, index)) {
            return *result;
        }
        let abstracted_level = levels[index];
        let node_level = self.level(node);
        let result = if node_level > abstracted_level {
            let skipped = self.sum_abstract(node, levels, index + 1, memo);
            self.apply(ApplyOp::Plus, skipped, skipped)
        } else if node_level == abstracted_level {
            let (low, high) = self.cofactors(node, node_level);
            let low = self.sum_abstract(low, levels, index + 1, memo);
            let high = self.sum_abstract(high, levels, index + 1, memo);
            self.apply(ApplyOp::Plus, low, high)
        } else {
            let (low, high) = self.cofactors(node, node_level);
            let low = self.sum_abstract(low, levels, index, memo);
            let high = self.sum_abstract(high, levels, index, memo);
            self.mk_node(node_level, low, high)
        };
        memo.insert((node, index), result);
        result
    }

    /// Existentially quantify the given decision levels of a 0/1 diagram.
    pub(crate) fn exists_abstract(
        &mut self,
        node: NodeId,
        levels: &[u32],
        index: usize,
        memo: &mut HashMap<(NodeId, usize), NodeId>,
    ) -> NodeId {
        if index == levels.len() {
            return node;
        }
        if let Some(result) = memo.get(&(node, index)) {
            return *result;
        }
        let abstracted_level = levels[index];
        let node_level = self.level(node);
        let result = if node_level > abstracted_level {
            self.exists_abstract(node, levels, index + 1, memo)
        } else if node_level == abstracted_level {
            let (low, high) = self.cofactors(node, node_level);
            let low = self.exists_abstract(low, levels, index + 1, memo);
            let high = self.exists_abstract(high, levels, index + 1, memo);
            self.apply(ApplyOp::Max, low, high)
        } else {
            let (low, high) = self.cofactors(node, node_level);
            let low = self.exists_abstract(low, levels, index, memo);
            let high = self.exists_abstract(high, levels, index, memo);
            self.mk_node(node_level, low, high)
        };
        memo.insert((node, index), result);
        result
    }

    /// Rename decision levels according to `permutation`. The caller must
    /// guarantee that the renaming is monotone on the operand's support;
    /// this holds for row/column swaps of diagrams that touch at most one
    /// member of every pair, which is the only use in this crate.
    pub(crate) fn rename_levels(
        &mut self,
        node: NodeId,
        permutation: &HashMap<u32, u32>,
        memo: &mut HashMap<NodeId, NodeId>,
    ) -> NodeId {
        if let Some(result) = memo.get(&node) {
            return *result;
        }
        let result = match &self.nodes[node as usize] {
            Node::Terminal(_) => node,
            Node::Internal { level, low, high } => {
                let (level, low, high) = (*level, *low, *high);
                let new_level = *permutation.get(&level).unwrap_or(&level);
                let low = self.rename_levels(low, permutation, memo);
                let high = self.rename_levels(high, permutation, memo);
                self.mk_node(new_level, low, high)
            }
        };
        memo.insert(node, result);
        result
    }

    /// Decision levels in the support of `node`.
    pub(crate) fn support(&self, node: NodeId) -> BTreeSet<u32> {
        let mut levels = BTreeSet::new();
        let mut visited = BTreeSet::new();
        self.support_rec(node, &mut levels, &mut visited);
        levels
    }

    fn support_rec(&self, node: NodeId, levels: &mut BTreeSet<u32>, visited: &mut BTreeSet<NodeId>) {
        if !visited.insert(node) {
            return;
        }
        if let Node::Internal { level, low, high } = &self.nodes[node as usize] {
            levels.insert(*level);
            self.support_rec(*low, levels, visited);
            self.support_rec(*high, levels, visited);
        }
    }

    /// Count satisfying assignments of a 0/1 diagram over exactly the
    /// given decision levels; the support must be contained in them.
    pub(crate) fn sat_count(
        &self,
        node: NodeId,
        levels: &[u32],
        index: usize,
        memo: &mut HashMap<(NodeId, usize), u64>,
    ) -> u64 {
        if node == self.zero {
            return 0;
        }
        if let Some(count) = memo.get(&(node, index)) {
            return *count;
        }
        let count = match &self.nodes[node as usize] {
            Node::Terminal(value) => {
                debug_assert!(!value.is_zero());
                1u64 << (levels.len() - index) as u64
            }
            Node::Internal { level, low, high } => {
                assert!(
                    index < levels.len(),
                    "diagram depends on a level outside the counted set"
                );
                let counted_level = levels[index];
                if *level > counted_level {
                    2 * self.sat_count(node, levels, index + 1, memo)
                } else {
                    assert!(*level == counted_level, "diagram level below counted set");
                    self.sat_count(*low, levels, index + 1, memo)
                        + self.sat_count(*high, levels, index + 1, memo)
                }
            }
        };
        memo.insert((node, index), count);
        count
    }

    pub(crate) fn extreme_value(&self, node: NodeId, maximum: bool) -> Rational64 {
        let mut best: Option<Rational64> = None;
        let mut visited = BTreeSet::new();
        self.extreme_rec(node, maximum, &mut best, &mut visited);
        best.expect("diagram has at least one terminal")
    }

    fn extreme_rec(
        &self,
        node: NodeId,
        maximum: bool,
        best: &mut Option<Rational64>,
        visited: &mut BTreeSet<NodeId>,
    ) {
        if !visited.insert(node) {
            return;
        }
        match &self.nodes[node as usize] {
            Node::Terminal(value) => {
                let better = match best {
                    None => true,
                    Some(current) => {
                        if maximum {
                            value > current
                        } else {
                            value < current
                        }
                    }
                };
                if better {
                    *best = Some(*value);
                }
            }
            Node::Internal { low, high, .. } => {
                self.extreme_rec(*low, maximum, best, visited);
                self.extreme_rec(*high, maximum, best, visited);
            }
        }
    }

    fn add_meta_variable(&mut self, name: &str, lower: i64, upper: i64) -> MetaVariableId {
        assert!(lower <= upper, "invalid bounds [{lower}, {upper}] for `{name}`");
        let span = (upper - lower) as u64;
        let bit_count = (64 - span.leading_zeros()).max(1) as usize;
        let mut levels = Vec::with_capacity(bit_count);
        for _ in 0..bit_count {
            levels.push(self.next_level);
            // Leave a gap for the column twin of this bit.
            self.next_level += 2;
        }
        let id = MetaVariableId(self.meta_variables.len());
        self.meta_variables.push(MetaVariableInfo {
            name: name.to_string(),
            lower,
            upper,
            levels,
        });
        id
    }

    /// Allocate a row/column meta-variable pair with interleaved bit
    /// levels (each column bit directly below its row bit), so that
    /// row↔column renaming preserves the level order.
    fn add_meta_variable_pair(
        &mut self,
        name: &str,
        lower: i64,
        upper: i64,
    ) -> (MetaVariableId, MetaVariableId) {
        let row = self.add_meta_variable(name, lower, upper);
        let row_levels: Vec<u32> = self.meta_variables[row.0].levels.clone();
        let column_levels: Vec<u32> = row_levels.iter().map(|level| level + 1).collect();
        let column = MetaVariableId(self.meta_variables.len());
        self.meta_variables.push(MetaVariableInfo {
            name: format!("{name}'"),
            lower,
            upper,
            levels: column_levels,
        });
        (row, column)
    }

    pub(crate) fn info(&self, variable: MetaVariableId) -> &MetaVariableInfo {
        &self.meta_variables[variable.0]
    }

    /// The ADD mapping every encoding of `variable` to its numeric value.
    /// Encodings beyond the declared span still map to distinct values,
    /// so equality of two value diagrams implies equality of encodings.
    pub(crate) fn value_add(&mut self, variable: MetaVariableId) -> NodeId {
        let info = &self.meta_variables[variable.0];
        let lower = info.lower;
        let levels = info.levels.clone();
        let mut result = self.terminal(Rational64::from_integer(lower));
        for (position, level) in levels.iter().enumerate() {
            let weight = 1i64 << (levels.len() - 1 - position);
            let weight = self.terminal(Rational64::from_integer(weight));
            let bit = self.mk_node(*level, self.zero, weight);
            result = self.apply(ApplyOp::Plus, result, bit);
        }
        result
    }

    /// The BDD of encodings that represent values within the declared
    /// bounds of `variable`.
    pub(crate) fn range_bdd(&mut self, variable: MetaVariableId) -> NodeId {
        let info = &self.meta_variables[variable.0];
        let span = (info.upper - info.lower) as u64;
        let levels = info.levels.clone();
        self.leq_const(&levels, span, 0)
    }

    fn leq_const(&mut self, levels: &[u32], bound: u64, index: usize) -> NodeId {
        if index == levels.len() {
            return self.one;
        }
        let weight = 1u64 << (levels.len() - 1 - index);
        if bound >= weight {
            let high = self.leq_const(levels, bound - weight, index + 1);
            self.mk_node(levels[index], self.one, high)
        } else {
            let low = self.leq_const(levels, bound, index + 1);
            self.mk_node(levels[index], low, self.zero)
        }
    }

    /// The BDD cube of the single encoding of `value` for `variable`.
    pub(crate) fn encoding_bdd(&mut self, variable: MetaVariableId, value: i64) -> NodeId {
        let info = &self.meta_variables[variable.0];
        assert!(
            info.lower <= value && value <= info.upper,
            "value {value} outside the bounds of `{}`",
            info.name
        );
        let offset = (value - info.lower) as u64;
        let levels = info.levels.clone();
        let mut result = self.one;
        for position in (0..levels.len()).rev() {
            let bit = (offset >> (levels.len() - 1 - position)) & 1;
            result = if bit == 1 {
                self.mk_node(levels[position], self.zero, result)
            } else {
                self.mk_node(levels[position], result, self.zero)
            };
        }
        result
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// The decision-diagram manager: a shared, hash-consed node arena.
///
/// All [Add] and [Bdd] handles created by a manager reference its arena
/// through a shared pointer; cloning a handle or a manager is cheap.
/// Diagrams from different managers must not be combined.
#[derive(Clone)]
pub struct DdManager {
    pub(crate) inner: Rc<RefCell<ManagerInner>>,
}

impl Default for DdManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DdManager {
    pub fn new() -> Self {
        DdManager {
            inner: Rc::new(RefCell::new(ManagerInner::new())),
        }
    }

    pub(crate) fn same_manager(&self, other: &DdManager) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Allocate a row/column pair of Boolean meta-variables.
    pub fn new_boolean_pair(&self, name: &str) -> (MetaVariableId, MetaVariableId) {
        self.inner.borrow_mut().add_meta_variable_pair(name, 0, 1)
    }

    /// Allocate a row/column pair of bounded-integer meta-variables with
    /// inclusive bounds; the encoding uses `⌈log₂(upper − lower + 1)⌉`
    /// Boolean levels per member.
    pub fn new_integer_pair(
        &self,
        name: &str,
        lower: i64,
        upper: i64,
    ) -> (MetaVariableId, MetaVariableId) {
        self.inner
            .borrow_mut()
            .add_meta_variable_pair(name, lower, upper)
    }

    pub fn constant(&self, value: Rational64) -> Add {
        let root = self.inner.borrow_mut().terminal(value);
        Add::new(self.clone(), root)
    }

    pub fn zero(&self) -> Add {
        let root = self.inner.borrow().zero;
        Add::new(self.clone(), root)
    }

    pub fn one(&self) -> Add {
        let root = self.inner.borrow().one;
        Add::new(self.clone(), root)
    }

    pub fn bdd_false(&self) -> Bdd {
        let root = self.inner.borrow().zero;
        Bdd::new(self.clone(), root)
    }

    pub fn bdd_true(&self) -> Bdd {
        let root = self.inner.borrow().one;
        Bdd::new(self.clone(), root)
    }

    /// The ADD assigning every state its value of `variable`.
    pub fn value_add(&self, variable: MetaVariableId) -> Add {
        let root = self.inner.borrow_mut().value_add(variable);
        Add::new(self.clone(), root)
    }

    /// The set of encodings of `variable` representing in-bounds values.
    pub fn range_bdd(&self, variable: MetaVariableId) -> Bdd {
        let root = self.inner.borrow_mut().range_bdd(variable);
        Bdd::new(self.clone(), root)
    }

    /// The cube encoding `variable = value`.
    pub fn encoding_bdd(&self, variable: MetaVariableId, value: i64) -> Bdd {
        let root = self.inner.borrow_mut().encoding_bdd(variable, value);
        Bdd::new(self.clone(), root)
    }

    pub fn variable_name(&self, variable: MetaVariableId) -> String {
        self.inner.borrow().info(variable).name.clone()
    }

    pub fn variable_bounds(&self, variable: MetaVariableId) -> (i64, i64) {
        let inner = self.inner.borrow();
        let info = inner.info(variable);
        (info.lower, info.upper)
    }

    /// Sorted decision levels of a set of meta-variables.
    pub(crate) fn levels_of(&self, variables: &[MetaVariableId]) -> Vec<u32> {
        let inner = self.inner.borrow();
        let mut levels: Vec<u32> = variables
            .iter()
            .flat_map(|variable| inner.info(*variable).levels.iter().copied())
            .collect();
        levels.sort_unstable();
        levels
    }

    /// Number of nodes currently allocated in the arena.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().node_count()
    }
}

impl std::fmt::Debug for DdManager {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DdManager")
            .field("nodes", &self.node_count())
            .finish()
    }
}
