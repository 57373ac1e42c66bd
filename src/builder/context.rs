use crate::builder::AddExpressionAdapter;
use crate::builder::BuildError;
use crate::dd::{Add, DdManager, MetaVariableId};
use crate::program::{IntegerVariable, Program};
use std::collections::HashMap;
use tracing::trace;

/// Everything the generation pipeline threads through its stages: the
/// manager, the allocated meta-variables, and the cached identity and
/// range diagrams.
///
/// Allocation order fixes the diagram variable order: synchronisation
/// variables, then the nondeterminism pool, then global integer and
/// Boolean variables, then each module's integer and Boolean variables.
pub(crate) struct GenerationContext {
    pub manager: DdManager,
    pub row_variables: Vec<MetaVariableId>,
    pub column_variables: Vec<MetaVariableId>,
    pub variable_to_row: HashMap<String, MetaVariableId>,
    pub variable_to_column: HashMap<String, MetaVariableId>,
    pub row_column_pairs: Vec<(MetaVariableId, MetaVariableId)>,
    /// One Boolean meta-variable per action label.
    pub synchronization_variables: Vec<MetaVariableId>,
    /// The nondeterminism pool; `|modules| + Σ |commands|` variables, an
    /// upper bound on the encoding width, trimmed during assembly.
    pub nondeterminism_variables: Vec<MetaVariableId>,
    /// Per program variable: `(v = v') · range(v) · range(v')`.
    pub variable_identities: HashMap<String, Add>,
    /// Per module: the product of its variables' identities.
    pub module_identities: HashMap<String, Add>,
    /// Per module: the product of its variables' row ranges.
    pub module_ranges: HashMap<String, Add>,
    /// Global variable names, used for identity padding of updates.
    pub global_variables: Vec<String>,
    pub row_adapter: AddExpressionAdapter,
    pub column_adapter: AddExpressionAdapter,
}

impl GenerationContext {
    pub fn new(program: &Program) -> Result<Self, BuildError> {
        let manager = DdManager::new();
        let mut context = GenerationContext {
            manager: manager.clone(),
            row_variables: Vec::new(),
            column_variables: Vec::new(),
            variable_to_row: HashMap::new(),
            variable_to_column: HashMap::new(),
            row_column_pairs: Vec::new(),
            synchronization_variables: Vec::new(),
            nondeterminism_variables: Vec::new(),
            variable_identities: HashMap::new(),
            module_identities: HashMap::new(),
            module_ranges: HashMap::new(),
            global_variables: program.global_variable_names(),
            // Placeholder adapters; replaced once all variables exist.
            row_adapter: AddExpressionAdapter::new(manager.clone(), HashMap::new()),
            column_adapter: AddExpressionAdapter::new(manager.clone(), HashMap::new()),
        };
        context.create_meta_variables_and_identities(program)?;
        context.row_adapter =
            AddExpressionAdapter::new(manager.clone(), context.variable_to_row.clone());
        context.column_adapter =
            AddExpressionAdapter::new(manager, context.variable_to_column.clone());
        Ok(context)
    }

    fn create_meta_variables_and_identities(&mut self, program: &Program) -> Result<(), BuildError> {
        // Synchronisation variables, one per action label.
        for action in &program.actions {
            let (row, _) = self.manager.new_boolean_pair(action);
            self.synchronization_variables.push(row);
        }

        // The nondeterminism pool.
        let pool_size = program.modules.len()
            + program
                .modules
                .iter()
                .map(|module| module.commands.len())
                .sum::<usize>();
        for index in 0..pool_size {
            let (row, _) = self.manager.new_boolean_pair(&format!("nondet{index}"));
            self.nondeterminism_variables.push(row);
        }

        // Global program variables.
        for variable in &program.global_integer_variables {
            self.allocate_integer(variable)?;
        }
        for variable in &program.global_boolean_variables {
            self.allocate_boolean(&variable.name);
        }

        // Module-local variables, with per-module identity and range
        // products cached for command translation and composition.
        for module in &program.modules {
            let mut module_identity = self.manager.one();
            let mut module_range = self.manager.one();
            for variable in &module.integer_variables {
                let (identity, range) = self.allocate_integer(variable)?;
                module_identity = module_identity.times(&identity);
                module_range = module_range.times(&range);
            }
            for variable in &module.boolean_variables {
                let (identity, range) = self.allocate_boolean(&variable.name);
                module_identity = module_identity.times(&identity);
                module_range = module_range.times(&range);
            }
            self.module_identities
                .insert(module.name.clone(), module_identity);
            self.module_ranges.insert(module.name.clone(), module_range);
        }
        Ok(())
    }

    fn allocate_integer(&mut self, variable: &IntegerVariable) -> Result<(Add, Add), BuildError> {
        let (lower, upper) = variable.bounds()?;
        trace!(name = %variable.name, lower, upper, "allocating integer meta-variable pair");
        let (row, column) = self.manager.new_integer_pair(&variable.name, lower, upper);
        Ok(self.register_pair(&variable.name, row, column))
    }

    fn allocate_boolean(&mut self, name: &str) -> (Add, Add) {
        trace!(name = %name, "allocating boolean meta-variable pair");
        let (row, column) = self.manager.new_boolean_pair(name);
        self.register_pair(name, row, column)
    }

    /// Record a freshly allocated pair and cache its identity diagram.
    /// Returns `(identity, row_range)`.
    fn register_pair(
        &mut self,
        name: &str,
        row: MetaVariableId,
        column: MetaVariableId,
    ) -> (Add, Add) {
        self.row_variables.push(row);
        self.column_variables.push(column);
        self.variable_to_row.insert(name.to_string(), row);
        self.variable_to_column.insert(name.to_string(), column);
        self.row_column_pairs.push((row, column));

        let row_range = self.manager.range_bdd(row).to_add();
        let column_range = self.manager.range_bdd(column).to_add();
        let identity = self
            .manager
            .value_add(row)
            .equals(&self.manager.value_add(column))
            .times(&row_range)
            .times(&column_range);
        self.variable_identities
            .insert(name.to_string(), identity.clone());
        (identity, row_range)
    }

    pub fn identity(&self, variable: &str) -> &Add {
        &self.variable_identities[variable]
    }

    pub fn module_identity(&self, module: &str) -> &Add {
        &self.module_identities[module]
    }

    pub fn module_range(&self, module: &str) -> &Add {
        &self.module_ranges[module]
    }

    pub fn column_variable(&self, variable: &str) -> Option<MetaVariableId> {
        self.variable_to_column.get(variable).copied()
    }

    /// The cube tagging transitions of the given action: `1` on the
    /// action's synchronisation variable and `0` on all others; an
    /// independent transition is tagged `0` everywhere.
    pub fn synchronization_cube(&self, action: Option<usize>) -> Add {
        let mut cube = self.manager.one();
        for (index, variable) in self.synchronization_variables.iter().enumerate() {
            let value = i64::from(action == Some(index));
            cube = cube.times(&self.manager.encoding_bdd(*variable, value).to_add());
        }
        cube
    }

    /// The cube fixing the nondeterminism variables `[from, to)` to zero.
    pub fn nondeterminism_zero_cube(&self, from: usize, to: usize) -> Add {
        let mut cube = self.manager.one();
        for index in from..to {
            let variable = self.nondeterminism_variables[index];
            cube = cube.times(&self.manager.encoding_bdd(variable, 0).to_add());
        }
        cube
    }

    /// Synchronisation variables plus the first `used` nondeterminism
    /// variables: the set an MDP's choices are encoded over.
    pub fn all_nondeterminism_variables(&self, used: usize) -> Vec<MetaVariableId> {
        let mut variables = self.synchronization_variables.clone();
        variables.extend_from_slice(&self.nondeterminism_variables[..used]);
        variables
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::context::GenerationContext;
    use crate::expression::Expression;
    use crate::program::{
        BooleanVariable, Command, IntegerVariable, Module, Program,
    };
    use num_rational::Rational64;

    fn two_module_program() -> Program {
        Program {
            actions: vec!["sync".to_string()],
            global_integer_variables: vec![IntegerVariable::with_range("g", 0, 2)],
            modules: vec![
                Module::new(
                    "first",
                    vec![IntegerVariable::with_range("x", 0, 3)],
                    vec![BooleanVariable::new("b")],
                    vec![Command::deterministic(None, Expression::mk_bool(true), vec![])],
                ),
                Module::new(
                    "second",
                    vec![IntegerVariable::with_range("y", 1, 2)],
                    vec![],
                    vec![
                        Command::deterministic(None, Expression::mk_bool(true), vec![]),
                        Command::deterministic(Some(0), Expression::mk_bool(true), vec![]),
                    ],
                ),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn allocation_counts_follow_the_program() {
        let program = two_module_program();
        let context = GenerationContext::new(&program).unwrap();
        assert_eq!(context.synchronization_variables.len(), 1);
        // Two modules plus three commands.
        assert_eq!(context.nondeterminism_variables.len(), 5);
        // One global and three module variables.
        assert_eq!(context.row_variables.len(), 4);
        assert_eq!(context.column_variables.len(), 4);
        assert_eq!(context.row_column_pairs.len(), 4);
    }

    #[test]
    fn identity_diagrams_pair_rows_with_columns() {
        let program = two_module_program();
        let context = GenerationContext::new(&program).unwrap();
        let identity = context.identity("g");
        let (row, column) = context.row_column_pairs[0];
        assert_eq!(context.manager.variable_name(row), "g");
        // Exactly one column value per in-range row value; `g` spans
        // three of the four encodings of its two bits.
        assert_eq!(identity.not_zero().sat_count(&[row, column]), 3);
        // The identity never leaves the variable's range.
        let out_of_range = context.manager.range_bdd(row).not().to_add();
        assert!(identity.times(&out_of_range).is_zero());
    }

    #[test]
    fn module_range_is_the_product_of_member_ranges() {
        let program = two_module_program();
        let context = GenerationContext::new(&program).unwrap();
        let range = context.module_range("second");
        let (row, _) = context.row_column_pairs[3];
        assert_eq!(context.manager.variable_name(row), "y");
        assert_eq!(range.not_zero().sat_count(&[row]), 2);
        assert_eq!(range.max_value(), Rational64::from_integer(1));
    }

    #[test]
    fn synchronization_cube_tags_exactly_one_action() {
        let program = two_module_program();
        let context = GenerationContext::new(&program).unwrap();
        let sync = context.synchronization_cube(Some(0));
        let independent = context.synchronization_cube(None);
        assert!(sync.times(&independent).is_zero());
        let variables = context.all_nondeterminism_variables(0);
        assert_eq!(sync.not_zero().sat_count(&variables), 1);
    }
}
