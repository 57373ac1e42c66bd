//! The symbolic model builder.
//!
//! [ModelBuilder::build] translates a prepared [Program] into a
//! [SymbolicModel]: it allocates meta-variables and identity diagrams,
//! translates every module's commands into action diagrams, folds the
//! modules into a parallel composition, assembles and (for DTMCs)
//! normalises the transition diagram, builds the selected reward
//! structures, computes the reachable fragment and patches deadlocks.
//!
//! Non-fatal findings are collected as [BuildWarning]s on the builder
//! (and logged); they never change the produced diagrams.

mod action;
mod adapter;
mod context;
mod rewards;
mod system;

pub use adapter::AddExpressionAdapter;

use crate::builder::context::GenerationContext;
use crate::expression::{Expression, ExpressionError};
use crate::logic::Formula;
use crate::model::{ModelComponents, RewardModel, SymbolicModel};
use crate::program::{ModelType, Program};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Configuration of a model build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Definitions substituted for the program's undefined constants.
    pub constant_definitions: HashMap<String, Expression>,
    /// Build every declared reward structure.
    pub build_all_reward_models: bool,
    /// Otherwise, build exactly the named reward structures.
    pub reward_models_to_build: BTreeSet<String>,
    /// Restrict the produced label map to these names; `None` keeps all
    /// program labels.
    pub labels_to_build: Option<BTreeSet<String>>,
    /// Extra predicates published as labels under their rendered text.
    pub expression_labels: Vec<Expression>,
    /// Treat reachable deadlock states as a fatal error instead of
    /// attaching self-loops.
    pub dont_fix_deadlocks: bool,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options preserving exactly what `formula` needs.
    pub fn for_formula(formula: &Formula) -> Self {
        let mut options = Self::default();
        options.preserve_formula(formula);
        options
    }

    /// Union the reward structures and labels referenced by `formula`
    /// into the current selections.
    pub fn preserve_formula(&mut self, formula: &Formula) {
        if !self.build_all_reward_models {
            self.reward_models_to_build
                .extend(formula.referenced_reward_models());
        }
        self.labels_to_build
            .get_or_insert_with(BTreeSet::new)
            .extend(formula.atomic_labels());
        self.expression_labels.extend(formula.atomic_expressions());
    }

    /// Define one constant, builder-style.
    #[must_use]
    pub fn define_constant(mut self, name: &str, value: Expression) -> Self {
        self.constant_definitions.insert(name.to_string(), value);
        self
    }
}

/// Fatal errors of the model builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The program still contains undefined constants; they must be
    /// supplied through [BuildOptions::constant_definitions].
    #[error("program still contains these undefined constants: {names}")]
    UndefinedConstant { names: String },
    /// The program's model type is not one of DTMC/CTMC/MDP.
    #[error("cannot build a model of type `{model_type}`")]
    InvalidModelType { model_type: ModelType },
    /// Reachable deadlock states exist and deadlock fixing is disabled.
    #[error("the model contains {count} deadlock states; unset `dont_fix_deadlocks` to fix them automatically")]
    DeadlockForbidden { count: u64 },
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// Non-fatal findings collected during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// A command's guard is unsatisfiable within the module's ranges.
    UnsatisfiableGuard { module: String, guard: String },
    /// An update produced an empty diagram.
    UpdateWithoutEffect { module: String, guard: String },
    /// Two commands of a DTMC/MDP action overlap; the DTMC row is later
    /// renormalised.
    OverlappingGuards,
    /// A reward entry assigns negative rewards.
    NegativeReward { reward_model: String },
    /// A reward entry assigns no non-zero reward.
    AllZeroReward { reward_model: String },
    /// Deadlock states received self-loops.
    DeadlocksFixed { count: u64 },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildWarning::UnsatisfiableGuard { module, guard } => {
                write!(f, "guard `{guard}` in module `{module}` is unsatisfiable")
            }
            BuildWarning::UpdateWithoutEffect { module, guard } => {
                write!(
                    f,
                    "an update of the command guarded by `{guard}` in module `{module}` has no effect"
                )
            }
            BuildWarning::OverlappingGuards => {
                write!(f, "guard of a command overlaps with previous guards")
            }
            BuildWarning::NegativeReward { reward_model } => {
                write!(f, "reward structure `{reward_model}` assigns negative rewards")
            }
            BuildWarning::AllZeroReward { reward_model } => {
                write!(f, "a reward entry of `{reward_model}` assigns no non-zero reward")
            }
            BuildWarning::DeadlocksFixed { count } => {
                write!(f, "fixed deadlocks in {count} states by attaching self-loops")
            }
        }
    }
}

/// Builds symbolic models from programs; see the module documentation.
#[derive(Default)]
pub struct ModelBuilder {
    options: BuildOptions,
    warnings: Vec<BuildWarning>,
}

impl ModelBuilder {
    pub fn new(options: BuildOptions) -> Self {
        ModelBuilder {
            options,
            warnings: Vec::new(),
        }
    }

    /// Warnings collected by the most recent [ModelBuilder::build] call.
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub(crate) fn warn(&mut self, warning: BuildWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Translate `program` into a symbolic model.
    ///
    /// The translation assumes (without checking) that global variables
    /// are only written by independent commands; synchronised writes to
    /// globals produce an undefined composition.
    pub fn build(&mut self, program: &Program) -> Result<SymbolicModel, BuildError> {
        self.warnings.clear();

        // Resolve constants; anything left undefined is fatal.
        let definitions = self.options.constant_definitions.clone();
        let undefined = program.undefined_constants(&definitions);
        if !undefined.is_empty() {
            let names = undefined
                .iter()
                .map(|constant| format!("{} ({})", constant.name, constant.const_type))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(BuildError::UndefinedConstant { names });
        }
        let program = program.substitute_constants(&definitions);

        if program.model_type == ModelType::Unknown {
            return Err(BuildError::InvalidModelType {
                model_type: program.model_type,
            });
        }

        let context = GenerationContext::new(&program)?;
        let (full_matrix, global_module) = self.create_system_dd(&context, &program)?;

        // Reward structures are built against the full matrix: the DTMC
        // scaling divides by it and needs non-zero denominators wherever
        // a reward sits, which the reachability cut would destroy.
        let mut reward_models: HashMap<String, RewardModel> = HashMap::new();
        for reward in &program.reward_structures {
            let selected = self.options.build_all_reward_models
                || self.options.reward_models_to_build.contains(&reward.name);
            if selected {
                let model = self.create_reward_model(
                    &context,
                    &program,
                    reward,
                    &global_module,
                    &full_matrix,
                )?;
                reward_models.insert(reward.name.clone(), model);
            }
        }

        // Restrict transitions and rewards to the reachable fragment.
        let initial_states = self.create_initial_states(&context, &program)?;
        let mut transition_bdd = full_matrix.not_zero();
        if program.model_type == ModelType::Mdp {
            let all_nondeterminism =
                context.all_nondeterminism_variables(global_module.used_nondet);
            transition_bdd = transition_bdd.exists_abstract(&all_nondeterminism);
        }
        let reachable_states =
            self.compute_reachable_states(&context, &initial_states, &transition_bdd);
        let reachable_add = reachable_states.to_add();
        let mut transitions = full_matrix.times(&reachable_add);
        for reward_model in reward_models.values_mut() {
            *reward_model = reward_model.restrict(&reachable_add);
        }

        // Reachable states without an outgoing transition either fail the
        // build or receive a self-loop.
        let states_with_transition = transition_bdd.exists_abstract(&context.column_variables);
        let deadlocks = reachable_states.and_not(&states_with_transition);
        if !deadlocks.is_false() {
            let count = deadlocks.sat_count(&context.row_variables);
            if self.options.dont_fix_deadlocks {
                return Err(BuildError::DeadlockForbidden { count });
            }
            self.warn(BuildWarning::DeadlocksFixed { count });
            let self_loops = deadlocks.to_add().times(&global_module.identity);
            match program.model_type {
                ModelType::Dtmc | ModelType::Ctmc => {
                    transitions = transitions.plus(&self_loops);
                }
                ModelType::Mdp => {
                    // Attach the loop under one distinguished choice: the
                    // all-zero nondeterminism and synchronisation cube.
                    let cube = context.synchronization_cube(None).times(
                        &context.nondeterminism_zero_cube(0, global_module.used_nondet),
                    );
                    transitions = transitions.plus(&self_loops.times(&cube));
                }
                ModelType::Unknown => unreachable!("model type was validated above"),
            }
        }

        // Publish the label map.
        let mut labels: HashMap<String, Expression> = HashMap::new();
        for label in &program.labels {
            let keep = match &self.options.labels_to_build {
                None => true,
                Some(selection) => selection.contains(&label.name),
            };
            if keep {
                labels.insert(label.name.clone(), label.predicate.clone());
            }
        }
        for expression in &self.options.expression_labels {
            labels.insert(expression.to_string(), expression.clone());
        }

        let components = ModelComponents {
            manager: context.manager.clone(),
            reachable_states,
            initial_states,
            transitions,
            row_variables: context.row_variables.clone(),
            column_variables: context.column_variables.clone(),
            row_column_pairs: context.row_column_pairs.clone(),
            labels,
            reward_models,
        };

        Ok(match program.model_type {
            ModelType::Dtmc => SymbolicModel::Dtmc(components),
            ModelType::Ctmc => SymbolicModel::Ctmc(components),
            ModelType::Mdp => SymbolicModel::Mdp {
                nondeterminism_variables: context
                    .all_nondeterminism_variables(global_module.used_nondet),
                components,
            },
            ModelType::Unknown => unreachable!("model type was validated above"),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{BuildError, BuildOptions, BuildWarning, ModelBuilder};
    use crate::expression::Expression;
    use crate::logic::Formula;
    use crate::program::{
        Assignment, BooleanVariable, Command, Constant, ConstantType, IntegerVariable, Label,
        ModelType, Module, Program, RewardStructure, StateActionReward, StateReward,
        TransitionReward, Update,
    };
    use num_rational::Rational64;

    fn set(variable: &str, value: i64) -> Assignment {
        Assignment::new(variable, Expression::mk_int(value))
    }

    /// The Knuth–Yao simulation of a fair die by fair coin flips: seven
    /// transient states plus the six outcomes, 13 reachable states.
    fn die_program() -> Program {
        let s = |k: i64| Expression::mk_eq(Expression::mk_var("s"), Expression::mk_int(k));
        let flip = |state: i64, left: Vec<Assignment>, right: Vec<Assignment>| {
            Command::new(
                None,
                s(state),
                vec![
                    Update::new(Expression::mk_rational(1, 2), left),
                    Update::new(Expression::mk_rational(1, 2), right),
                ],
            )
        };
        Program {
            model_type: ModelType::Dtmc,
            modules: vec![Module::new(
                "die",
                vec![
                    IntegerVariable::with_range("s", 0, 7),
                    IntegerVariable::with_range("d", 0, 6),
                ],
                vec![],
                vec![
                    flip(0, vec![set("s", 1)], vec![set("s", 2)]),
                    flip(1, vec![set("s", 3)], vec![set("s", 4)]),
                    flip(2, vec![set("s", 5)], vec![set("s", 6)]),
                    flip(3, vec![set("s", 1)], vec![set("s", 7), set("d", 1)]),
                    flip(4, vec![set("s", 7), set("d", 2)], vec![set("s", 7), set("d", 3)]),
                    flip(5, vec![set("s", 7), set("d", 4)], vec![set("s", 7), set("d", 5)]),
                    flip(6, vec![set("s", 7), set("d", 6)], vec![set("s", 2)]),
                    Command::deterministic(None, s(7), vec![]),
                ],
            )],
            labels: vec![
                Label::new("done", s(7)),
                Label::new("start", s(0)),
            ],
            reward_structures: vec![{
                let mut reward = RewardStructure::new("coin_flips");
                reward.state_rewards.push(StateReward {
                    states: Expression::mk_lt(Expression::mk_var("s"), Expression::mk_int(7)),
                    value: Expression::mk_int(1),
                });
                reward
            }],
            initial_states: Expression::mk_and(
                s(0),
                Expression::mk_eq(Expression::mk_var("d"), Expression::mk_int(0)),
            ),
            ..Default::default()
        }
    }

    /// Two modules synchronising on `tick`: the first sets its flag, the
    /// second flips a fair coin. Both set, the system deadlocks.
    fn sync_program() -> Program {
        Program {
            model_type: ModelType::Dtmc,
            actions: vec!["tick".to_string()],
            modules: vec![
                Module::new(
                    "setter",
                    vec![],
                    vec![BooleanVariable::new("a")],
                    vec![Command::deterministic(
                        Some(0),
                        Expression::mk_not(Expression::mk_var("a")),
                        vec![Assignment::new("a", Expression::mk_bool(true))],
                    )],
                ),
                Module::new(
                    "coin",
                    vec![],
                    vec![BooleanVariable::new("b")],
                    vec![Command::new(
                        Some(0),
                        Expression::mk_not(Expression::mk_var("b")),
                        vec![
                            Update::new(
                                Expression::mk_rational(1, 2),
                                vec![Assignment::new("b", Expression::mk_bool(false))],
                            ),
                            Update::new(
                                Expression::mk_rational(1, 2),
                                vec![Assignment::new("b", Expression::mk_bool(true))],
                            ),
                        ],
                    )],
                ),
            ],
            initial_states: Expression::mk_and(
                Expression::mk_not(Expression::mk_var("a")),
                Expression::mk_not(Expression::mk_var("b")),
            ),
            ..Default::default()
        }
    }

    /// An MDP with a local choice in the first module and an interleaved
    /// second module.
    fn choice_mdp() -> Program {
        Program {
            model_type: ModelType::Mdp,
            modules: vec![
                Module::new(
                    "chooser",
                    vec![IntegerVariable::with_range("x", 0, 1)],
                    vec![],
                    vec![
                        Command::deterministic(
                            None,
                            Expression::mk_eq(Expression::mk_var("x"), Expression::mk_int(0)),
                            vec![set("x", 1)],
                        ),
                        Command::deterministic(
                            None,
                            Expression::mk_eq(Expression::mk_var("x"), Expression::mk_int(0)),
                            vec![set("x", 0)],
                        ),
                    ],
                ),
                Module::new(
                    "stepper",
                    vec![IntegerVariable::with_range("y", 0, 1)],
                    vec![],
                    vec![Command::deterministic(
                        None,
                        Expression::mk_eq(Expression::mk_var("y"), Expression::mk_int(0)),
                        vec![set("y", 1)],
                    )],
                ),
            ],
            initial_states: Expression::mk_and(
                Expression::mk_eq(Expression::mk_var("x"), Expression::mk_int(0)),
                Expression::mk_eq(Expression::mk_var("y"), Expression::mk_int(0)),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn die_has_thirteen_states_and_twenty_transitions() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&die_program()).unwrap();
        assert_eq!(model.model_type(), ModelType::Dtmc);
        assert_eq!(model.state_count(), 13);
        assert_eq!(model.transition_count(), 20);
        assert!(builder.warnings().is_empty());
    }

    #[test]
    fn die_rows_are_stochastic() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&die_program()).unwrap();
        let components = model.components();
        // Row sums are exactly one on reachable states and zero elsewhere.
        let row_sums = components
            .transitions
            .sum_abstract(&components.column_variables);
        assert_eq!(row_sums, components.reachable_states.to_add());
    }

    #[test]
    fn die_successors_stay_reachable() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&die_program()).unwrap();
        let components = model.components();
        let successors = components
            .transitions
            .not_zero()
            .exists_abstract(&components.row_variables)
            .swap_variables(&components.row_column_pairs);
        assert!(successors.and_not(&components.reachable_states).is_false());
        // No reachable state is left without an outgoing transition.
        let has_successor = components
            .transitions
            .not_zero()
            .exists_abstract(&components.column_variables);
        assert!(components.reachable_states.and_not(&has_successor).is_false());
    }

    #[test]
    fn die_keeps_unassigned_variables_unchanged() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&die_program()).unwrap();
        let components = model.components();
        let manager = &components.manager;
        // The first coin flip does not touch the die value.
        let from_start = components
            .transitions
            .not_zero()
            .and(&manager.encoding_bdd(components.row_variables[0], 0));
        let die_value_unchanged = manager.encoding_bdd(components.column_variables[1], 0);
        assert!(from_start.and_not(&die_value_unchanged).is_false());
    }

    #[test]
    fn die_state_rewards_count_transient_states() {
        let mut builder = ModelBuilder::new(BuildOptions {
            build_all_reward_models: true,
            ..Default::default()
        });
        let model = builder.build(&die_program()).unwrap();
        let reward = model.reward_model("coin_flips").unwrap();
        let state_rewards = reward.state_rewards.as_ref().unwrap();
        assert_eq!(state_rewards.max_value(), Rational64::from_integer(1));
        let components = model.components();
        assert_eq!(
            state_rewards.not_zero().sat_count(&components.row_variables),
            7
        );
        assert!(reward.state_action_rewards.is_none());
        assert!(reward.transition_rewards.is_none());
    }

    #[test]
    fn labels_are_published() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&die_program()).unwrap();
        assert!(model.label_expression("done").is_some());
        assert!(model.label_expression("start").is_some());
        assert!(model.label_expression("missing").is_none());
    }

    #[test]
    fn overlapping_dtmc_guards_are_renormalised() {
        let program = Program {
            model_type: ModelType::Dtmc,
            modules: vec![Module::new(
                "m",
                vec![IntegerVariable::with_range("x", 0, 1)],
                vec![],
                vec![
                    Command::deterministic(None, Expression::mk_bool(true), vec![set("x", 0)]),
                    Command::deterministic(None, Expression::mk_bool(true), vec![set("x", 1)]),
                ],
            )],
            initial_states: Expression::mk_eq(Expression::mk_var("x"), Expression::mk_int(0)),
            ..Default::default()
        };
        let mut builder = ModelBuilder::default();
        let model = builder.build(&program).unwrap();
        assert!(builder.warnings().contains(&BuildWarning::OverlappingGuards));
        // Two enabled commands resolve uniformly after normalisation.
        assert_eq!(
            model.components().transitions.max_value(),
            Rational64::new(1, 2)
        );
        assert_eq!(model.state_count(), 2);
    }

    #[test]
    fn ctmc_overlapping_guards_add_rates() {
        let guard = Expression::mk_eq(Expression::mk_var("x"), Expression::mk_int(0));
        let program = Program {
            model_type: ModelType::Ctmc,
            modules: vec![Module::new(
                "m",
                vec![IntegerVariable::with_range("x", 0, 1)],
                vec![],
                vec![
                    Command::new(
                        None,
                        guard.clone(),
                        vec![Update::new(Expression::mk_int(2), vec![set("x", 1)])],
                    ),
                    Command::new(
                        None,
                        guard.clone(),
                        vec![Update::new(Expression::mk_int(3), vec![set("x", 1)])],
                    ),
                ],
            )],
            initial_states: guard,
            ..Default::default()
        };
        let mut builder = ModelBuilder::default();
        let model = builder.build(&program).unwrap();
        // Rate addition is intentional for CTMCs, so no overlap warning;
        // the deadlock in the absorbing state is patched.
        assert!(!builder.warnings().contains(&BuildWarning::OverlappingGuards));
        assert!(builder
            .warnings()
            .contains(&BuildWarning::DeadlocksFixed { count: 1 }));
        assert_eq!(
            model.components().transitions.max_value(),
            Rational64::from_integer(5)
        );
    }

    #[test]
    fn synchronisation_multiplies_update_probabilities() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&sync_program()).unwrap();
        let components = model.components();
        let manager = &components.manager;

        assert_eq!(model.state_count(), 3);
        assert!(builder
            .warnings()
            .contains(&BuildWarning::DeadlocksFixed { count: 2 }));

        // (¬a, ¬b) steps to (a, b) with the coin module's half.
        let source = manager
            .encoding_bdd(components.row_variables[0], 0)
            .and(&manager.encoding_bdd(components.row_variables[1], 0));
        let target = manager
            .encoding_bdd(components.column_variables[0], 1)
            .and(&manager.encoding_bdd(components.column_variables[1], 1));
        let entry = components
            .transitions
            .times(&source.and(&target).to_add());
        assert_eq!(entry.max_value(), Rational64::new(1, 2));

        // The synchronised step requires both participants: no transition
        // leaves (a, ¬b), except for the patched self-loop.
        let stuck = manager
            .encoding_bdd(components.row_variables[0], 1)
            .and(&manager.encoding_bdd(components.row_variables[1], 0));
        let from_stuck = components.transitions.times(&stuck.to_add());
        let self_loop = manager
            .encoding_bdd(components.column_variables[0], 1)
            .and(&manager.encoding_bdd(components.column_variables[1], 0));
        assert!(from_stuck.not_zero().and_not(&self_loop).is_false());
    }

    #[test]
    fn mdp_partitions_choices_into_distinct_cubes() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&choice_mdp()).unwrap();
        let components = model.components();
        let manager = &components.manager;

        assert_eq!(model.state_count(), 4);
        assert_eq!(model.transition_count(), 7);
        // The pool allocated five nondeterminism variables; two survive.
        assert_eq!(model.nondeterminism_variables().len(), 2);

        // Every enabled (state, choice cube) row sums to exactly one.
        let row_sums = components
            .transitions
            .sum_abstract(&components.column_variables);
        assert_eq!(row_sums, row_sums.not_zero().to_add());

        // The all-zero cube in the initial state takes the first command.
        let nondet = model.nondeterminism_variables().to_vec();
        let initial_cube = components
            .initial_states
            .and(&manager.encoding_bdd(nondet[0], 0))
            .and(&manager.encoding_bdd(nondet[1], 0));
        let chosen = components.transitions.times(&initial_cube.to_add());
        let expected_target = manager
            .encoding_bdd(components.column_variables[0], 1)
            .and(&manager.encoding_bdd(components.column_variables[1], 0));
        assert!(!chosen.is_zero());
        assert!(chosen.not_zero().and_not(&expected_target).is_false());
    }

    #[test]
    fn mdp_deadlocks_are_patched_on_the_zero_cube() {
        let mut builder = ModelBuilder::default();
        let model = builder.build(&choice_mdp()).unwrap();
        let components = model.components();
        let manager = &components.manager;
        assert!(builder
            .warnings()
            .contains(&BuildWarning::DeadlocksFixed { count: 1 }));

        let stuck = manager
            .encoding_bdd(components.row_variables[0], 1)
            .and(&manager.encoding_bdd(components.row_variables[1], 1));
        let from_stuck = components.transitions.times(&stuck.to_add()).not_zero();
        let nondet = model.nondeterminism_variables().to_vec();
        let zero_cube = manager
            .encoding_bdd(nondet[0], 0)
            .and(&manager.encoding_bdd(nondet[1], 0));
        let self_loop = manager
            .encoding_bdd(components.column_variables[0], 1)
            .and(&manager.encoding_bdd(components.column_variables[1], 1));
        assert!(!from_stuck.is_false());
        assert!(from_stuck.and_not(&zero_cube.and(&self_loop)).is_false());
    }

    #[test]
    fn forbidden_deadlocks_fail_with_their_count() {
        let mut builder = ModelBuilder::new(BuildOptions {
            dont_fix_deadlocks: true,
            ..Default::default()
        });
        let result = builder.build(&sync_program());
        assert_eq!(result.err(), Some(BuildError::DeadlockForbidden { count: 2 }));
    }

    #[test]
    fn undefined_constants_are_fatal_and_listed() {
        let mut program = die_program();
        program.constants.push(Constant {
            name: "N".to_string(),
            const_type: ConstantType::Int,
            value: None,
        });
        let mut builder = ModelBuilder::default();
        let result = builder.build(&program);
        assert_eq!(
            result.err(),
            Some(BuildError::UndefinedConstant {
                names: "N (int)".to_string()
            })
        );

        // Supplying the definition makes the same program build.
        let mut builder = ModelBuilder::new(
            BuildOptions::new().define_constant("N", Expression::mk_int(3)),
        );
        assert!(builder.build(&program).is_ok());
    }

    #[test]
    fn unknown_model_types_are_rejected() {
        let mut program = die_program();
        program.model_type = ModelType::Unknown;
        let mut builder = ModelBuilder::default();
        let result = builder.build(&program);
        assert!(matches!(
            result,
            Err(BuildError::InvalidModelType { .. })
        ));
    }

    #[test]
    fn rebuilding_yields_an_isomorphic_model() {
        let program = die_program();
        let mut builder = ModelBuilder::default();
        let first = builder.build(&program).unwrap();
        let second = builder.build(&program).unwrap();
        assert_eq!(first.state_count(), second.state_count());
        assert_eq!(first.transition_count(), second.transition_count());
    }

    #[test]
    fn reordering_independent_modules_is_isomorphic() {
        let program = choice_mdp();
        let mut reordered = program.clone();
        reordered.modules.reverse();

        let mut builder = ModelBuilder::default();
        let original = builder.build(&program).unwrap();
        let swapped = builder.build(&reordered).unwrap();
        assert_eq!(original.state_count(), swapped.state_count());
        assert_eq!(original.transition_count(), swapped.transition_count());
        assert_eq!(
            original.nondeterminism_variables().len(),
            swapped.nondeterminism_variables().len()
        );
    }

    #[test]
    fn zero_rewards_do_not_change_the_matrix() {
        let mut program = die_program();
        let mut zero_reward = RewardStructure::new("nothing");
        zero_reward.state_rewards.push(StateReward {
            states: Expression::mk_bool(false),
            value: Expression::mk_int(1),
        });
        program.reward_structures.push(zero_reward);

        let mut builder = ModelBuilder::new(BuildOptions {
            build_all_reward_models: true,
            ..Default::default()
        });
        let with_reward = builder.build(&program).unwrap();
        assert!(builder.warnings().contains(&BuildWarning::AllZeroReward {
            reward_model: "nothing".to_string()
        }));

        let without = ModelBuilder::default().build(&die_program()).unwrap();
        assert_eq!(with_reward.state_count(), without.state_count());
        assert_eq!(with_reward.transition_count(), without.transition_count());
    }

    #[test]
    fn formulas_select_rewards_and_labels() {
        let mut program = die_program();
        program.reward_structures.push(RewardStructure::new("other"));

        let formula = Formula::Reward {
            reward_model: Some("coin_flips".to_string()),
            formula: Box::new(Formula::Eventually(Box::new(Formula::Label(
                "done".to_string(),
            )))),
        };
        let mut builder = ModelBuilder::new(BuildOptions::for_formula(&formula));
        let model = builder.build(&program).unwrap();

        assert!(model.reward_model("coin_flips").is_some());
        assert!(model.reward_model("other").is_none());
        // Only the labels the formula needs survive the selection.
        assert!(model.label_expression("done").is_some());
        assert!(model.label_expression("start").is_none());
    }

    #[test]
    fn expression_labels_are_published_under_their_text() {
        let predicate = Expression::mk_eq(Expression::mk_var("s"), Expression::mk_int(3));
        let formula = Formula::Probability(Box::new(Formula::Eventually(Box::new(
            Formula::Expression(predicate.clone()),
        ))));
        let mut builder = ModelBuilder::new(BuildOptions::for_formula(&formula));
        let model = builder.build(&die_program()).unwrap();
        assert_eq!(
            model.label_expression(&predicate.to_string()),
            Some(&predicate)
        );
    }

    #[test]
    fn dtmc_action_rewards_become_per_transition_expectations() {
        let mut program = sync_program();
        let mut reward = RewardStructure::new("ticks");
        reward.state_action_rewards.push(StateActionReward {
            action: Some(0),
            states: Expression::mk_bool(true),
            value: Expression::mk_int(3),
        });
        reward.transition_rewards.push(TransitionReward {
            action: Some(0),
            source_states: Expression::mk_bool(true),
            target_states: Expression::mk_var("b"),
            value: Expression::mk_int(2),
        });
        program.reward_structures.push(reward);

        let mut builder = ModelBuilder::new(BuildOptions {
            build_all_reward_models: true,
            ..Default::default()
        });
        let model = builder.build(&program).unwrap();
        let components = model.components();
        let manager = &components.manager;
        let reward = model.reward_model("ticks").unwrap();

        // The scaling divides the probability weight back out, so every
        // synchronised transition carries the full reward of three.
        let state_action = reward.state_action_rewards.as_ref().unwrap();
        assert_eq!(state_action.max_value(), Rational64::from_integer(3));

        // Transition rewards additionally filter on the target state.
        let transition = reward.transition_rewards.as_ref().unwrap();
        let source = manager
            .encoding_bdd(components.row_variables[0], 0)
            .and(&manager.encoding_bdd(components.row_variables[1], 0));
        let to_heads = manager.encoding_bdd(components.column_variables[1], 1);
        let rewarded = transition.times(&source.and(&to_heads).to_add());
        assert_eq!(rewarded.max_value(), Rational64::from_integer(2));
        let to_tails = manager.encoding_bdd(components.column_variables[1], 0);
        assert!(transition.times(&source.and(&to_tails).to_add()).is_zero());
    }
}
