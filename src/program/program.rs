use crate::expression::Expression;
use crate::program::{BooleanVariable, IntegerVariable, Module, RewardStructure};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::fmt;

/// The kind of probabilistic model a program describes.
///
/// `Unknown` is the catch-all for model kinds this builder does not
/// support; foreign JSON deserialises into it instead of failing, and the
/// builder reports an invalid-model-type error.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Dtmc,
    Ctmc,
    Mdp,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelType::Dtmc => write!(f, "DTMC"),
            ModelType::Ctmc => write!(f, "CTMC"),
            ModelType::Mdp => write!(f, "MDP"),
            ModelType::Unknown => write!(f, "unknown"),
        }
    }
}

/// The declared type of a [Constant].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConstantType {
    Bool,
    Int,
    Rational,
}

impl fmt::Display for ConstantType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstantType::Bool => write!(f, "bool"),
            ConstantType::Int => write!(f, "int"),
            ConstantType::Rational => write!(f, "rational"),
        }
    }
}

/// A named constant, optionally carrying a defining expression. Constants
/// without a definition must be supplied through the build options before
/// translation.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    pub name: String,
    pub const_type: ConstantType,
    pub value: Option<Expression>,
}

/// A named state predicate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub name: String,
    pub predicate: Expression,
}

impl Label {
    pub fn new(name: &str, predicate: Expression) -> Self {
        Label {
            name: name.to_string(),
            predicate,
        }
    }
}

/// A guarded-command probabilistic program: a parallel composition of
/// [Module]s over shared global variables, synchronising on a finite
/// action alphabet.
///
/// [Command::action](crate::program::Command) values index into `actions`.
/// The program is a read-only AST; the builder never mutates it, and
/// constant substitution produces a fresh program.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Program {
    pub model_type: ModelType,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub global_integer_variables: Vec<IntegerVariable>,
    #[serde(default)]
    pub global_boolean_variables: Vec<BooleanVariable>,
    /// Human names of the synchronising actions; the alphabet of the
    /// parallel composition.
    #[serde(default)]
    pub actions: Vec<String>,
    pub modules: Vec<Module>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub reward_structures: Vec<RewardStructure>,
    /// Boolean expression over the program variables selecting the
    /// initial states.
    pub initial_states: Expression,
}

impl Default for Program {
    fn default() -> Self {
        Program {
            model_type: ModelType::Dtmc,
            constants: Vec::new(),
            global_integer_variables: Vec::new(),
            global_boolean_variables: Vec::new(),
            actions: Vec::new(),
            modules: Vec::new(),
            labels: Vec::new(),
            reward_structures: Vec::new(),
            initial_states: Expression::mk_bool(true),
        }
    }
}

impl Program {
    /// Parse a program from its JSON form.
    pub fn from_json_string(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialise the program into JSON.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The human name of an action index.
    pub fn action_name(&self, index: usize) -> &str {
        &self.actions[index]
    }

    /// Names of all global variables in meta-variable allocation order
    /// (integers first, then Booleans).
    pub fn global_variable_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for variable in &self.global_integer_variables {
            names.push(variable.name.clone());
        }
        for variable in &self.global_boolean_variables {
            names.push(variable.name.clone());
        }
        names
    }

    /// Constants that neither carry a defining expression nor appear in
    /// the supplied definitions.
    pub fn undefined_constants(
        &self,
        definitions: &HashMap<String, Expression>,
    ) -> Vec<&Constant> {
        self.constants
            .iter()
            .filter(|constant| constant.value.is_none() && !definitions.contains_key(&constant.name))
            .collect()
    }

    /// Produce a copy of the program with every constant reference
    /// replaced by its defining expression. Supplied `definitions` win
    /// over declared values. Constants may reference previously declared
    /// constants; the chain is resolved in declaration order.
    #[must_use]
    pub fn substitute_constants(&self, definitions: &HashMap<String, Expression>) -> Program {
        let mut resolved: HashMap<String, Expression> = HashMap::new();
        for constant in &self.constants {
            let definition = definitions
                .get(&constant.name)
                .or(constant.value.as_ref())
                .cloned();
            if let Some(definition) = definition {
                resolved.insert(constant.name.clone(), definition.substitute(&resolved));
            }
        }
        self.map_expressions(&|expression| expression.substitute(&resolved))
    }

    /// Apply `f` to every expression embedded in the program.
    fn map_expressions(&self, f: &impl Fn(&Expression) -> Expression) -> Program {
        let map_integer = |variable: &IntegerVariable| IntegerVariable {
            name: variable.name.clone(),
            lower_bound: f(&variable.lower_bound),
            upper_bound: f(&variable.upper_bound),
        };
        Program {
            model_type: self.model_type,
            constants: self.constants.clone(),
            global_integer_variables: self.global_integer_variables.iter().map(map_integer).collect(),
            global_boolean_variables: self.global_boolean_variables.clone(),
            actions: self.actions.clone(),
            modules: self
                .modules
                .iter()
                .map(|module| Module {
                    name: module.name.clone(),
                    integer_variables: module.integer_variables.iter().map(map_integer).collect(),
                    boolean_variables: module.boolean_variables.clone(),
                    commands: module
                        .commands
                        .iter()
                        .map(|command| crate::program::Command {
                            action: command.action,
                            guard: f(&command.guard),
                            updates: command
                                .updates
                                .iter()
                                .map(|update| crate::program::Update {
                                    likelihood: f(&update.likelihood),
                                    assignments: update
                                        .assignments
                                        .iter()
                                        .map(|assignment| crate::program::Assignment {
                                            variable: assignment.variable.clone(),
                                            expression: f(&assignment.expression),
                                        })
                                        .collect(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
            labels: self
                .labels
                .iter()
                .map(|label| Label {
                    name: label.name.clone(),
                    predicate: f(&label.predicate),
                })
                .collect(),
            reward_structures: self
                .reward_structures
                .iter()
                .map(|reward| RewardStructure {
                    name: reward.name.clone(),
                    state_rewards: reward
                        .state_rewards
                        .iter()
                        .map(|entry| crate::program::StateReward {
                            states: f(&entry.states),
                            value: f(&entry.value),
                        })
                        .collect(),
                    state_action_rewards: reward
                        .state_action_rewards
                        .iter()
                        .map(|entry| crate::program::StateActionReward {
                            action: entry.action,
                            states: f(&entry.states),
                            value: f(&entry.value),
                        })
                        .collect(),
                    transition_rewards: reward
                        .transition_rewards
                        .iter()
                        .map(|entry| crate::program::TransitionReward {
                            action: entry.action,
                            source_states: f(&entry.source_states),
                            target_states: f(&entry.target_states),
                            value: f(&entry.value),
                        })
                        .collect(),
                })
                .collect(),
            initial_states: f(&self.initial_states),
        }
    }
}
