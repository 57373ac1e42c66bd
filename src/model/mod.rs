//! The symbolic model produced by the builder.

use crate::dd::{Add, Bdd, DdManager, MetaVariableId};
use crate::expression::Expression;
use crate::program::ModelType;
use std::collections::HashMap;

/// The diagrams of one named reward structure. Each component is present
/// exactly when the source structure declared entries of that kind.
#[derive(Clone, Debug)]
pub struct RewardModel {
    /// State rewards over row meta-variables.
    pub state_rewards: Option<Add>,
    /// State-action rewards over row (and, for MDPs, synchronisation and
    /// nondeterminism) meta-variables.
    pub state_action_rewards: Option<Add>,
    /// Transition rewards over row and column meta-variables.
    pub transition_rewards: Option<Add>,
}

impl RewardModel {
    /// Multiply every component with the given 0/1 diagram; used to cut
    /// rewards to the reachable fragment.
    pub(crate) fn restrict(&self, states: &Add) -> RewardModel {
        RewardModel {
            state_rewards: self.state_rewards.as_ref().map(|dd| dd.times(states)),
            state_action_rewards: self
                .state_action_rewards
                .as_ref()
                .map(|dd| dd.times(states)),
            transition_rewards: self.transition_rewards.as_ref().map(|dd| dd.times(states)),
        }
    }
}

/// The components shared by all model types.
#[derive(Clone, Debug)]
pub struct ModelComponents {
    /// The manager owning every diagram below.
    pub manager: DdManager,
    pub reachable_states: Bdd,
    pub initial_states: Bdd,
    /// The transition matrix (probabilities or rates) over row, column
    /// and, for MDPs, nondeterminism meta-variables.
    pub transitions: Add,
    pub row_variables: Vec<MetaVariableId>,
    pub column_variables: Vec<MetaVariableId>,
    pub row_column_pairs: Vec<(MetaVariableId, MetaVariableId)>,
    /// Named state predicates of the source program.
    pub labels: HashMap<String, Expression>,
    pub reward_models: HashMap<String, RewardModel>,
}

/// A symbolic probabilistic model, tagged by its kind. The MDP variant
/// additionally carries the nondeterminism meta-variables (including the
/// synchronisation variables) actually used by the transition diagram.
#[derive(Clone, Debug)]
pub enum SymbolicModel {
    Dtmc(ModelComponents),
    Ctmc(ModelComponents),
    Mdp {
        components: ModelComponents,
        nondeterminism_variables: Vec<MetaVariableId>,
    },
}

impl SymbolicModel {
    pub fn model_type(&self) -> ModelType {
        match self {
            SymbolicModel::Dtmc(_) => ModelType::Dtmc,
            SymbolicModel::Ctmc(_) => ModelType::Ctmc,
            SymbolicModel::Mdp { .. } => ModelType::Mdp,
        }
    }

    pub fn components(&self) -> &ModelComponents {
        match self {
            SymbolicModel::Dtmc(components) | SymbolicModel::Ctmc(components) => components,
            SymbolicModel::Mdp { components, .. } => components,
        }
    }

    /// The nondeterminism meta-variables of an MDP; empty otherwise.
    pub fn nondeterminism_variables(&self) -> &[MetaVariableId] {
        match self {
            SymbolicModel::Mdp {
                nondeterminism_variables,
                ..
            } => nondeterminism_variables,
            _ => &[],
        }
    }

    /// Number of reachable states.
    pub fn state_count(&self) -> u64 {
        let components = self.components();
        components
            .reachable_states
            .sat_count(&components.row_variables)
    }

    /// Number of non-zero entries of the transition diagram (for MDPs,
    /// one per state/choice/successor triple).
    pub fn transition_count(&self) -> u64 {
        let components = self.components();
        let mut variables = components.row_variables.clone();
        variables.extend_from_slice(&components.column_variables);
        variables.extend_from_slice(self.nondeterminism_variables());
        components.transitions.not_zero().sat_count(&variables)
    }

    pub fn label_expression(&self, name: &str) -> Option<&Expression> {
        self.components().labels.get(name)
    }

    pub fn reward_model(&self, name: &str) -> Option<&RewardModel> {
        self.components().reward_models.get(name)
    }
}
