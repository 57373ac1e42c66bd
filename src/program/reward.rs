use crate::expression::Expression;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// A `(predicate, value)` state reward entry: every state satisfying
/// `states` earns `value`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateReward {
    pub states: Expression,
    pub value: Expression,
}

/// A state-action reward entry: taking the given action (or any
/// independent command when `action` is `None`) from a state satisfying
/// `states` earns `value`.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateActionReward {
    pub action: Option<usize>,
    pub states: Expression,
    pub value: Expression,
}

/// A transition reward entry: a transition under the given action from a
/// state satisfying `source_states` to a state satisfying `target_states`
/// earns `value`.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitionReward {
    pub action: Option<usize>,
    pub source_states: Expression,
    pub target_states: Expression,
    pub value: Expression,
}

/// A named reward structure: three disjoint lists of state, state-action
/// and transition reward entries.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RewardStructure {
    pub name: String,
    #[serde(default)]
    pub state_rewards: Vec<StateReward>,
    #[serde(default)]
    pub state_action_rewards: Vec<StateActionReward>,
    #[serde(default)]
    pub transition_rewards: Vec<TransitionReward>,
}

impl RewardStructure {
    pub fn new(name: &str) -> Self {
        RewardStructure {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn has_state_rewards(&self) -> bool {
        !self.state_rewards.is_empty()
    }

    pub fn has_state_action_rewards(&self) -> bool {
        !self.state_action_rewards.is_empty()
    }

    pub fn has_transition_rewards(&self) -> bool {
        !self.transition_rewards.is_empty()
    }
}
