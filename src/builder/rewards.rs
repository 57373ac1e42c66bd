use crate::builder::action::ModuleDd;
use crate::builder::context::GenerationContext;
use crate::builder::{BuildError, BuildWarning, ModelBuilder};
use crate::dd::Add;
use crate::model::RewardModel;
use crate::program::{ModelType, Program, RewardStructure};
use num_rational::Rational64;
use num_traits::Zero;

impl ModelBuilder {
    /// Build the diagrams of one reward structure.
    ///
    /// Must run against the *full* transition matrix, before the
    /// reachability cut: the DTMC scaling divides by the matrix, which
    /// must not be zero anywhere a reward is attached.
    pub(crate) fn create_reward_model(
        &mut self,
        context: &GenerationContext,
        program: &Program,
        reward: &RewardStructure,
        global_module: &ModuleDd,
        full_matrix: &Add,
    ) -> Result<RewardModel, BuildError> {
        let manager = &context.manager;
        let is_mdp = program.model_type == ModelType::Mdp;
        let is_dtmc = program.model_type == ModelType::Dtmc;

        let state_rewards = if reward.has_state_rewards() {
            let mut accumulated = manager.zero();
            for entry in &reward.state_rewards {
                let states = context.row_adapter.translate(&entry.states)?;
                let values = context.row_adapter.translate(&entry.value)?;
                let rewards = states.times(&values);
                self.check_reward_entry(&reward.name, &rewards);
                accumulated = accumulated.plus(&rewards);
            }
            Some(accumulated)
        } else {
            None
        };

        let state_action_rewards = if reward.has_state_action_rewards() {
            let mut accumulated = manager.zero();
            for entry in &reward.state_action_rewards {
                let states = context.row_adapter.translate(&entry.states)?;
                let values = context.row_adapter.translate(&entry.value)?;
                let transitions = self.action_transitions(context, global_module, entry.action);
                let synchronization = if is_mdp {
                    context.synchronization_cube(entry.action)
                } else {
                    manager.one()
                };
                let entry_dd = synchronization.times(&states).times(&values);
                // For DTMCs keep the probability weight: the later
                // normalisation divides it back out, leaving an expected
                // reward per transition. Elsewhere only mask by the
                // existence of a transition.
                let entry_dd = if is_dtmc {
                    transitions.times(&entry_dd)
                } else {
                    transitions.not_zero().to_add().times(&entry_dd)
                };
                self.check_reward_entry(&reward.name, &entry_dd);
                accumulated = accumulated.plus(&entry_dd);
            }
            if is_dtmc {
                accumulated = accumulated.divide(full_matrix);
            }
            Some(accumulated)
        } else {
            None
        };

        let transition_rewards = if reward.has_transition_rewards() {
            let mut accumulated = manager.zero();
            for entry in &reward.transition_rewards {
                let source_states = context.row_adapter.translate(&entry.source_states)?;
                let target_states = context.column_adapter.translate(&entry.target_states)?;
                let values = context.row_adapter.translate(&entry.value)?;
                let transitions = self.action_transitions(context, global_module, entry.action);
                let synchronization = if is_mdp {
                    context.synchronization_cube(entry.action)
                } else {
                    manager.one()
                };
                let entry_dd = synchronization
                    .times(&source_states)
                    .times(&target_states)
                    .times(&values);
                let entry_dd = if is_dtmc {
                    transitions.times(&entry_dd)
                } else {
                    transitions.not_zero().to_add().times(&entry_dd)
                };
                self.check_reward_entry(&reward.name, &entry_dd);
                accumulated = accumulated.plus(&entry_dd);
            }
            if is_dtmc {
                accumulated = accumulated.divide(full_matrix);
            }
            Some(accumulated)
        } else {
            None
        };

        Ok(RewardModel {
            state_rewards,
            state_action_rewards,
            transition_rewards,
        })
    }

    /// The composed transition diagram of the given action label, or of
    /// the independent action for `None`.
    fn action_transitions(
        &self,
        context: &GenerationContext,
        global_module: &ModuleDd,
        action: Option<usize>,
    ) -> Add {
        match action {
            Some(index) => global_module
                .by_action
                .get(&index)
                .map(|action_dd| action_dd.transitions.clone())
                .unwrap_or_else(|| context.manager.zero()),
            None => global_module.independent.transitions.clone(),
        }
    }

    fn check_reward_entry(&mut self, reward_model: &str, rewards: &Add) {
        if rewards.min_value() < Rational64::zero() {
            self.warn(BuildWarning::NegativeReward {
                reward_model: reward_model.to_string(),
            });
        }
        if rewards.is_zero() {
            self.warn(BuildWarning::AllZeroReward {
                reward_model: reward_model.to_string(),
            });
        }
    }
}
