use crate::builder::context::GenerationContext;
use crate::builder::{BuildError, BuildWarning, ModelBuilder};
use crate::dd::{Add, DdManager};
use crate::expression::ExpressionError;
use crate::program::{Command, ModelType, Module, Program, Update};
use num_rational::Rational64;
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

/// One action's contribution to one module: the 0/1 guard over row
/// variables, the transition diagram over row ∪ column (∪ nondeterminism)
/// variables, and the number of nondeterminism variables the encoding
/// consumed.
pub(crate) struct ActionDd {
    pub guard: Add,
    pub transitions: Add,
    pub used_nondet: usize,
}

impl ActionDd {
    pub fn empty(manager: &DdManager) -> Self {
        ActionDd {
            guard: manager.zero(),
            transitions: manager.zero(),
            used_nondet: 0,
        }
    }
}

/// A module's translation: the independent action, one [ActionDd] per
/// synchronising action label, and the module's identity diagram.
pub(crate) struct ModuleDd {
    pub independent: ActionDd,
    pub by_action: BTreeMap<usize, ActionDd>,
    pub identity: Add,
    pub used_nondet: usize,
}

impl ModelBuilder {
    /// Translate a single update under the given guard into a diagram
    /// encoding one deterministic successor for every guarded state.
    ///
    /// Variables of this module (and the globals) that the update does not
    /// assign are padded with their identity; variables of other modules
    /// are left untouched and get padded during composition.
    pub(crate) fn create_update_dd(
        &mut self,
        context: &GenerationContext,
        module: &Module,
        guard: &Add,
        update: &Update,
    ) -> Result<Add, BuildError> {
        let manager = &context.manager;
        let mut update_dd = manager.one();
        let mut assigned: HashSet<&str> = HashSet::new();

        for assignment in &update.assignments {
            assigned.insert(assignment.variable.as_str());

            let column = context.column_variable(&assignment.variable).ok_or_else(|| {
                ExpressionError::UnknownVariable {
                    name: assignment.variable.clone(),
                }
            })?;
            let written = manager.value_add(column);
            let value = context.row_adapter.translate(&assignment.expression)?;

            // Restrict the assigned value to the guarded region before
            // comparing, then again after: outside the guard both sides
            // collapse to zero and would spuriously compare equal.
            let contribution = value
                .times(guard)
                .equals(&written)
                .times(guard)
                .times(&manager.range_bdd(column).to_add());
            update_dd = update_dd.times(&contribution);
        }

        // Untouched global variables keep their value. This relies on the
        // (unchecked) assumption that global variables are only written by
        // independent commands.
        for name in &context.global_variables {
            if !assigned.contains(name.as_str()) {
                update_dd = update_dd.times(context.identity(name));
            }
        }

        // Untouched local variables keep their value.
        for name in module.variable_names() {
            if !assigned.contains(name.as_str()) {
                update_dd = update_dd.times(context.identity(&name));
            }
        }

        Ok(update_dd)
    }

    /// Translate one command into an [ActionDd]: the range-restricted
    /// guard and the likelihood-weighted sum of its update diagrams.
    pub(crate) fn create_command_dd(
        &mut self,
        context: &GenerationContext,
        module: &Module,
        command: &Command,
    ) -> Result<ActionDd, BuildError> {
        trace!(module = %module.name, guard = %command.guard, "translating command");
        let guard = context
            .row_adapter
            .translate(&command.guard)?
            .times(context.module_range(&module.name));
        if guard.is_zero() {
            self.warn(BuildWarning::UnsatisfiableGuard {
                module: module.name.clone(),
                guard: command.guard.to_string(),
            });
            return Ok(ActionDd::empty(&context.manager));
        }

        let mut command_dd = context.manager.zero();
        for update in &command.updates {
            let update_dd = self.create_update_dd(context, module, &guard, update)?;
            if update_dd.is_zero() {
                self.warn(BuildWarning::UpdateWithoutEffect {
                    module: module.name.clone(),
                    guard: command.guard.to_string(),
                });
            }
            let likelihood = context.row_adapter.translate(&update.likelihood)?;
            command_dd = command_dd.plus(&update_dd.times(&likelihood));
        }

        Ok(ActionDd {
            transitions: guard.times(&command_dd),
            guard,
            used_nondet: 0,
        })
    }

    /// Translate all commands of `module` relevant for `action` (`None`
    /// selects the independent commands) and combine them according to
    /// the model type.
    pub(crate) fn create_action_dd(
        &mut self,
        context: &GenerationContext,
        program: &Program,
        module: &Module,
        action: Option<usize>,
        nondeterminism_offset: usize,
    ) -> Result<ActionDd, BuildError> {
        let mut command_dds = Vec::new();
        for command in &module.commands {
            if command.action != action {
                continue;
            }
            command_dds.push(self.create_command_dd(context, module, command)?);
        }
        if command_dds.is_empty() {
            return Ok(ActionDd::empty(&context.manager));
        }
        match program.model_type {
            ModelType::Dtmc | ModelType::Ctmc => {
                Ok(self.combine_commands_dtmc(context, program.model_type, &command_dds))
            }
            ModelType::Mdp => {
                Ok(self.combine_commands_mdp(context, &command_dds, nondeterminism_offset))
            }
            ModelType::Unknown => Err(BuildError::InvalidModelType {
                model_type: program.model_type,
            }),
        }
    }

    /// DTMC/CTMC combination: guards and guarded transitions add up. For
    /// a CTMC overlapping guards are rate addition; otherwise they are
    /// reported (the row is later renormalised).
    fn combine_commands_dtmc(
        &mut self,
        context: &GenerationContext,
        model_type: ModelType,
        command_dds: &[ActionDd],
    ) -> ActionDd {
        let mut all_guards = context.manager.zero();
        let mut all_commands = context.manager.zero();
        for command_dd in command_dds {
            let overlap = command_dd.guard.times(&all_guards);
            if !overlap.is_zero() && model_type != ModelType::Ctmc {
                self.warn(BuildWarning::OverlappingGuards);
            }
            all_guards = all_guards.plus(&command_dd.guard);
            all_commands = all_commands.plus(&command_dd.guard.times(&command_dd.transitions));
        }
        ActionDd {
            guard: all_guards,
            transitions: all_commands,
            used_nondet: 0,
        }
    }

    /// MDP combination: partition the enabled commands of every state
    /// into local-choice slots and encode the slot index over fresh
    /// binary nondeterminism variables starting at `offset`.
    fn combine_commands_mdp(
        &mut self,
        context: &GenerationContext,
        command_dds: &[ActionDd],
        offset: usize,
    ) -> ActionDd {
        let manager = &context.manager;
        let one = manager.one();

        // The sum of guards counts the enabled local choices per state.
        let mut sum_of_guards = manager.zero();
        let mut all_guards = manager.zero();
        for command_dd in command_dds {
            sum_of_guards = sum_of_guards.plus(&command_dd.guard);
            all_guards = all_guards.max(&command_dd.guard);
        }
        let max_choices = sum_of_guards.max_value().to_integer() as usize;
        trace!(max_choices, "combining MDP commands");

        if max_choices == 0 {
            return ActionDd::empty(manager);
        }
        if max_choices == 1 {
            let mut all_commands = manager.zero();
            for command_dd in command_dds {
                all_commands = all_commands.plus(&command_dd.transitions);
            }
            return ActionDd {
                guard: sum_of_guards,
                transitions: all_commands,
                used_nondet: offset,
            };
        }

        let width = (usize::BITS - (max_choices - 1).leading_zeros()) as usize;
        let mut all_commands = manager.zero();
        let mut remaining_sum = sum_of_guards;

        for current_choices in 1..=max_choices {
            let choice_count =
                manager.constant(Rational64::from_integer(current_choices as i64));
            let equals_count = remaining_sum.equals(&choice_count);
            if equals_count.is_zero() {
                continue;
            }

            // Partition the states with exactly `current_choices` enabled
            // commands: iterate commands in source order and give each
            // one the lowest slot that still has unclaimed states.
            let mut choice_dds = vec![manager.zero(); current_choices];
            let mut remaining_dds = vec![equals_count.clone(); current_choices];
            for command_dd in command_dds {
                let mut guard_intersection = command_dd.guard.times(&equals_count);
                if guard_intersection.is_zero() {
                    continue;
                }
                for slot in 0..current_choices {
                    let claimed = guard_intersection.times(&remaining_dds[slot]);
                    if !claimed.is_zero() {
                        remaining_dds[slot] =
                            remaining_dds[slot].times(&one.minus(&claimed));
                        choice_dds[slot] =
                            choice_dds[slot].plus(&claimed.times(&command_dd.transitions));
                    }
                    guard_intersection = guard_intersection.times(&one.minus(&claimed));
                    if guard_intersection.is_zero() {
                        break;
                    }
                }
            }

            for (slot, choice_dd) in choice_dds.iter().enumerate() {
                let encoding = encode_choice(context, offset, width, slot);
                all_commands = all_commands.plus(&encoding.times(choice_dd));
            }

            remaining_sum = remaining_sum.times(&one.minus(&equals_count));
        }

        ActionDd {
            guard: all_guards,
            transitions: all_commands,
            used_nondet: offset + width,
        }
    }

    /// Build the [ModuleDd] of one module. Synchronising actions start
    /// their choice encodings at the offsets accumulated by the
    /// composition fold; the independent action always starts at zero
    /// (interleaving introduces its own selector variables).
    pub(crate) fn create_module_dd(
        &mut self,
        context: &GenerationContext,
        program: &Program,
        module: &Module,
        offsets: &BTreeMap<usize, usize>,
    ) -> Result<ModuleDd, BuildError> {
        let independent = self.create_action_dd(context, program, module, None, 0)?;
        let mut used_nondet = independent.used_nondet;

        let mut by_action = BTreeMap::new();
        for action_index in module.action_indices() {
            trace!(
                module = %module.name,
                action = %program.action_name(action_index),
                "translating action"
            );
            let action_dd = self.create_action_dd(
                context,
                program,
                module,
                Some(action_index),
                offsets[&action_index],
            )?;
            used_nondet = used_nondet.max(action_dd.used_nondet);
            by_action.insert(action_index, action_dd);
        }

        Ok(ModuleDd {
            independent,
            by_action,
            identity: context.module_identity(&module.name).clone(),
            used_nondet,
        })
    }
}

/// The cube fixing the `width` nondeterminism variables starting at
/// `offset` to the big-endian binary encoding of `value`.
pub(crate) fn encode_choice(
    context: &GenerationContext,
    offset: usize,
    width: usize,
    value: usize,
) -> Add {
    let manager = &context.manager;
    let mut cube = manager.one();
    for position in 0..width {
        let bit = (value >> (width - 1 - position)) & 1;
        let variable = context.nondeterminism_variables[offset + position];
        cube = cube.times(&manager.encoding_bdd(variable, bit as i64).to_add());
    }
    cube
}

/// Synchronised combination: both modules must take the action together,
/// so guards and transitions multiply.
pub(crate) fn combine_sync(action1: ActionDd, action2: &ActionDd) -> ActionDd {
    ActionDd {
        guard: action1.guard.times(&action2.guard),
        transitions: action1.transitions.times(&action2.transitions),
        used_nondet: action1.used_nondet.max(action2.used_nondet),
    }
}

/// Unsynchronised combination: each side is padded with the other
/// module's identity. For a DTMC/CTMC the two interleave additively; for
/// an MDP a fresh selector variable resolves between them after both
/// sides are padded to the same nondeterminism width.
pub(crate) fn combine_unsync(
    context: &GenerationContext,
    model_type: ModelType,
    action1: &ActionDd,
    action2: &ActionDd,
    identity1: &Add,
    identity2: &Add,
) -> Result<ActionDd, BuildError> {
    let extended1 = action1.transitions.times(identity2);
    let extended2 = action2.transitions.times(identity1);

    match model_type {
        ModelType::Dtmc | ModelType::Ctmc => Ok(ActionDd {
            guard: action1.guard.plus(&action2.guard),
            transitions: extended1.plus(&extended2),
            used_nondet: 0,
        }),
        ModelType::Mdp => {
            if action1.transitions.is_zero() {
                return Ok(ActionDd {
                    guard: action2.guard.clone(),
                    transitions: extended2,
                    used_nondet: action2.used_nondet,
                });
            }
            if action2.transitions.is_zero() {
                return Ok(ActionDd {
                    guard: action1.guard.clone(),
                    transitions: extended1,
                    used_nondet: action1.used_nondet,
                });
            }

            // Bring both sides to the same nondeterminism width, then
            // resolve between them with a fresh variable.
            let used_nondet = action1.used_nondet.max(action2.used_nondet);
            let extended1 = extended1.times(&context.nondeterminism_zero_cube(
                action1.used_nondet,
                used_nondet,
            ));
            let extended2 = extended2.times(&context.nondeterminism_zero_cube(
                action2.used_nondet,
                used_nondet,
            ));

            let selector = context.manager.encoding_bdd(
                context.nondeterminism_variables[used_nondet],
                1,
            );
            let transitions = selector.to_add().ite(&extended2, &extended1);

            Ok(ActionDd {
                guard: action1.guard.max(&action2.guard),
                transitions,
                used_nondet: used_nondet + 1,
            })
        }
        ModelType::Unknown => Err(BuildError::InvalidModelType { model_type }),
    }
}
