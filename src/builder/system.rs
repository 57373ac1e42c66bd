use crate::builder::action::{ActionDd, ModuleDd, combine_sync, combine_unsync};
use crate::builder::context::GenerationContext;
use crate::builder::{BuildError, ModelBuilder};
use crate::dd::{Add, Bdd};
use crate::program::{ModelType, Program};
use std::collections::BTreeMap;
use tracing::trace;

impl ModelBuilder {
    /// Fold all modules into one system [ModuleDd] and assemble the full
    /// transition diagram. For DTMCs the result is row-normalised; for
    /// MDPs the caller trims the nondeterminism variable set down to
    /// the returned module's `used_nondet`.
    pub(crate) fn create_system_dd(
        &mut self,
        context: &GenerationContext,
        program: &Program,
    ) -> Result<(Add, ModuleDd), BuildError> {
        assert!(!program.modules.is_empty(), "program has no modules");

        let mut offsets: BTreeMap<usize, usize> =
            (0..program.actions.len()).map(|index| (index, 0)).collect();

        trace!(module = %program.modules[0].name, "translating first module");
        let mut system =
            self.create_module_dd(context, program, &program.modules[0], &offsets)?;

        for module in &program.modules[1..] {
            trace!(module = %module.name, "translating and composing module");

            // Synchronising actions already present in the system must
            // encode the next module's choices over fresh variables.
            for index in 0..program.actions.len() {
                if let Some(action) = system.by_action.get(&index) {
                    offsets.insert(index, action.used_nondet);
                }
            }
            let next = self.create_module_dd(context, program, module, &offsets)?;
            let mut used_nondet = next.used_nondet;

            let system_identity = system.identity.clone();

            // Independent actions interleave.
            system.independent = combine_unsync(
                context,
                program.model_type,
                &system.independent,
                &next.independent,
                &system_identity,
                &next.identity,
            )?;
            used_nondet = used_nondet.max(system.independent.used_nondet);

            // Actions the next module does not declare keep running with
            // the next module's variables unchanged.
            for (index, action) in system.by_action.iter_mut() {
                if !next.by_action.contains_key(index) {
                    let empty = ActionDd::empty(&context.manager);
                    *action = combine_unsync(
                        context,
                        program.model_type,
                        action,
                        &empty,
                        &system_identity,
                        &next.identity,
                    )?;
                }
            }

            // Actions of the next module synchronise with the system
            // where both declare them and are padded otherwise.
            for (index, next_action) in next.by_action {
                let combined = match system.by_action.remove(&index) {
                    Some(existing) => combine_sync(existing, &next_action),
                    None => {
                        let empty = ActionDd::empty(&context.manager);
                        combine_unsync(
                            context,
                            program.model_type,
                            &empty,
                            &next_action,
                            &system_identity,
                            &next.identity,
                        )?
                    }
                };
                used_nondet = used_nondet.max(combined.used_nondet);
                system.by_action.insert(index, combined);
            }

            system.identity = system.identity.times(&next.identity);
            system.used_nondet = system.used_nondet.max(used_nondet);
        }

        let mut transitions = self.create_system_from_module(context, program, &system)?;

        // A DTMC row may sum above one when several commands are enabled;
        // the division resolves the choice uniformly. Rows without any
        // transition stay zero.
        if program.model_type == ModelType::Dtmc {
            let row_sums = transitions.sum_abstract(&context.column_variables);
            transitions = transitions.divide(&row_sums);
        }

        Ok((transitions, system))
    }

    /// Combine all actions of the composed system into one transition
    /// diagram, tagging every action with its synchronisation cube and
    /// padding all encodings to the same nondeterminism width.
    fn create_system_from_module(
        &mut self,
        context: &GenerationContext,
        program: &Program,
        module: &ModuleDd,
    ) -> Result<Add, BuildError> {
        match program.model_type {
            ModelType::Mdp => {
                let width = module.used_nondet;
                let mut result = module
                    .independent
                    .transitions
                    .times(&context.nondeterminism_zero_cube(
                        module.independent.used_nondet,
                        width,
                    ))
                    .times(&context.synchronization_cube(None));
                for (index, action) in &module.by_action {
                    let padded = action
                        .transitions
                        .times(&context.nondeterminism_zero_cube(action.used_nondet, width))
                        .times(&context.synchronization_cube(Some(*index)));
                    result = result.plus(&padded);
                }
                Ok(result)
            }
            ModelType::Dtmc | ModelType::Ctmc => {
                let mut result = module.independent.transitions.clone();
                for action in module.by_action.values() {
                    result = result.plus(&action.transitions);
                }
                Ok(result)
            }
            ModelType::Unknown => Err(BuildError::InvalidModelType {
                model_type: program.model_type,
            }),
        }
    }

    /// The initial-states BDD: the program's initial condition conjoined
    /// with the range of every row meta-variable.
    pub(crate) fn create_initial_states(
        &self,
        context: &GenerationContext,
        program: &Program,
    ) -> Result<Bdd, BuildError> {
        let mut initial = context
            .row_adapter
            .translate(&program.initial_states)?
            .to_bdd();
        for variable in &context.row_variables {
            initial = initial.and(&context.manager.range_bdd(*variable));
        }
        Ok(initial)
    }

    /// Symbolic BFS from the initial states along the (nondeterminism-
    /// abstracted) transition relation.
    pub(crate) fn compute_reachable_states(
        &self,
        context: &GenerationContext,
        initial_states: &Bdd,
        transitions: &Bdd,
    ) -> Bdd {
        let mut reachable = initial_states.clone();
        let mut iteration = 0u64;
        loop {
            iteration += 1;
            trace!(iteration, "reachability iteration");
            let successors = reachable
                .and_exists(transitions, &context.row_variables)
                .swap_variables(&context.row_column_pairs);
            let fresh = successors.and_not(&reachable);
            if fresh.is_false() {
                return reachable;
            }
            reachable = reachable.or(&fresh);
        }
    }
}
