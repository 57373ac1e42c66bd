use crate::expression::Expression;
use crate::program::{BooleanVariable, IntegerVariable};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeSet;

/// A single `variable := expression` assignment inside an [Update].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub variable: String,
    pub expression: Expression,
}

impl Assignment {
    pub fn new(variable: &str, expression: Expression) -> Self {
        Assignment {
            variable: variable.to_string(),
            expression,
        }
    }
}

/// One probabilistic branch of a [Command]: a likelihood expression (a
/// probability for DTMC/MDP, a rate for CTMC) and the assignments applied
/// when the branch is taken. Variables without an assignment keep their
/// value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Update {
    pub likelihood: Expression,
    pub assignments: Vec<Assignment>,
}

impl Update {
    pub fn new(likelihood: Expression, assignments: Vec<Assignment>) -> Self {
        Update {
            likelihood,
            assignments,
        }
    }
}

/// A guarded command. `action` is an index into the program's action
/// alphabet; `None` marks an independent (unlabeled) command that never
/// synchronises.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    pub action: Option<usize>,
    pub guard: Expression,
    pub updates: Vec<Update>,
}

impl Command {
    pub fn new(action: Option<usize>, guard: Expression, updates: Vec<Update>) -> Self {
        Command {
            action,
            guard,
            updates,
        }
    }

    /// A command with a single update of likelihood one.
    pub fn deterministic(
        action: Option<usize>,
        guard: Expression,
        assignments: Vec<Assignment>,
    ) -> Self {
        Command {
            action,
            guard,
            updates: vec![Update::new(Expression::mk_int(1), assignments)],
        }
    }
}

/// A module: a named collection of local variables and guarded commands.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Module {
    pub name: String,
    pub integer_variables: Vec<IntegerVariable>,
    pub boolean_variables: Vec<BooleanVariable>,
    pub commands: Vec<Command>,
}

impl Module {
    pub fn new(
        name: &str,
        integer_variables: Vec<IntegerVariable>,
        boolean_variables: Vec<BooleanVariable>,
        commands: Vec<Command>,
    ) -> Self {
        Module {
            name: name.to_string(),
            integer_variables,
            boolean_variables,
            commands,
        }
    }

    /// The synchronising action indices appearing on this module's commands.
    pub fn action_indices(&self) -> BTreeSet<usize> {
        self.commands
            .iter()
            .filter_map(|command| command.action)
            .collect()
    }

    /// Names of all local variables, in meta-variable allocation order
    /// (integers first, then Booleans).
    pub fn variable_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for variable in &self.integer_variables {
            names.push(variable.name.clone());
        }
        for variable in &self.boolean_variables {
            names.push(variable.name.clone());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::Expression;
    use crate::program::{Command, IntegerVariable, Module};

    #[test]
    fn action_indices_skip_independent_commands() {
        let module = Module::new(
            "m",
            vec![IntegerVariable::with_range("x", 0, 1)],
            vec![],
            vec![
                Command::deterministic(None, Expression::mk_bool(true), vec![]),
                Command::deterministic(Some(1), Expression::mk_bool(true), vec![]),
                Command::deterministic(Some(0), Expression::mk_bool(true), vec![]),
                Command::deterministic(Some(1), Expression::mk_bool(true), vec![]),
            ],
        );
        assert_eq!(
            module.action_indices().into_iter().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn variable_names_list_integers_first() {
        let module = Module {
            name: "m".to_string(),
            integer_variables: vec![IntegerVariable::with_range("x", 0, 3)],
            boolean_variables: vec![crate::program::BooleanVariable::new("b")],
            commands: vec![],
        };
        assert_eq!(
            module.variable_names(),
            vec!["x".to_string(), "b".to_string()]
        );
    }
}
