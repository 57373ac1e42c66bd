//! The guarded-command program AST consumed by the builder.
//!
//! Programs are usually produced by an external front end and exchanged as
//! JSON (see [`Program::from_json_string`]); all AST types carry serde
//! derives for that purpose.

mod module;
mod program;
mod reward;
mod variable;

pub use module::{Assignment, Command, Module, Update};
pub use program::{Constant, ConstantType, Label, ModelType, Program};
pub use reward::{RewardStructure, StateActionReward, StateReward, TransitionReward};
pub use variable::{BooleanVariable, IntegerVariable};
