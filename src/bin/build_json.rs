use anyhow::Context;
use prism_symbolic::builder::{BuildOptions, ModelBuilder};
use prism_symbolic::program::Program;
use std::fs::read_to_string;

/// Build the symbolic model of a program given as a JSON file and print a
/// short summary, one line per interesting quantity.
fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: build-json <program.json>")?;

    let json_data = read_to_string(&path).with_context(|| format!("unable to read `{path}`"))?;
    let program =
        Program::from_json_string(&json_data).with_context(|| format!("unable to parse `{path}`"))?;

    let mut builder = ModelBuilder::new(BuildOptions {
        build_all_reward_models: true,
        ..Default::default()
    });
    let model = builder
        .build(&program)
        .with_context(|| format!("unable to build the model of `{path}`"))?;

    println!("Model type: {}", model.model_type());
    println!("States: {}", model.state_count());
    println!("Transitions: {}", model.transition_count());
    println!("Reward models: {}", model.components().reward_models.len());
    for warning in builder.warnings() {
        println!("Warning: {warning}");
    }
    Ok(())
}
