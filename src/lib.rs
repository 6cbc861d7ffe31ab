pub mod chords;
pub mod combine;
pub mod erase;
pub mod error;
pub mod input;
pub mod ir;
pub mod params;
pub mod rational;
pub mod report;
pub mod semantic;

pub use chords::build_chords;
pub use combine::combine_voices;
pub use erase::erase_invisible;
pub use error::*;
pub use input::parse;
pub use ir::*;
pub use params::{ParamFeed, Qualifier, VCombine};
pub use rational::Time;
pub use report::{to_report, to_yaml, Report};
pub use semantic::validate;

/// Compile a score description into a score with chords built and voices
/// combined. This is the main entry point for the library.
pub fn compile(source: &str) -> Result<Score, EngraveError> {
    let score = parse(source)?;
    validate(&score)?;
    process(score)
}

/// Compile without validation. A measure that does not add up then fails
/// later, inside the chord builder.
pub fn compile_unchecked(source: &str) -> Result<Score, EngraveError> {
    process(parse(source)?)
}

/// Compile with engine options that override the score header.
pub fn compile_with_options(source: &str, options: EngineOptions) -> Result<Score, EngraveError> {
    let mut score = parse(source)?;
    validate(&score)?;
    score.metadata.options = options;
    process(score)
}

/// Compile and render the YAML report.
pub fn compile_to_report(source: &str) -> Result<String, EngraveError> {
    to_yaml(&compile(source)?)
}

/// Build chords and, unless the options turn it off, combine voices in a
/// parsed score.
pub fn process(mut score: Score) -> Result<Score, EngraveError> {
    build_chords(&mut score)?;
    if score.metadata.options.combine {
        combine_voices(&mut score)?;
    }
    Ok(score)
}
