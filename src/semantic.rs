//! # Semantic Validation Module
//!
//! Checks that a loaded score satisfies what the chord builder assumes.
//!
//! ## Validation Rules
//!
//! ### Measure Duration
//! - Every voice and every lyric verse present in a measure must add up to
//!   exactly the time signature, grace notes excluded
//! - Comparison is exact (rational), so nested tuplets never drift
//!
//! ### Grace Notes
//! - A voice needs at least one non-grace group in every measure it appears in
//!
//! ## Entry Point
//! `validate(score: &Score) -> Result<(), EngraveError>`

use crate::error::EngraveError;
use crate::ir::*;
use crate::params::ParamFeed;
use crate::rational::{self, Time};

/// Validate a score for semantic correctness
pub fn validate(score: &Score) -> Result<(), EngraveError> {
    let mut feed = ParamFeed::new();
    for item in &score.items {
        match item {
            ScoreItem::Params(change) => feed.apply(change),
            ScoreItem::Measure(measure) => validate_measure(score, measure, feed.time())?,
        }
    }
    Ok(())
}

/// Validate a single measure
fn validate_measure(score: &Score, measure: &Measure, time: TimeSignature) -> Result<(), EngraveError> {
    let expected = time.duration();
    for staff in &measure.staffs {
        for (index, voice) in staff.voices.iter().enumerate() {
            let Some(list) = voice else { continue };
            let groups: Vec<&Group> = list.iter().map(|k| &score.groups[*k]).collect();
            if groups.iter().all(|g| g.grace) {
                return Err(EngraveError::SemanticError {
                    measure: measure.number,
                    message: format!(
                        "staff {} voice {} has only grace notes",
                        staff.staff,
                        index + 1
                    ),
                });
            }
            let total = groups
                .iter()
                .filter(|g| !g.grace)
                .fold(rational::zero(), |acc, g| acc + g.duration);
            check_total(measure.number, total, expected, || {
                format!("staff {} voice {}", staff.staff, index + 1)
            })?;
        }
        for (index, verse) in staff.verses.iter().enumerate() {
            let total = verse
                .iter()
                .fold(rational::zero(), |acc, k| acc + score.syllables[*k].duration);
            check_total(measure.number, total, expected, || {
                format!("staff {} verse {}", staff.staff, index + 1)
            })?;
        }
    }
    Ok(())
}

fn check_total(
    measure: usize,
    total: Time,
    expected: Time,
    what: impl Fn() -> String,
) -> Result<(), EngraveError> {
    if total != expected {
        return Err(EngraveError::SemanticError {
            measure,
            message: format!(
                "{} lasts {} of a whole note, time signature needs {}",
                what(),
                total,
                expected
            ),
        });
    }
    Ok(())
}
