//! # Voice Combination
//!
//! Collapse two or three voices of a staff into one printed voice wherever
//! they are compatible.
//!
//! ## Purpose
//! A staff asks for combination with a `vcombine` parameter naming the
//! voices that may share a stem. Wherever those voices move together (same
//! rhythm, same beaming, pitches that do not cross) they are printed as one
//! voice. Elsewhere they stay apart.
//!
//! ## Sub-modules
//! - `hand` - hands, pair compatibility, merge plans and shared lookups
//! - `compat` - pass 1, local compatibility of each voice pair in a hand
//! - `neighbors` - pass 2, consistency with beamed, tied and slurred neighbors
//! - `merge` - pass 3, building merged groups and relinking tags
//!
//! ## Entry Point
//! [`combine_voices()`] - run all three passes over a score with chords built
//!
//! ## Example
//! ```rust
//! use engrave::{build_chords, combine_voices, parse};
//!
//! let source = r#"
//! vcombine: { voices: [1, 2], qualifier: shareone }
//! music:
//!   - measure:
//!       - voices:
//!           1: [ { time: "1", notes: [c5] } ]
//!           2: [ { time: "1", notes: [c5] } ]
//! "#;
//!
//! let mut score = parse(source).unwrap();
//! build_chords(&mut score).unwrap();
//! assert_eq!(combine_voices(&mut score).unwrap(), 1);
//! ```
//!
//! ## Hands
//! A hand is what one chord holds on one staff. The passes work hand by
//! hand, each replaying the parameter changes from the top of the piece,
//! since the combination request can change between measures.
//!
//! ## The Three Passes
//!
//! ### Pass 1
//! Each requested pair with a group in the hand is tested on its own: equal
//! timing and beaming, no cross-voice ties or slurs, matching rests, and
//! pitches that respect the qualifier. Grace notes in front are tested too,
//! paired from the main group backwards.
//!
//! ### Pass 2
//! A compatible pair is followed forward and back through the hands it is
//! beamed, tied or slurred into (and to the measure edges with `bymeas`). It
//! must be compatible in every hand it reaches. Pairs are tried in the order
//! (1,2), (1,3), (2,3); the lower voice is always the destination, and a
//! voice merged away is not used again. After a merge the destination is only
//! compatible with a third voice if the source was too.
//!
//! ### Pass 3
//! The source's notes join the destination's, duplicates collapse, and the
//! source becomes a space of the same length in its own voice.
//!
//! ## Qualifiers
//! Top to bottom the voices sit 1, 3, 2.
//! - `nooverlap` - the upper voice's lowest note is above the lower voice's highest
//! - `shareone` - the two may meet at one pitch
//! - `overlap` - anything goes
//! - `restsonly` - only rests and spaces combine

mod compat;
mod hand;
mod merge;
mod neighbors;

#[cfg(test)]
mod tests;

use crate::error::EngraveError;
use crate::ir::Score;
use hand::Layout;
use log::debug;

/// Combine voices throughout `score`. Chords must already be built.
///
/// Returns the number of merges performed.
pub fn combine_voices(score: &mut Score) -> Result<usize, EngraveError> {
    let layout = Layout::new(score)?;
    let mut compat = compat::check_hands(score, &layout)?;
    let plans = neighbors::plan_merges(score, &layout, &mut compat);
    let merged = merge::execute(score, &layout, &plans)?;
    debug!(
        "combined voices in {} of {} hands",
        plans.iter().filter(|p| !p.is_empty()).count(),
        layout.hands.len()
    );
    Ok(merged)
}
