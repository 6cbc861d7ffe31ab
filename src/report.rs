//! # Report
//!
//! A serializable snapshot of a processed score: the chord list of every
//! measure and the printed form of every voice. Downstream layout reads the
//! same things; the report makes them inspectable.
//!
//! ## Shape
//! ```yaml
//! title: Example
//! measures:
//!   - number: 1
//!     chords:
//!       - start: "0"
//!         duration: 1/4
//!         pseudo-duration: 0.3299
//!         members: [s1v1, s1v2, s1l1]
//!     staffs:
//!       - staff: 1
//!         voices:
//!           1: [4 e5 c5, 2. r]
//!           2: [4 s, 2. s]
//!         verses:
//!           - [Ah]
//! ```
//! Chord members are named `s<staff>v<voice>` for groups and `s<staff>l<verse>`
//! for lyric syllables.

use crate::error::EngraveError;
use crate::ir::*;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    pub measures: Vec<MeasureReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureReport {
    pub number: usize,
    pub chords: Vec<ChordReport>,
    pub staffs: Vec<StaffReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChordReport {
    /// Exact offset from the measure start, as a fraction.
    pub start: String,
    pub duration: String,
    pub pseudo_duration: f64,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffReport {
    pub staff: usize,
    pub voices: BTreeMap<u8, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub verses: Vec<Vec<String>>,
}

/// Build the report of a score.
pub fn to_report(score: &Score) -> Report {
    Report {
        title: score.metadata.title.clone(),
        composer: score.metadata.composer.clone(),
        measures: score.measures().map(|m| measure_report(score, m)).collect(),
    }
}

/// Render the report of a score as YAML.
pub fn to_yaml(score: &Score) -> Result<String, EngraveError> {
    serde_yaml::to_string(&to_report(score))
        .map_err(|e| EngraveError::internal(0, format!("report could not be written: {}", e)))
}

fn member_name(score: &Score, member: &ChordMember) -> String {
    match member {
        ChordMember::Group(key) => {
            let group = &score.groups[*key];
            format!("s{}v{}", group.staff, group.voice)
        }
        ChordMember::Syllable(key) => {
            let syllable = &score.syllables[*key];
            format!("s{}l{}", syllable.staff, syllable.verse)
        }
    }
}

fn measure_report(score: &Score, measure: &Measure) -> MeasureReport {
    let chords = measure
        .chords
        .iter()
        .map(|chord| ChordReport {
            start: chord.start.to_string(),
            duration: chord.duration.to_string(),
            pseudo_duration: (chord.pseudo_duration * 10_000.0).round() / 10_000.0,
            members: chord.members.iter().map(|m| member_name(score, m)).collect(),
        })
        .collect();

    let staffs = measure
        .staffs
        .iter()
        .map(|staff| StaffReport {
            staff: staff.staff,
            voices: staff
                .voices
                .iter()
                .enumerate()
                .filter_map(|(index, list)| {
                    let list = list.as_ref()?;
                    let printed = list.iter().map(|k| score.groups[*k].describe()).collect();
                    Some((index as u8 + 1, printed))
                })
                .collect(),
            verses: staff
                .verses
                .iter()
                .map(|verse| verse.iter().map(|k| score.syllables[*k].text.clone()).collect())
                .collect(),
        })
        .collect();

    MeasureReport {
        number: measure.number,
        chords,
        staffs,
    }
}
