//! # Score Representation
//!
//! The intermediate representation shared by the chord builder and the
//! voice-combination engine.
//!
//! ## Type Hierarchy
//! ```text
//! Score
//!   ├── Metadata (title, composer, staff count, engine options)
//!   ├── groups: SlotMap<GroupKey, Group>        (event arena)
//!   ├── syllables: SlotMap<SyllableKey, Syllable>
//!   ├── tags: BTreeMap<name, TagRef>
//!   └── items: Vec<ScoreItem>
//!         ├── Params(ParamChange)
//!         └── Measure
//!               ├── chords: Vec<Chord>            (filled by the chord builder)
//!               └── Vec<StaffMeasure>
//!                     ├── voices: [Option<Vec<GroupKey>>; 3]
//!                     └── verses: Vec<Vec<SyllableKey>>
//! ```
//!
//! ## Relations
//! Three relations tie events together, all stored as keys:
//! - **voice order**: a `Vec<GroupKey>` per voice per measure, graces included
//! - **simultaneity**: a chord's `members`, non-grace events and syllables only
//! - **grace chain**: the run of grace entries directly before an event in
//!   its voice list
//!
//! ## Notes
//! A group's notes are kept highest pitch first.

use crate::params::ParamChange;
use crate::rational::{self, Time};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

slotmap::new_key_type! {
    /// Key of a group (note-chord, rest, space or measure repeat).
    pub struct GroupKey;
    /// Key of a lyric syllable.
    pub struct SyllableKey;
}

/// Highest voice number on a staff.
pub const MAX_VOICES: u8 = 3;

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Parse `"3/4"`-style signatures.
    pub fn parse(s: &str) -> Option<Self> {
        let (beats, beat_type) = s.trim().split_once('/')?;
        let beats: u8 = beats.trim().parse().ok()?;
        let beat_type: u8 = beat_type.trim().parse().ok()?;
        if beats == 0 || beat_type == 0 {
            return None;
        }
        Some(Self { beats, beat_type })
    }

    /// Length of one full measure in whole notes.
    pub fn duration(&self) -> Time {
        Time::new(self.beats as i64, self.beat_type as i64)
    }
}

/// Engine settings that are not replayed by position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Exponent applied to chord durations for pseudo-durations.
    pub packexp: f64,
    /// Run the voice-combination passes.
    pub combine: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            packexp: rational::DEFAULT_PACKEXP,
            combine: true,
        }
    }
}

/// Descriptive header data.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub staffs: usize,
    pub options: EngineOptions,
}

/// Note letters, ordered C up to B within an octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum NoteName {
    #[default]
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'c' => Some(NoteName::C),
            'd' => Some(NoteName::D),
            'e' => Some(NoteName::E),
            'f' => Some(NoteName::F),
            'g' => Some(NoteName::G),
            'a' => Some(NoteName::A),
            'b' => Some(NoteName::B),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            NoteName::C => 'c',
            NoteName::D => 'd',
            NoteName::E => 'e',
            NoteName::F => 'f',
            NoteName::G => 'g',
            NoteName::A => 'a',
            NoteName::B => 'b',
        }
    }
}

/// Written accidental; `None` means nothing is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accidental {
    #[default]
    None,
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

impl Accidental {
    fn suffix(&self) -> &'static str {
        match self {
            Accidental::None => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
            Accidental::Natural => "n",
            Accidental::DoubleSharp => "x",
            Accidental::DoubleFlat => "bb",
        }
    }
}

/// Position of a group within a run (beam, tuplet, roll).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Span {
    #[default]
    None,
    Lone,
    Start,
    Inner,
    End,
}

impl Span {
    /// The run carries on into the next group.
    pub fn continues(&self) -> bool {
        matches!(self, Span::Start | Span::Inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Default,
    Above,
    Below,
}

/// Cross-staff beam or stem target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossStaff {
    #[default]
    None,
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Size {
    #[default]
    Normal,
    Small,
}

/// What to print over a tuplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TupletPrint {
    #[default]
    Default,
    Neither,
    Number,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuplet {
    pub loc: Span,
    pub num: u8,
    pub in_time_of: u8,
    pub side: Side,
    pub print: TupletPrint,
}

/// Horizontal offset of a group relative to its chord.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HorizOffset {
    #[default]
    None,
    Left,
    Right,
    Value(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Content {
    #[default]
    Notes,
    Rest,
    Space,
    MeasureRepeat,
}

/// Slur destination: a pitch in the next group, possibly in another voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurTarget {
    pub letter: NoteName,
    pub octave: i8,
    pub to_voice: Option<u8>,
}

/// One note head of a group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Note {
    pub letter: NoteName,
    pub accidental: Accidental,
    pub octave: i8,
    pub size: Size,
    /// Parenthesized note head.
    pub paren: bool,
    /// Parenthesized accidental.
    pub acc_paren: bool,
    pub tie: bool,
    pub tied_to_voice: Option<u8>,
    pub tied_from_other: bool,
    pub slur_to: Vec<SlurTarget>,
    pub slurred_from_other: bool,
}

impl Note {
    /// Diatonic staff step; higher is higher on the staff.
    pub fn step(&self) -> i32 {
        self.octave as i32 * 7 + self.letter as i32
    }

    /// Same letter and octave, accidental aside.
    pub fn same_position(&self, other: &Note) -> bool {
        self.letter == other.letter && self.octave == other.octave
    }

    pub fn crosses_voices(&self) -> bool {
        self.tied_to_voice.is_some()
            || self.tied_from_other
            || self.slurred_from_other
            || self.slur_to.iter().any(|s| s.to_voice.is_some())
    }

    pub fn pitch_name(&self) -> String {
        format!(
            "{}{}{}",
            self.letter.as_char(),
            self.accidental.suffix(),
            self.octave
        )
    }
}

/// A group: one note-chord, rest, space or measure repeat in one voice.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub staff: usize,
    pub voice: u8,
    /// Measure number the group was written in, for diagnostics.
    pub measure: usize,
    /// 4 for a quarter, 8 for an eighth, 0 for a double whole.
    pub basic_time: u16,
    pub dots: u8,
    pub duration: Time,
    pub grace: bool,
    /// Fills the whole measure regardless of time signature.
    pub whole_measure: bool,
    pub content: Content,
    pub notes: Vec<Note>,
    pub size: Size,
    pub head_shape: Option<String>,
    pub beam: Span,
    pub break_beam: bool,
    pub beam_to: CrossStaff,
    pub stem_to: CrossStaff,
    pub beam_slope: Option<f64>,
    pub stem_len: Option<f64>,
    pub stem_dir: Option<Direction>,
    pub tuplet: Option<Tuplet>,
    /// Positive: tremolo slashes; negative: alternation beams.
    pub slash_alt: i8,
    pub horiz_offset: HorizOffset,
    pub with_list: Vec<String>,
    pub roll: Span,
    pub roll_dir: Option<Direction>,
}

impl Default for Group {
    fn default() -> Self {
        Group {
            staff: 1,
            voice: 1,
            measure: 0,
            basic_time: 4,
            dots: 0,
            duration: Time::new(1, 4),
            grace: false,
            whole_measure: false,
            content: Content::Notes,
            notes: Vec::new(),
            size: Size::Normal,
            head_shape: None,
            beam: Span::None,
            break_beam: false,
            beam_to: CrossStaff::None,
            stem_to: CrossStaff::None,
            beam_slope: None,
            stem_len: None,
            stem_dir: None,
            tuplet: None,
            slash_alt: 0,
            horiz_offset: HorizOffset::None,
            with_list: Vec::new(),
            roll: Span::None,
            roll_dir: None,
        }
    }
}

impl Group {
    /// A measure-long space standing in for an invisible voice.
    pub fn measure_space(staff: usize, voice: u8, measure: usize, duration: Time) -> Self {
        Group {
            staff,
            voice,
            measure,
            basic_time: 1,
            duration,
            whole_measure: true,
            content: Content::Space,
            ..Default::default()
        }
    }

    /// Same timing, same place, nothing printed.
    pub fn to_space(&self) -> Self {
        Group {
            staff: self.staff,
            voice: self.voice,
            measure: self.measure,
            basic_time: self.basic_time,
            dots: self.dots,
            duration: self.duration,
            grace: self.grace,
            whole_measure: self.whole_measure,
            content: Content::Space,
            ..Default::default()
        }
    }

    pub fn is_space(&self) -> bool {
        self.content == Content::Space
    }

    /// Any note ties into the following group.
    pub fn ties_out(&self) -> bool {
        self.notes.iter().any(|n| n.tie)
    }

    /// Beam, tie or slur carries on into the next group of this voice.
    pub fn continues_onward(&self) -> bool {
        self.beam.continues() || self.notes.iter().any(|n| n.tie || !n.slur_to.is_empty())
    }

    pub fn crosses_voices(&self) -> bool {
        self.notes.iter().any(Note::crosses_voices)
    }

    /// Short printed form: `4. c4 e4`, `2 r`, `g8 d5`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if self.grace {
            out.push('g');
        }
        if self.whole_measure {
            out.push('m');
        } else if self.basic_time == 0 {
            out.push_str("1/2");
        } else {
            out.push_str(&self.basic_time.to_string());
        }
        for _ in 0..self.dots {
            out.push('.');
        }
        match self.content {
            Content::Notes => {
                for note in &self.notes {
                    out.push(' ');
                    out.push_str(&note.pitch_name());
                }
            }
            Content::Rest => out.push_str(" r"),
            Content::Space => out.push_str(" s"),
            Content::MeasureRepeat => out.push_str(" mrpt"),
        }
        out
    }
}

/// One lyric syllable.
#[derive(Debug, Clone, PartialEq)]
pub struct Syllable {
    pub staff: usize,
    pub verse: usize,
    pub measure: usize,
    pub duration: Time,
    pub text: String,
}

/// Anything a chord can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordMember {
    Group(GroupKey),
    Syllable(SyllableKey),
}

/// Everything that starts at one time offset within a measure.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    /// Offset from the start of the measure.
    pub start: Time,
    pub duration: Time,
    pub pseudo_duration: f64,
    pub members: Vec<ChordMember>,
}

impl Chord {
    pub fn new(start: Time) -> Self {
        Self {
            start,
            duration: rational::zero(),
            pseudo_duration: 0.0,
            members: Vec::new(),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = GroupKey> + '_ {
        self.members.iter().filter_map(|m| match m {
            ChordMember::Group(k) => Some(*k),
            ChordMember::Syllable(_) => None,
        })
    }
}

/// One staff's content within a measure.
#[derive(Debug, Clone, Default)]
pub struct StaffMeasure {
    pub staff: usize,
    /// Indexed by voice number minus one; `None` when the voice is absent.
    pub voices: Vec<Option<Vec<GroupKey>>>,
    pub verses: Vec<Vec<SyllableKey>>,
}

impl StaffMeasure {
    pub fn new(staff: usize) -> Self {
        Self {
            staff,
            voices: vec![None; MAX_VOICES as usize],
            verses: Vec::new(),
        }
    }

    pub fn voice(&self, voice: u8) -> Option<&Vec<GroupKey>> {
        self.voices.get(voice as usize - 1)?.as_ref()
    }

    pub fn voice_mut(&mut self, voice: u8) -> Option<&mut Vec<GroupKey>> {
        self.voices.get_mut(voice as usize - 1)?.as_mut()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Measure {
    /// 1-based measure number.
    pub number: usize,
    pub staffs: Vec<StaffMeasure>,
    pub chords: Vec<Chord>,
}

impl Measure {
    pub fn staff(&self, staff: usize) -> Option<&StaffMeasure> {
        self.staffs.iter().find(|s| s.staff == staff)
    }

    pub fn staff_mut(&mut self, staff: usize) -> Option<&mut StaffMeasure> {
        self.staffs.iter_mut().find(|s| s.staff == staff)
    }
}

/// Entries of the main score list, in score order.
#[derive(Debug, Clone)]
pub enum ScoreItem {
    Params(ParamChange),
    Measure(Measure),
}

/// What a location tag points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRef {
    pub group: GroupKey,
    /// Index into the group's notes for note-level tags.
    pub note: Option<usize>,
}

/// A complete score.
#[derive(Debug, Clone, Default)]
pub struct Score {
    pub metadata: Metadata,
    pub items: Vec<ScoreItem>,
    pub groups: SlotMap<GroupKey, Group>,
    pub syllables: SlotMap<SyllableKey, Syllable>,
    pub tags: BTreeMap<String, TagRef>,
}

impl Score {
    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.items.iter().filter_map(|item| match item {
            ScoreItem::Measure(m) => Some(m),
            ScoreItem::Params(_) => None,
        })
    }

    /// The measure stored at `items[index]`.
    pub fn measure_at(&self, index: usize) -> Option<&Measure> {
        match self.items.get(index)? {
            ScoreItem::Measure(m) => Some(m),
            ScoreItem::Params(_) => None,
        }
    }

    pub fn measure_at_mut(&mut self, index: usize) -> Option<&mut Measure> {
        match self.items.get_mut(index)? {
            ScoreItem::Measure(m) => Some(m),
            ScoreItem::Params(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(letter: NoteName, octave: i8) -> Note {
        Note {
            letter,
            octave,
            ..Default::default()
        }
    }

    #[test]
    fn test_step_orders_across_octave_break() {
        assert!(note(NoteName::C, 5).step() > note(NoteName::B, 4).step());
        assert!(note(NoteName::D, 4).step() > note(NoteName::C, 4).step());
    }

    #[test]
    fn test_to_space_keeps_timing_only() {
        let group = Group {
            staff: 2,
            voice: 2,
            basic_time: 8,
            dots: 1,
            duration: Time::new(3, 16),
            notes: vec![note(NoteName::E, 4)],
            beam: Span::Start,
            with_list: vec![".".to_string()],
            ..Default::default()
        };
        let space = group.to_space();
        assert_eq!(space.content, Content::Space);
        assert_eq!(space.duration, Time::new(3, 16));
        assert_eq!(space.dots, 1);
        assert_eq!(space.voice, 2);
        assert!(space.notes.is_empty());
        assert_eq!(space.beam, Span::None);
        assert!(space.with_list.is_empty());
    }

    #[test]
    fn test_describe() {
        let group = Group {
            basic_time: 4,
            dots: 1,
            notes: vec![note(NoteName::E, 4), note(NoteName::C, 4)],
            ..Default::default()
        };
        assert_eq!(group.describe(), "4. e4 c4");
    }

    #[test]
    fn test_time_signature_duration() {
        assert_eq!(TimeSignature::parse("6/8").unwrap().duration(), Time::new(3, 4));
        assert!(TimeSignature::parse("0/4").is_none());
    }
}
