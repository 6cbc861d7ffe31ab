//! # Score Description Loader
//!
//! Reads the structured YAML score description that feeds the chord builder
//! and the combination engine.
//!
//! ## Layout
//! ```yaml
//! title: Example
//! time: 4/4
//! staffs: 1
//! vcombine: { voices: [1, 2], qualifier: overlap }
//! music:
//!   - params: { staff: 1, voice: 2, visible: false }
//!   - measure:
//!       - staff: 1
//!         voices:
//!           1: [ { time: "4", notes: [c4, e4] }, { time: "2.", rest: true } ]
//!         verses:
//!           - [ { time: "1", text: "Ah" } ]
//! ```
//!
//! ## Group time values
//! - `"4"` quarter, `"8."` dotted eighth, `"2.."` double-dotted half
//! - `"1/2"` double whole
//! - `"m"` fills the measure, whatever the time signature
//!
//! Tuplets scale the value by `in-time-of / num`.
//!
//! ## Pitches
//! Letter, optional accidental (`#`, `x`, `b`, `bb`, `n`), octave: `c4`,
//! `f#5`, `bb3` (B flat), `b3` (B natural).

use crate::error::EngraveError;
use crate::ir::*;
use crate::params::{Context, ParamChange, ParamFeed, Settings, VCombine};
use crate::rational::{self, Time};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
struct RawScore {
    title: Option<String>,
    composer: Option<String>,
    time: Option<String>,
    packexp: Option<f64>,
    staffs: Option<usize>,
    visible: Option<bool>,
    vcombine: Option<VCombine>,
    music: Vec<RawItem>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, default)]
struct RawItem {
    params: Option<RawParams>,
    measure: Option<Vec<RawStaff>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
struct RawParams {
    staff: Option<usize>,
    voice: Option<u8>,
    time: Option<String>,
    visible: Option<bool>,
    vcombine: Option<VCombine>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawStaff {
    #[serde(default = "first_staff")]
    staff: usize,
    #[serde(default)]
    voices: BTreeMap<u8, Vec<RawGroup>>,
    #[serde(default)]
    verses: Vec<Vec<RawSyllable>>,
}

fn first_staff() -> usize {
    1
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
struct RawGroup {
    time: String,
    notes: Vec<RawNote>,
    rest: bool,
    space: bool,
    mrpt: bool,
    grace: bool,
    beam: Span,
    break_beam: bool,
    beam_to: CrossStaff,
    stem_to: CrossStaff,
    beam_slope: Option<f64>,
    stem_len: Option<f64>,
    stem_dir: Option<Direction>,
    head_shape: Option<String>,
    tuplet: Option<RawTuplet>,
    slash_alt: i8,
    ho: Option<String>,
    with: Vec<String>,
    roll: Span,
    roll_dir: Option<Direction>,
    small: bool,
    tag: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawNote {
    Pitch(String),
    Full(RawNoteFull),
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
struct RawNoteFull {
    pitch: String,
    tie: bool,
    slur: Vec<String>,
    paren: bool,
    acc_paren: bool,
    small: bool,
    tie_to_voice: Option<u8>,
    slur_to_voice: Option<u8>,
    tied_from_other: bool,
    slurred_from_other: bool,
    tag: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawTuplet {
    #[serde(default)]
    loc: Span,
    num: u8,
    #[serde(default)]
    in_time_of: Option<u8>,
    #[serde(default)]
    side: Side,
    #[serde(default)]
    print: TupletPrint,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, default)]
struct RawSyllable {
    time: String,
    text: String,
}

/// Parse a YAML score description.
pub fn parse(source: &str) -> Result<Score, EngraveError> {
    let raw: RawScore = serde_yaml::from_str(source)?;
    Loader::default().load(raw)
}

/// A parsed group time value.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeValue {
    WholeMeasure,
    Note { basic_time: u16, dots: u8 },
}

/// More dots than this are rejected.
const MAX_DOTS: usize = 8;

fn parse_time_value(s: &str) -> Result<TimeValue, EngraveError> {
    let s = s.trim();
    if s == "m" {
        return Ok(TimeValue::WholeMeasure);
    }
    let digits_end = s.find('.').unwrap_or(s.len());
    let (value, dots) = s.split_at(digits_end);
    if dots.chars().any(|c| c != '.') {
        return Err(EngraveError::InputError(format!("bad time value '{}'", s)));
    }
    if dots.len() > MAX_DOTS {
        return Err(EngraveError::InputError(format!(
            "time value '{}' has more than {} dots",
            s, MAX_DOTS
        )));
    }
    let basic_time = if value == "1/2" {
        0
    } else {
        let bt: u16 = value
            .parse()
            .map_err(|_| EngraveError::InputError(format!("bad time value '{}'", s)))?;
        if !bt.is_power_of_two() || bt > 256 {
            return Err(EngraveError::InputError(format!(
                "time value '{}' is not a power of two up to 256",
                s
            )));
        }
        bt
    };
    Ok(TimeValue::Note {
        basic_time,
        dots: dots.len() as u8,
    })
}

/// Split `"f#5"` into letter, accidental and octave.
pub(crate) fn parse_pitch(s: &str) -> Result<(NoteName, Accidental, i8), EngraveError> {
    let bad = || EngraveError::InputError(format!("bad pitch '{}'", s));
    let mut chars = s.trim().chars();
    let letter = chars.next().and_then(NoteName::from_char).ok_or_else(bad)?;
    let rest = chars.as_str();
    let octave_at = rest
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .ok_or_else(bad)?;
    let (acc, octave) = rest.split_at(octave_at);
    let accidental = match acc {
        "" => Accidental::None,
        "#" => Accidental::Sharp,
        "x" | "##" => Accidental::DoubleSharp,
        "b" | "&" => Accidental::Flat,
        "bb" | "&&" => Accidental::DoubleFlat,
        "n" => Accidental::Natural,
        _ => return Err(bad()),
    };
    let octave: i8 = octave.parse().map_err(|_| bad())?;
    if !(0..=9).contains(&octave) {
        return Err(bad());
    }
    Ok((letter, accidental, octave))
}

/// Conventional "in the time of" for a tuplet of `num` notes: 3 in 2,
/// 2 in 3, 4 in 3, and 5 or more in 4.
fn default_in_time_of(num: u8) -> u8 {
    match num {
        0 | 1 => 1,
        2 => 3,
        3 | 4 => num - 1,
        _ => 4,
    }
}

fn parse_horiz_offset(s: &str) -> Result<HorizOffset, EngraveError> {
    match s.trim() {
        "" => Ok(HorizOffset::None),
        "-" => Ok(HorizOffset::Left),
        "+" => Ok(HorizOffset::Right),
        v => v
            .parse::<f64>()
            .map(HorizOffset::Value)
            .map_err(|_| EngraveError::InputError(format!("bad horizontal offset '{}'", v))),
    }
}

fn check_voice(voice: u8) -> Result<u8, EngraveError> {
    if (1..=MAX_VOICES).contains(&voice) {
        Ok(voice)
    } else {
        Err(EngraveError::InputError(format!(
            "voice {} is outside 1..={}",
            voice, MAX_VOICES
        )))
    }
}

fn check_vcombine(vc: &VCombine) -> Result<(), EngraveError> {
    if vc.voices.len() > MAX_VOICES as usize {
        return Err(EngraveError::InputError(format!(
            "vcombine names {} voices, at most {} allowed",
            vc.voices.len(),
            MAX_VOICES
        )));
    }
    for &voice in &vc.voices {
        check_voice(voice)?;
    }
    Ok(())
}

#[derive(Default)]
struct Loader {
    score: Score,
    feed: ParamFeed,
    measure_number: usize,
}

impl Loader {
    fn load(mut self, raw: RawScore) -> Result<Score, EngraveError> {
        self.feed = ParamFeed::new();
        self.score.metadata = Metadata {
            title: raw.title,
            composer: raw.composer,
            staffs: raw.staffs.unwrap_or(1),
            options: EngineOptions {
                packexp: raw.packexp.unwrap_or(rational::DEFAULT_PACKEXP),
                ..Default::default()
            },
        };
        if self.score.metadata.staffs == 0 {
            return Err(EngraveError::InputError("a score needs at least one staff".to_string()));
        }
        if let Some(vc) = &raw.vcombine {
            check_vcombine(vc)?;
        }
        let header = ParamChange {
            context: Context::Score,
            settings: Settings {
                time: raw.time.as_deref().map(parse_signature).transpose()?,
                visible: raw.visible,
                vcombine: raw.vcombine,
            },
        };
        self.push_params(header);

        for item in raw.music {
            match (item.params, item.measure) {
                (Some(params), None) => {
                    let change = self.params(params)?;
                    self.push_params(change);
                }
                (None, Some(staffs)) => {
                    let measure = self.measure(staffs)?;
                    self.score.items.push(ScoreItem::Measure(measure));
                }
                _ => {
                    return Err(EngraveError::InputError(
                        "each music entry must hold exactly one of 'params' or 'measure'"
                            .to_string(),
                    ))
                }
            }
        }
        Ok(self.score)
    }

    fn push_params(&mut self, change: ParamChange) {
        self.feed.apply(&change);
        self.score.items.push(ScoreItem::Params(change));
    }

    fn params(&self, raw: RawParams) -> Result<ParamChange, EngraveError> {
        let context = match (raw.staff, raw.voice) {
            (None, None) => Context::Score,
            (Some(staff), None) => Context::Staff(self.check_staff(staff)?),
            (Some(staff), Some(voice)) => Context::Voice(self.check_staff(staff)?, check_voice(voice)?),
            (None, Some(_)) => {
                return Err(EngraveError::InputError(
                    "voice parameters need a staff".to_string(),
                ))
            }
        };
        if raw.time.is_some() && context != Context::Score {
            return Err(EngraveError::InputError(
                "time can only be set in score context".to_string(),
            ));
        }
        if raw.vcombine.is_some() && matches!(context, Context::Voice(..)) {
            return Err(EngraveError::InputError(
                "vcombine cannot be set in voice context".to_string(),
            ));
        }
        if let Some(vc) = &raw.vcombine {
            check_vcombine(vc)?;
        }
        Ok(ParamChange {
            context,
            settings: Settings {
                time: raw.time.as_deref().map(parse_signature).transpose()?,
                visible: raw.visible,
                vcombine: raw.vcombine,
            },
        })
    }

    fn check_staff(&self, staff: usize) -> Result<usize, EngraveError> {
        if staff >= 1 && staff <= self.score.metadata.staffs {
            Ok(staff)
        } else {
            Err(EngraveError::InputError(format!(
                "staff {} is outside 1..={}",
                staff, self.score.metadata.staffs
            )))
        }
    }

    fn measure(&mut self, raw_staffs: Vec<RawStaff>) -> Result<Measure, EngraveError> {
        self.measure_number += 1;
        let mut measure = Measure {
            number: self.measure_number,
            ..Default::default()
        };
        for raw in raw_staffs {
            let staff = self.check_staff(raw.staff)?;
            if measure.staff(staff).is_some() {
                return Err(EngraveError::InputError(format!(
                    "staff {} appears twice in measure {}",
                    staff, self.measure_number
                )));
            }
            let mut staff_measure = StaffMeasure::new(staff);
            for (voice, raw_groups) in raw.voices {
                let voice = check_voice(voice)?;
                if raw_groups.is_empty() {
                    continue;
                }
                let mut list = Vec::with_capacity(raw_groups.len());
                for raw_group in raw_groups {
                    list.push(self.group(raw_group, staff, voice)?);
                }
                staff_measure.voices[voice as usize - 1] = Some(list);
            }
            for (verse, raw_syllables) in raw.verses.into_iter().enumerate() {
                let mut list = Vec::with_capacity(raw_syllables.len());
                for raw_syllable in raw_syllables {
                    list.push(self.syllable(raw_syllable, staff, verse + 1)?);
                }
                if !list.is_empty() {
                    staff_measure.verses.push(list);
                }
            }
            measure.staffs.push(staff_measure);
        }
        measure.staffs.sort_by_key(|s| s.staff);
        Ok(measure)
    }

    fn duration_of(&self, value: TimeValue, tuplet: Option<&Tuplet>) -> (u16, u8, Time, bool) {
        match value {
            TimeValue::WholeMeasure => (1, 0, self.feed.time().duration(), true),
            TimeValue::Note { basic_time, dots } => {
                let mut duration = rational::note_value(basic_time, dots);
                if let Some(t) = tuplet {
                    duration = duration * Time::new(t.in_time_of as i64, t.num as i64);
                }
                (basic_time, dots, duration, false)
            }
        }
    }

    fn group(&mut self, raw: RawGroup, staff: usize, voice: u8) -> Result<GroupKey, EngraveError> {
        let measure = self.measure_number;
        let content = match (raw.rest, raw.space, raw.mrpt) {
            (false, false, false) => Content::Notes,
            (true, false, false) => Content::Rest,
            (false, true, false) => Content::Space,
            (false, false, true) => Content::MeasureRepeat,
            _ => {
                return Err(EngraveError::InputError(format!(
                    "measure {}: a group is at most one of rest, space or mrpt",
                    measure
                )))
            }
        };
        if content == Content::Notes && raw.notes.is_empty() {
            return Err(EngraveError::InputError(format!(
                "measure {}: staff {} voice {} has a group with no notes",
                measure, staff, voice
            )));
        }
        if content != Content::Notes && !raw.notes.is_empty() {
            return Err(EngraveError::InputError(format!(
                "measure {}: rests, spaces and measure repeats cannot hold notes",
                measure
            )));
        }
        let tuplet = match raw.tuplet {
            Some(t) => {
                if t.num < 2 {
                    return Err(EngraveError::InputError(format!(
                        "measure {}: tuplet of {} notes",
                        measure, t.num
                    )));
                }
                Some(Tuplet {
                    loc: t.loc,
                    num: t.num,
                    in_time_of: t.in_time_of.unwrap_or_else(|| default_in_time_of(t.num)),
                    side: t.side,
                    print: t.print,
                })
            }
            None => None,
        };
        let value = parse_time_value(&raw.time)?;
        let (basic_time, dots, duration, whole_measure) = self.duration_of(value, tuplet.as_ref());
        let grace = raw.grace;
        let duration = if grace { rational::zero() } else { duration };

        let mut tagged_notes = Vec::with_capacity(raw.notes.len());
        for raw_note in raw.notes {
            tagged_notes.push(note(raw_note)?);
        }
        tagged_notes.sort_by(|(a, _), (b, _)| b.step().cmp(&a.step()));

        let group = Group {
            staff,
            voice,
            measure,
            basic_time,
            dots,
            duration,
            grace,
            whole_measure,
            content,
            notes: tagged_notes.iter().map(|(n, _)| n.clone()).collect(),
            size: if raw.small { Size::Small } else { Size::Normal },
            head_shape: raw.head_shape,
            beam: raw.beam,
            break_beam: raw.break_beam,
            beam_to: raw.beam_to,
            stem_to: raw.stem_to,
            beam_slope: raw.beam_slope,
            stem_len: raw.stem_len,
            stem_dir: raw.stem_dir,
            tuplet,
            slash_alt: raw.slash_alt,
            horiz_offset: raw.ho.as_deref().map(parse_horiz_offset).transpose()?.unwrap_or_default(),
            with_list: raw.with,
            roll: raw.roll,
            roll_dir: raw.roll_dir,
        };
        let key = self.score.groups.insert(group);

        if let Some(tag) = raw.tag {
            self.add_tag(tag, TagRef { group: key, note: None })?;
        }
        for (index, (_, tag)) in tagged_notes.into_iter().enumerate() {
            if let Some(tag) = tag {
                self.add_tag(tag, TagRef { group: key, note: Some(index) })?;
            }
        }
        Ok(key)
    }

    fn add_tag(&mut self, name: String, target: TagRef) -> Result<(), EngraveError> {
        if self.score.tags.contains_key(&name) {
            return Err(EngraveError::InputError(format!("tag '{}' defined twice", name)));
        }
        self.score.tags.insert(name, target);
        Ok(())
    }

    fn syllable(&mut self, raw: RawSyllable, staff: usize, verse: usize) -> Result<SyllableKey, EngraveError> {
        let (_, _, duration, _) = self.duration_of(parse_time_value(&raw.time)?, None);
        Ok(self.score.syllables.insert(Syllable {
            staff,
            verse,
            measure: self.measure_number,
            duration,
            text: raw.text,
        }))
    }
}

fn parse_signature(s: &str) -> Result<TimeSignature, EngraveError> {
    TimeSignature::parse(s)
        .ok_or_else(|| EngraveError::InputError(format!("bad time signature '{}'", s)))
}

fn note(raw: RawNote) -> Result<(Note, Option<String>), EngraveError> {
    let full = match raw {
        RawNote::Pitch(pitch) => RawNoteFull {
            pitch,
            ..Default::default()
        },
        RawNote::Full(full) => full,
    };
    let (letter, accidental, octave) = parse_pitch(&full.pitch)?;
    if let Some(voice) = full.tie_to_voice {
        check_voice(voice)?;
    }
    let mut slur_to = Vec::with_capacity(full.slur.len());
    for target in &full.slur {
        let (letter, _, octave) = parse_pitch(target)?;
        slur_to.push(SlurTarget {
            letter,
            octave,
            to_voice: full.slur_to_voice.map(check_voice).transpose()?,
        });
    }
    let note = Note {
        letter,
        accidental,
        octave,
        size: if full.small { Size::Small } else { Size::Normal },
        paren: full.paren,
        acc_paren: full.acc_paren,
        tie: full.tie || full.tie_to_voice.is_some(),
        tied_to_voice: full.tie_to_voice,
        tied_from_other: full.tied_from_other,
        slur_to,
        slurred_from_other: full.slurred_from_other,
    };
    Ok((note, full.tag))
}
