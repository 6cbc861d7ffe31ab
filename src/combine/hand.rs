//! Hands and the lookup tables the three passes share.
//!
//! A hand is the part of one chord that sits on one staff: at most one
//! non-grace group per voice. Chord membership does not change while voices
//! are combined (a source turns into a space where it stands), so the tables
//! are built once and stay valid through all three passes.

use crate::error::EngraveError;
use crate::ir::*;
use arrayvec::ArrayVec;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

#[derive(Debug, Clone)]
pub(crate) struct Hand {
    /// Index of the measure in `Score::items`.
    pub item: usize,
    pub chord: usize,
    pub staff: usize,
    pub voices: [Option<GroupKey>; MAX_VOICES as usize],
}

impl Hand {
    pub fn voice(&self, voice: u8) -> Option<GroupKey> {
        self.voices.get(voice as usize - 1).copied().flatten()
    }
}

/// Which voice pairs of a hand can share a printed voice. Each pair has its
/// own slot, picked by the sum of the two voice numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PairCompat([bool; 3]);

impl PairCompat {
    fn slot(a: u8, b: u8) -> usize {
        (a + b - 3) as usize
    }

    pub fn get(&self, a: u8, b: u8) -> bool {
        self.0[Self::slot(a, b)]
    }

    pub fn set(&mut self, a: u8, b: u8, ok: bool) {
        self.0[Self::slot(a, b)] = ok;
    }

    /// `src` is folded into `dest`: the result is only compatible with a third
    /// voice if both halves were.
    pub fn absorb(&mut self, dest: u8, src: u8) {
        for other in 1..=MAX_VOICES {
            if other == dest || other == src {
                continue;
            }
            let both = self.get(dest, other) && self.get(src, other);
            self.set(dest, other, both);
            self.set(src, other, both);
        }
    }
}

/// One planned merge: `src`'s group goes into `dest`'s group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Merge {
    pub dest: u8,
    pub src: u8,
}

/// Merges chosen for one hand, in execution order. Three voices make at most
/// two merges.
pub(crate) type Plan = ArrayVec<Merge, 2>;

pub(crate) struct Layout {
    pub hands: Vec<Hand>,
    hand_of: HashMap<GroupKey, usize>,
    by_item: HashMap<usize, Range<usize>>,
    /// Non-grace groups of each (staff, voice) across the piece.
    sequences: HashMap<(usize, u8), Vec<GroupKey>>,
    seq_pos: HashMap<GroupKey, SeqPos>,
}

#[derive(Debug, Clone, Copy)]
struct SeqPos {
    voice: (usize, u8),
    index: usize,
    /// Ordinal of the measure among all measures.
    ordinal: usize,
}

impl Layout {
    pub fn new(score: &Score) -> Result<Self, EngraveError> {
        let mut layout = Layout {
            hands: Vec::new(),
            hand_of: HashMap::new(),
            by_item: HashMap::new(),
            sequences: HashMap::new(),
            seq_pos: HashMap::new(),
        };

        let mut ordinal = 0;
        for (item, entry) in score.items.iter().enumerate() {
            let ScoreItem::Measure(measure) = entry else {
                continue;
            };
            let first = layout.hands.len();
            for (chord_index, chord) in measure.chords.iter().enumerate() {
                let mut staffs: BTreeMap<usize, [Option<GroupKey>; MAX_VOICES as usize]> =
                    BTreeMap::new();
                for key in chord.groups() {
                    let group = score.groups.get(key).ok_or_else(|| {
                        EngraveError::internal(measure.number, "chord names a group that no longer exists")
                    })?;
                    if !(1..=MAX_VOICES).contains(&group.voice) {
                        return Err(EngraveError::internal(
                            measure.number,
                            format!("group in voice {}", group.voice),
                        ));
                    }
                    let slot = &mut staffs.entry(group.staff).or_default()[group.voice as usize - 1];
                    if slot.is_some() {
                        return Err(EngraveError::internal(
                            measure.number,
                            format!(
                                "staff {} voice {} has two groups starting at {}",
                                group.staff, group.voice, chord.start
                            ),
                        ));
                    }
                    *slot = Some(key);
                }
                for (staff, voices) in staffs {
                    let index = layout.hands.len();
                    for key in voices.iter().flatten() {
                        layout.hand_of.insert(*key, index);
                    }
                    layout.hands.push(Hand {
                        item,
                        chord: chord_index,
                        staff,
                        voices,
                    });
                }
            }
            layout.by_item.insert(item, first..layout.hands.len());

            for staff in &measure.staffs {
                for (index, voice) in staff.voices.iter().enumerate() {
                    let Some(list) = voice else { continue };
                    let voice = (staff.staff, index as u8 + 1);
                    let sequence = layout.sequences.entry(voice).or_default();
                    for &key in list.iter().filter(|k| !score.groups[**k].grace) {
                        let pos = SeqPos {
                            voice,
                            index: sequence.len(),
                            ordinal,
                        };
                        layout.seq_pos.insert(key, pos);
                        sequence.push(key);
                    }
                }
            }
            ordinal += 1;
        }
        Ok(layout)
    }

    pub fn hand_of(&self, key: GroupKey) -> Option<usize> {
        self.hand_of.get(&key).copied()
    }

    /// Hands of the measure stored at `items[item]`.
    pub fn hands_in(&self, item: usize) -> Range<usize> {
        self.by_item.get(&item).cloned().unwrap_or(0..0)
    }

    fn neighbor(&self, key: GroupKey, forward: bool) -> Option<GroupKey> {
        let pos = self.seq_pos.get(&key)?;
        let sequence = self.sequences.get(&pos.voice)?;
        let other = if forward {
            *sequence.get(pos.index + 1)?
        } else {
            *sequence.get(pos.index.checked_sub(1)?)?
        };
        let other_ordinal = self.seq_pos.get(&other)?.ordinal;
        // Only adjacent measures are neighbors; a gap means the voice was absent.
        if other_ordinal.abs_diff(pos.ordinal) <= 1 {
            Some(other)
        } else {
            None
        }
    }

    /// Next non-grace group of the same voice, in this or the next measure.
    pub fn next_in_voice(&self, key: GroupKey) -> Option<GroupKey> {
        self.neighbor(key, true)
    }

    /// Previous non-grace group of the same voice, in this or the previous measure.
    pub fn prev_in_voice(&self, key: GroupKey) -> Option<GroupKey> {
        self.neighbor(key, false)
    }

    pub fn same_measure(&self, a: GroupKey, b: GroupKey) -> bool {
        match (self.seq_pos.get(&a), self.seq_pos.get(&b)) {
            (Some(x), Some(y)) => x.ordinal == y.ordinal,
            _ => false,
        }
    }
}

pub(crate) fn voice_list<'a>(
    score: &'a Score,
    item: usize,
    staff: usize,
    voice: u8,
) -> Result<&'a Vec<GroupKey>, EngraveError> {
    let measure = score
        .measure_at(item)
        .ok_or_else(|| EngraveError::internal(0, format!("score item {} is not a measure", item)))?;
    measure
        .staff(staff)
        .and_then(|s| s.voice(voice))
        .ok_or_else(|| {
            EngraveError::internal(
                measure.number,
                format!("hand names staff {} voice {}, which has no list", staff, voice),
            )
        })
}

pub(crate) fn voice_list_mut(
    score: &mut Score,
    item: usize,
    staff: usize,
    voice: u8,
) -> Result<&mut Vec<GroupKey>, EngraveError> {
    let measure = score
        .measure_at_mut(item)
        .ok_or_else(|| EngraveError::internal(0, format!("score item {} is not a measure", item)))?;
    let number = measure.number;
    measure
        .staff_mut(staff)
        .and_then(|s| s.voice_mut(voice))
        .ok_or_else(|| {
            EngraveError::internal(
                number,
                format!("hand names staff {} voice {}, which has no list", staff, voice),
            )
        })
}

/// The grace groups written directly before `key`, in time order.
pub(crate) fn grace_run(
    score: &Score,
    item: usize,
    staff: usize,
    voice: u8,
    key: GroupKey,
) -> Result<Vec<GroupKey>, EngraveError> {
    let list = voice_list(score, item, staff, voice)?;
    let pos = list.iter().position(|k| *k == key).ok_or_else(|| {
        EngraveError::internal(
            score.groups[key].measure,
            format!("group missing from staff {} voice {}", staff, voice),
        )
    })?;
    let start = list[..pos]
        .iter()
        .rposition(|k| !score.groups[*k].grace)
        .map_or(0, |i| i + 1);
    Ok(list[start..pos].to_vec())
}
