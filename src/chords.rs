//! # Chord List Builder
//!
//! Merges every visible voice and every lyric verse of a measure into one
//! time-ordered list of chords, one chord per distinct start time.
//!
//! ## Algorithm
//! Each voice or verse is a stream with a running end time. The first chord
//! starts at zero and takes every stream's first non-grace entry. After that,
//! the smallest running end time is the next chord's start; every stream
//! ending exactly there contributes its next entry and moves its end time on.
//! Streams ending later are left alone. This repeats until no stream has
//! anything left.
//!
//! Grace notes never start or end a chord. They are skipped when looking for
//! a stream's next entry, and trailing graces do not keep a stream alive.
//!
//! A chord lasts until the next chord starts; the last one lasts until the
//! end of the measure.

use crate::erase::erase_invisible;
use crate::error::EngraveError;
use crate::ir::*;
use crate::params::ParamFeed;
use crate::rational::{self, Time};
use log::debug;
use slotmap::SlotMap;

struct Entry {
    member: ChordMember,
    duration: Time,
    grace: bool,
}

/// One voice or verse being consumed.
struct Stream {
    entries: Vec<Entry>,
    pos: usize,
    elapsed: Time,
}

impl Stream {
    fn from_groups(groups: &SlotMap<GroupKey, Group>, list: &[GroupKey]) -> Self {
        let entries = list
            .iter()
            .map(|&key| Entry {
                member: ChordMember::Group(key),
                duration: groups[key].duration,
                grace: groups[key].grace,
            })
            .collect();
        Self::new(entries)
    }

    fn from_syllables(syllables: &SlotMap<SyllableKey, Syllable>, list: &[SyllableKey]) -> Self {
        let entries = list
            .iter()
            .map(|&key| Entry {
                member: ChordMember::Syllable(key),
                duration: syllables[key].duration,
                grace: false,
            })
            .collect();
        Self::new(entries)
    }

    fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            pos: 0,
            elapsed: rational::zero(),
        }
    }

    fn next_non_grace(&self, from: usize) -> Option<usize> {
        (from..self.entries.len()).find(|&i| !self.entries[i].grace)
    }

    /// Move to the entry at `index` and account for its duration.
    fn take(&mut self, index: usize) -> ChordMember {
        self.pos = index;
        self.elapsed += self.entries[index].duration;
        self.entries[index].member
    }
}

/// Build the chord list of every measure, erasing invisible voices on the way.
pub fn build_chords(score: &mut Score) -> Result<(), EngraveError> {
    let packexp = score.metadata.options.packexp;
    let Score {
        items,
        groups,
        syllables,
        tags,
        ..
    } = score;

    let mut feed = ParamFeed::new();
    for item in items.iter_mut() {
        let measure = match item {
            ScoreItem::Params(change) => {
                feed.apply(change);
                continue;
            }
            ScoreItem::Measure(measure) => measure,
        };
        let measure_duration = feed.time().duration();
        let mut streams = Vec::new();

        for staff in measure.staffs.iter_mut() {
            if !feed.staff_visible(staff.staff) {
                continue;
            }
            for (index, voice) in staff.voices.iter_mut().enumerate() {
                let Some(list) = voice else { continue };
                let visible = feed.voice_visible(staff.staff, index as u8 + 1);
                if erase_invisible(groups, tags, list, visible, measure_duration) {
                    debug!(
                        "measure {}: staff {} voice {} is invisible, replaced by a space",
                        measure.number,
                        staff.staff,
                        index + 1
                    );
                }
                streams.push(Stream::from_groups(groups, list));
            }
            for verse in &staff.verses {
                streams.push(Stream::from_syllables(syllables, verse));
            }
        }

        measure.chords = merge_streams(streams, measure.number, measure_duration, packexp)?;
        debug!("measure {}: {} chords", measure.number, measure.chords.len());
    }
    Ok(())
}

fn merge_streams(
    mut streams: Vec<Stream>,
    measure: usize,
    measure_duration: Time,
    packexp: f64,
) -> Result<Vec<Chord>, EngraveError> {
    if streams.is_empty() {
        return Ok(Vec::new());
    }

    let mut first = Chord::new(rational::zero());
    for stream in streams.iter_mut() {
        let head = stream
            .next_non_grace(0)
            .ok_or_else(|| EngraveError::internal(measure, "a voice holds only grace notes"))?;
        first.members.push(stream.take(head));
    }
    let mut chords = vec![first];

    loop {
        if streams.iter().all(|s| s.next_non_grace(s.pos + 1).is_none()) {
            break;
        }
        let Some(start) = streams.iter().map(|s| s.elapsed).min() else {
            break;
        };
        let mut chord = Chord::new(start);
        for stream in streams.iter_mut().filter(|s| s.elapsed == start) {
            let next = stream.next_non_grace(stream.pos + 1).ok_or_else(|| {
                EngraveError::internal(
                    measure,
                    format!("a voice ran out at {} before the measure ended", start),
                )
            })?;
            chord.members.push(stream.take(next));
        }
        chords.push(chord);
    }

    if let Some(stream) = streams.iter().find(|s| s.elapsed != measure_duration) {
        return Err(EngraveError::internal(
            measure,
            format!(
                "a voice ends at {} but the measure lasts {}",
                stream.elapsed, measure_duration
            ),
        ));
    }

    let starts: Vec<Time> = chords.iter().map(|c| c.start).collect();
    for (i, chord) in chords.iter_mut().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(measure_duration);
        chord.duration = end - chord.start;
        if chord.duration <= rational::zero() {
            return Err(EngraveError::internal(
                measure,
                format!("chord at {} has no duration", chord.start),
            ));
        }
        chord.pseudo_duration = rational::pseudo_duration(chord.duration, packexp);
    }
    Ok(chords)
}
