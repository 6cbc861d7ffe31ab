//! Pass 1: can two voices share a printed voice in this hand, looking at
//! nothing but the two groups (and the grace notes in front of them)?

use super::hand::{grace_run, Layout, PairCompat};
use crate::error::EngraveError;
use crate::ir::*;
use crate::params::{ParamFeed, Qualifier};
use log::trace;

/// Test every requested voice pair of every hand.
pub(crate) fn check_hands(score: &Score, layout: &Layout) -> Result<Vec<PairCompat>, EngraveError> {
    let mut compat = vec![PairCompat::default(); layout.hands.len()];
    let mut feed = ParamFeed::new();

    for (item, entry) in score.items.iter().enumerate() {
        match entry {
            ScoreItem::Params(change) => feed.apply(change),
            ScoreItem::Measure(measure) => {
                for h in layout.hands_in(item) {
                    let hand = &layout.hands[h];
                    let Some(vcombine) = feed.vcombine(hand.staff) else {
                        continue;
                    };
                    for (a, b) in vcombine.pairs() {
                        let (Some(ka), Some(kb)) = (hand.voice(a), hand.voice(b)) else {
                            continue;
                        };
                        let ok = groups_compatible(score, layout, ka, kb, vcombine.qualifier)
                            && graces_compatible(
                                &grace_run(score, item, hand.staff, a, ka)?,
                                &grace_run(score, item, hand.staff, b, kb)?,
                                score,
                                layout,
                                vcombine.qualifier,
                            );
                        trace!(
                            "measure {} chord {} staff {}: voices {} and {} {}",
                            measure.number,
                            hand.chord,
                            hand.staff,
                            a,
                            b,
                            if ok { "compatible" } else { "incompatible" }
                        );
                        compat[h].set(a, b, ok);
                    }
                }
            }
        }
    }
    Ok(compat)
}

/// Grace runs pair up from the main group backwards; extra graces on either
/// side are fine.
fn graces_compatible(
    a: &[GroupKey],
    b: &[GroupKey],
    score: &Score,
    layout: &Layout,
    qualifier: Qualifier,
) -> bool {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .all(|(ga, gb)| groups_compatible(score, layout, *ga, *gb, qualifier))
}

/// Optional attributes may differ only when one side leaves them unset.
fn agree<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

fn ties_in(score: &Score, layout: &Layout, key: GroupKey) -> bool {
    layout
        .prev_in_voice(key)
        .map_or(false, |prev| score.groups[prev].ties_out())
}

pub(crate) fn groups_compatible(
    score: &Score,
    layout: &Layout,
    ka: GroupKey,
    kb: GroupKey,
    qualifier: Qualifier,
) -> bool {
    let a = &score.groups[ka];
    let b = &score.groups[kb];

    if a.duration != b.duration || a.basic_time != b.basic_time || a.dots != b.dots {
        return false;
    }
    let tuplet_shape = |g: &Group| g.tuplet.map(|t| (t.loc, t.side, t.num, t.in_time_of));
    if tuplet_shape(a) != tuplet_shape(b) {
        return false;
    }
    if a.break_beam != b.break_beam || a.beam_to != b.beam_to || a.stem_to != b.stem_to {
        return false;
    }
    if a.crosses_voices() || b.crosses_voices() {
        return false;
    }

    if a.is_space() || b.is_space() {
        return true;
    }

    if a.size != b.size {
        return false;
    }
    match (a.content, b.content) {
        (Content::Rest, Content::Rest) | (Content::MeasureRepeat, Content::MeasureRepeat) => {
            return true
        }
        (Content::Notes, Content::Notes) => {}
        _ => return false,
    }
    if qualifier == Qualifier::RestsOnly {
        return false;
    }

    if a.head_shape != b.head_shape
        || a.beam != b.beam
        || !agree(&a.stem_dir, &b.stem_dir)
        || !agree(&a.stem_len, &b.stem_len)
        || !agree(&a.beam_slope, &b.beam_slope)
    {
        return false;
    }
    if a.ties_out() != b.ties_out() || ties_in(score, layout, ka) != ties_in(score, layout, kb) {
        return false;
    }
    if a.slash_alt != b.slash_alt || a.horiz_offset != b.horiz_offset || a.with_list != b.with_list {
        return false;
    }
    if (a.voice, b.voice) == (1, 2) && !rolls_compatible(a, b) {
        return false;
    }
    if (a.voice, b.voice) == (2, 1) && !rolls_compatible(b, a) {
        return false;
    }
    pitches_compatible(a, b, qualifier)
}

/// Voice 1's roll may run on into voice 2; anything else would print
/// differently once the two share a stem.
fn rolls_compatible(voice1: &Group, voice2: &Group) -> bool {
    match (voice1.roll, voice2.roll) {
        (Span::None, Span::None) => true,
        (Span::Start, Span::End) | (Span::Start, Span::Inner) => voice1.roll_dir == voice2.roll_dir,
        _ => false,
    }
}

/// Top to bottom, the voices sit 1, 3, 2.
fn vertical_rank(voice: u8) -> u8 {
    match voice {
        1 => 0,
        3 => 1,
        _ => 2,
    }
}

fn pitches_compatible(a: &Group, b: &Group, qualifier: Qualifier) -> bool {
    let (upper, lower) = if vertical_rank(a.voice) <= vertical_rank(b.voice) {
        (a, b)
    } else {
        (b, a)
    };

    for note in &upper.notes {
        if let Some(other) = lower.notes.iter().find(|n| n.same_position(note)) {
            if note.accidental != other.accidental
                || note.size != other.size
                || note.tie != other.tie
                || note.slur_to != other.slur_to
            {
                return false;
            }
        }
    }

    let lowest_upper = upper.notes.iter().map(Note::step).min();
    let highest_lower = lower.notes.iter().map(Note::step).max();
    let (Some(lowest_upper), Some(highest_lower)) = (lowest_upper, highest_lower) else {
        return false;
    };
    match qualifier {
        Qualifier::Overlap => true,
        Qualifier::ShareOne => lowest_upper >= highest_lower,
        Qualifier::NoOverlap => lowest_upper > highest_lower,
        Qualifier::RestsOnly => false,
    }
}
