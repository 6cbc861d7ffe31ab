//! Pass 3: carry out the planned merges.

use super::hand::{grace_run, voice_list_mut, Hand, Layout, Merge, Plan};
use crate::error::EngraveError;
use crate::ir::*;
use log::trace;
use std::collections::BTreeMap;

/// A merged group plus where each original note ended up in it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Merged {
    pub group: Group,
    /// `dest_slots[i]` is the new index of the destination's note `i`.
    pub dest_slots: Vec<usize>,
    pub src_slots: Vec<usize>,
}

/// Run every plan. Returns how many merges were made.
pub(crate) fn execute(score: &mut Score, layout: &Layout, plans: &[Plan]) -> Result<usize, EngraveError> {
    let mut count = 0;
    for (hand, plan) in layout.hands.iter().zip(plans) {
        for merge in plan {
            let number = score.measure_at(hand.item).map_or(0, |m| m.number);
            let missing = |voice: u8| {
                EngraveError::internal(
                    number,
                    format!("planned merge names staff {} voice {}, which is empty", hand.staff, voice),
                )
            };
            let dest = hand.voice(merge.dest).ok_or_else(|| missing(merge.dest))?;
            let src = hand.voice(merge.src).ok_or_else(|| missing(merge.src))?;

            merge_graces(score, hand, merge, dest, src)?;
            apply_merge(score, dest, src);
            trace!(
                "measure {} chord {} staff {}: voice {} merged into voice {}",
                number,
                hand.chord,
                hand.staff,
                merge.src,
                merge.dest
            );
            count += 1;
        }
    }
    Ok(count)
}

/// Fold `src` into `dest` and leave a space where `src` was.
fn apply_merge(score: &mut Score, dest: GroupKey, src: GroupKey) {
    let merged = merge_groups(&score.groups[dest], &score.groups[src]);
    relink_tags(&mut score.tags, dest, src, &merged);
    let space = score.groups[src].to_space();
    score.groups[dest] = merged.group;
    score.groups[src] = space;
}

/// Pair the grace runs from the main groups backwards. Paired source graces
/// fold into their partners and stay behind as grace spaces; any left over
/// leave the source voice for the front of the destination's run, so only
/// they change the length of the two lists.
fn merge_graces(
    score: &mut Score,
    hand: &Hand,
    merge: &Merge,
    dest: GroupKey,
    src: GroupKey,
) -> Result<(), EngraveError> {
    let src_run = grace_run(score, hand.item, hand.staff, merge.src, src)?;
    if src_run.is_empty() {
        return Ok(());
    }
    let dest_run = grace_run(score, hand.item, hand.staff, merge.dest, dest)?;
    let surplus = src_run.len() - dest_run.len().min(src_run.len());

    for (&d, &s) in dest_run.iter().rev().zip(src_run.iter().rev()) {
        let merged = merge_groups(&score.groups[d], &score.groups[s]);
        relink_tags(&mut score.tags, d, s, &merged);
        let space = score.groups[s].to_space();
        score.groups[d] = merged.group;
        score.groups[s] = space;
    }

    let moved = &src_run[..surplus];
    if moved.is_empty() {
        return Ok(());
    }
    for &key in moved {
        score.groups[key].voice = merge.dest;
    }
    voice_list_mut(score, hand.item, hand.staff, merge.src)?.retain(|k| !moved.contains(k));

    let anchor = dest_run.first().copied().unwrap_or(dest);
    let number = score.groups[dest].measure;
    let dest_list = voice_list_mut(score, hand.item, hand.staff, merge.dest)?;
    let at = dest_list
        .iter()
        .position(|k| *k == anchor)
        .ok_or_else(|| EngraveError::internal(number, "grace run lost its anchor"))?;
    for (offset, &key) in moved.iter().enumerate() {
        dest_list.insert(at + offset, key);
    }

    if dest_run.iter().any(|k| score.groups[*k].beam != Span::None) {
        let run: Vec<GroupKey> = moved.iter().chain(&dest_run).copied().collect();
        rebeam(&mut score.groups, &run);
    }
    Ok(())
}

/// A beamed grace run that grew needs its start and end redrawn.
fn rebeam(groups: &mut slotmap::SlotMap<GroupKey, Group>, run: &[GroupKey]) {
    if run.len() < 2 {
        return;
    }
    let last = run.len() - 1;
    for (i, key) in run.iter().enumerate() {
        groups[*key].beam = match i {
            0 => Span::Start,
            i if i == last => Span::End,
            _ => Span::Inner,
        };
    }
}

/// Point tags at the merged group: destination note tags follow their note to
/// its new index, source tags move over to the destination.
fn relink_tags(tags: &mut BTreeMap<String, TagRef>, dest: GroupKey, src: GroupKey, merged: &Merged) {
    for target in tags.values_mut() {
        if target.group == dest {
            if let Some(i) = target.note {
                target.note = merged.dest_slots.get(i).copied().or(Some(i));
            }
        } else if target.group == src {
            target.group = dest;
            target.note = target.note.and_then(|i| merged.src_slots.get(i).copied());
        }
    }
}

/// Voice 1's roll running on into voice 2 collapses into one.
fn combine_rolls(dest: Span, src: Span) -> Span {
    match (dest, src) {
        (Span::Start, Span::End) => Span::Lone,
        (Span::Start, Span::Inner) => Span::Start,
        (Span::None, other) => other,
        (kept, _) => kept,
    }
}

fn identity(len: usize) -> Vec<usize> {
    (0..len).collect()
}

/// Combine two compatible groups into a new one for the destination's voice.
pub(crate) fn merge_groups(dest: &Group, src: &Group) -> Merged {
    if src.is_space() {
        return Merged {
            group: dest.clone(),
            dest_slots: identity(dest.notes.len()),
            src_slots: Vec::new(),
        };
    }
    if dest.is_space() {
        let group = Group {
            staff: dest.staff,
            voice: dest.voice,
            ..src.clone()
        };
        return Merged {
            group,
            dest_slots: Vec::new(),
            src_slots: identity(src.notes.len()),
        };
    }

    let mut group = dest.clone();
    if let (Some(ours), Some(theirs)) = (group.tuplet.as_mut(), src.tuplet) {
        if ours.print == TupletPrint::Default {
            ours.print = theirs.print;
        }
    }
    group.stem_len = dest.stem_len.or(src.stem_len);
    group.stem_dir = dest.stem_dir.or(src.stem_dir);
    group.beam_slope = dest.beam_slope.or(src.beam_slope);
    group.head_shape = dest.head_shape.clone().or_else(|| src.head_shape.clone());
    group.roll_dir = dest.roll_dir.or(src.roll_dir);
    group.roll = combine_rolls(dest.roll, src.roll);

    if dest.content != Content::Notes || src.content != Content::Notes {
        return Merged {
            dest_slots: identity(dest.notes.len()),
            src_slots: Vec::new(),
            group,
        };
    }

    let mut notes = dest.notes.clone();
    let mut src_slots = Vec::with_capacity(src.notes.len());
    for note in &src.notes {
        match notes.iter().position(|n| n.same_position(note)) {
            Some(i) => {
                notes[i].paren &= note.paren;
                notes[i].acc_paren &= note.acc_paren;
                src_slots.push(i);
            }
            None => {
                notes.push(note.clone());
                src_slots.push(notes.len() - 1);
            }
        }
    }

    let mut order = identity(notes.len());
    order.sort_by(|&x, &y| notes[y].step().cmp(&notes[x].step()));
    let mut new_index = vec![0; notes.len()];
    for (new, &old) in order.iter().enumerate() {
        new_index[old] = new;
    }
    group.notes = order.iter().map(|&i| notes[i].clone()).collect();

    Merged {
        group,
        dest_slots: identity(dest.notes.len()).into_iter().map(|i| new_index[i]).collect(),
        src_slots: src_slots.into_iter().map(|i| new_index[i]).collect(),
    }
}
