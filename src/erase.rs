//! Invisible voices.
//!
//! A voice that is not visible still has to occupy its measure so the other
//! voices line up, but nothing of it is printed. Its whole list, grace notes
//! included, is replaced by a single measure-long space.

use crate::ir::{Group, GroupKey, TagRef};
use crate::rational::Time;
use log::warn;
use slotmap::SlotMap;
use std::collections::BTreeMap;

/// Replace `list` with one space spanning `measure_duration` if the voice is
/// invisible. Returns whether the list was replaced.
///
/// Callers that located the first non-grace group before calling must look it
/// up again afterwards.
pub fn erase_invisible(
    groups: &mut SlotMap<GroupKey, Group>,
    tags: &mut BTreeMap<String, TagRef>,
    list: &mut Vec<GroupKey>,
    visible: bool,
    measure_duration: Time,
) -> bool {
    if visible {
        return false;
    }
    let Some(first) = list.first().and_then(|k| groups.get(*k)) else {
        return false;
    };
    let space = Group::measure_space(first.staff, first.voice, first.measure, measure_duration);

    for key in list.drain(..) {
        groups.remove(key);
    }
    tags.retain(|name, target| {
        let keep = groups.contains_key(target.group);
        if !keep {
            warn!("tag '{}' named a group of an invisible voice; dropped", name);
        }
        keep
    });
    list.push(groups.insert(space));
    true
}
