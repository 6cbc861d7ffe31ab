//! Pass 2: a pair that is compatible on its own may still have to stay
//! apart because a beam, tie or slur (or a measure-wide request) ties it to
//! neighboring hands where the pair is not compatible.

use super::hand::{Layout, Merge, PairCompat, Plan};
use crate::ir::*;
use crate::params::ParamFeed;
use log::trace;

/// Choose the merges of every hand. `compat` is updated as merges are chosen,
/// so a voice folded into another carries its incompatibilities along.
pub(crate) fn plan_merges(score: &Score, layout: &Layout, compat: &mut [PairCompat]) -> Vec<Plan> {
    let mut plans = vec![Plan::new(); layout.hands.len()];
    let mut bymeas = vec![false; layout.hands.len()];
    let mut feed = ParamFeed::new();

    for (item, entry) in score.items.iter().enumerate() {
        let measure = match entry {
            ScoreItem::Params(change) => {
                feed.apply(change);
                continue;
            }
            ScoreItem::Measure(measure) => measure,
        };
        for h in layout.hands_in(item) {
            let hand = &layout.hands[h];
            let Some(vcombine) = feed.vcombine(hand.staff) else {
                continue;
            };
            bymeas[h] = vcombine.bymeas;
            let mut sources: Vec<u8> = Vec::new();
            for (dest, src) in vcombine.pairs() {
                if plans[h].is_full() {
                    break;
                }
                if sources.contains(&dest) || sources.contains(&src) {
                    continue;
                }
                let (Some(kd), Some(ks)) = (hand.voice(dest), hand.voice(src)) else {
                    continue;
                };
                if !compat[h].get(dest, src) {
                    continue;
                }
                let pair = Walk {
                    score,
                    layout,
                    dest,
                    src,
                    bymeas: vcombine.bymeas,
                };
                let compatible = |n: usize| compat[n].get(dest, src);
                if !pair.agrees(kd, ks, true, &compatible) || !pair.agrees(kd, ks, false, &compatible) {
                    trace!(
                        "measure {} staff {}: voices {} and {} disagree with a neighbor",
                        measure.number,
                        hand.staff,
                        dest,
                        src
                    );
                    continue;
                }
                plans[h].push(Merge { dest, src });
                compat[h].absorb(dest, src);
                sources.push(src);
            }
        }
    }

    settle(score, layout, &bymeas, &mut plans);
    plans
}

/// Hands are planned front to back, so a later hand's transitivity
/// correction can undo a merge its linked neighbors already chose. Drop any
/// merge whose linked hands do not all make it too, until nothing changes.
fn settle(score: &Score, layout: &Layout, bymeas: &[bool], plans: &mut [Plan]) {
    loop {
        let mut dropped = Vec::new();
        for (h, plan) in plans.iter().enumerate() {
            let hand = &layout.hands[h];
            for merge in plan {
                let (Some(kd), Some(ks)) = (hand.voice(merge.dest), hand.voice(merge.src)) else {
                    dropped.push((h, *merge));
                    continue;
                };
                let pair = Walk {
                    score,
                    layout,
                    dest: merge.dest,
                    src: merge.src,
                    bymeas: bymeas[h],
                };
                let planned = |n: usize| plans[n].contains(merge);
                if !pair.agrees(kd, ks, true, &planned) || !pair.agrees(kd, ks, false, &planned) {
                    dropped.push((h, *merge));
                }
            }
        }
        if dropped.is_empty() {
            return;
        }
        for (h, merge) in dropped {
            trace!(
                "staff {}: voice {} no longer merges into voice {}, a linked hand keeps them apart",
                layout.hands[h].staff,
                merge.src,
                merge.dest
            );
            plans[h].retain(|m| *m != merge);
        }
    }
}

struct Walk<'a> {
    score: &'a Score,
    layout: &'a Layout,
    dest: u8,
    src: u8,
    bymeas: bool,
}

impl Walk<'_> {
    fn step(&self, key: GroupKey, forward: bool) -> Option<GroupKey> {
        if forward {
            self.layout.next_in_voice(key)
        } else {
            self.layout.prev_in_voice(key)
        }
    }

    fn continues(&self, key: Option<GroupKey>) -> bool {
        key.map_or(false, |k| self.score.groups[k].continues_onward())
    }

    /// Walk from the pair's groups while something links them onward (or
    /// back), requiring `accept` of every hand reached.
    fn agrees(&self, mut kd: GroupKey, mut ks: GroupKey, forward: bool, accept: &dyn Fn(usize) -> bool) -> bool {
        loop {
            let nd = self.step(kd, forward);
            let ns = self.step(ks, forward);
            let linked = if forward {
                self.continues(Some(kd)) || self.continues(Some(ks))
            } else {
                self.continues(nd) || self.continues(ns)
            };
            let within_measure = self.bymeas
                && (nd.map_or(false, |n| self.layout.same_measure(kd, n))
                    || ns.map_or(false, |n| self.layout.same_measure(ks, n)));
            if !linked && !within_measure {
                return true;
            }
            match (nd, ns) {
                (None, None) => return true,
                (Some(nd), Some(ns)) => {
                    let (Some(hd), Some(hs)) = (self.layout.hand_of(nd), self.layout.hand_of(ns)) else {
                        return false;
                    };
                    if hd != hs || !accept(hd) {
                        return false;
                    }
                    kd = nd;
                    ks = ns;
                }
                _ => return false,
            }
        }
    }
}
