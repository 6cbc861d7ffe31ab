//! # Parameter Snapshots
//!
//! Score parameters change by position: a `params` entry in the main list
//! takes effect for every measure after it. Stages that depend on them walk
//! the main list front to back with a fresh [`ParamFeed`], applying each change
//! as they pass it, so every stage sees the same settings at the same measure.
//!
//! ## Resolution
//! - `time`: score context only
//! - `visible`: voice overrides staff overrides score; a voice on an
//!   invisible staff is invisible whatever its own setting says
//! - `vcombine`: staff overrides score

use crate::ir::TimeSignature;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strictness of pitch overlap when combining two voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    /// Every note of the upper voice above every note of the lower one.
    #[default]
    NoOverlap,
    /// The voices may meet at a single shared pitch.
    #[serde(alias = "one-step-apart")]
    ShareOne,
    /// No pitch restriction.
    Overlap,
    /// Only rests (and spaces) are combined.
    RestsOnly,
}

/// A combination request: which voices may share a printed voice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VCombine {
    #[serde(default)]
    pub voices: Vec<u8>,
    #[serde(default)]
    pub qualifier: Qualifier,
    /// Combine within a measure only if it works for the whole measure.
    #[serde(default)]
    pub bymeas: bool,
}

impl VCombine {
    pub fn is_active(&self) -> bool {
        self.voices.len() >= 2
    }

    /// Candidate (destination, source) pairs, lower voice first, in the
    /// order (1,2), (1,3), (2,3).
    pub fn pairs(&self) -> Vec<(u8, u8)> {
        let mut voices = self.voices.clone();
        voices.sort_unstable();
        voices.dedup();
        let mut pairs = Vec::new();
        for (i, &dest) in voices.iter().enumerate() {
            for &src in &voices[i + 1..] {
                pairs.push((dest, src));
            }
        }
        pairs
    }
}

/// Where a parameter change applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Score,
    Staff(usize),
    Voice(usize, u8),
}

/// Settings named in one parameter block. Absent fields leave the current
/// value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub time: Option<TimeSignature>,
    pub visible: Option<bool>,
    pub vcombine: Option<VCombine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamChange {
    pub context: Context,
    pub settings: Settings,
}

/// Replays parameter changes in score order.
#[derive(Debug, Clone, Default)]
pub struct ParamFeed {
    time: TimeSignature,
    visible: bool,
    vcombine: Option<VCombine>,
    staffs: HashMap<usize, Settings>,
    voices: HashMap<(usize, u8), Settings>,
}

impl ParamFeed {
    /// Feed positioned at the top of the piece.
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, change: &ParamChange) {
        let new = &change.settings;
        match change.context {
            Context::Score => {
                if let Some(time) = new.time {
                    self.time = time;
                }
                if let Some(visible) = new.visible {
                    self.visible = visible;
                }
                if let Some(vcombine) = &new.vcombine {
                    self.vcombine = Some(vcombine.clone());
                }
            }
            Context::Staff(staff) => merge_into(self.staffs.entry(staff).or_default(), new),
            Context::Voice(staff, voice) => {
                merge_into(self.voices.entry((staff, voice)).or_default(), new)
            }
        }
    }

    pub fn time(&self) -> TimeSignature {
        self.time
    }

    pub fn staff_visible(&self, staff: usize) -> bool {
        self.staffs
            .get(&staff)
            .and_then(|s| s.visible)
            .unwrap_or(self.visible)
    }

    pub fn voice_visible(&self, staff: usize, voice: u8) -> bool {
        if !self.staff_visible(staff) {
            return false;
        }
        self.voices
            .get(&(staff, voice))
            .and_then(|s| s.visible)
            .unwrap_or(true)
    }

    /// The combination request in force for a staff, if it names at least
    /// two voices.
    pub fn vcombine(&self, staff: usize) -> Option<&VCombine> {
        self.staffs
            .get(&staff)
            .and_then(|s| s.vcombine.as_ref())
            .or(self.vcombine.as_ref())
            .filter(|vc| vc.is_active())
    }
}

fn merge_into(current: &mut Settings, new: &Settings) {
    if new.time.is_some() {
        current.time = new.time;
    }
    if new.visible.is_some() {
        current.visible = new.visible;
    }
    if new.vcombine.is_some() {
        current.vcombine = new.vcombine.clone();
    }
}
