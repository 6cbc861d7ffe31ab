use super::compat::check_hands;
use super::hand::{Layout, Merge, Plan};
use super::merge::merge_groups;
use super::neighbors::plan_merges;
use super::*;
use crate::chords::build_chords;
use crate::input::parse;
use crate::ir::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn prepared(source: &str) -> Score {
    let mut score = parse(source).unwrap();
    build_chords(&mut score).unwrap();
    score
}

fn combined(source: &str) -> (Score, usize) {
    let mut score = prepared(source);
    let count = combine_voices(&mut score).unwrap();
    (score, count)
}

/// Printed form of one voice of one measure (measures counted from 1).
fn printed(score: &Score, measure: usize, staff: usize, voice: u8) -> Vec<String> {
    let measure = score.measures().nth(measure - 1).unwrap();
    measure
        .staff(staff)
        .unwrap()
        .voice(voice)
        .unwrap()
        .iter()
        .map(|k| score.groups[*k].describe())
        .collect()
}

#[test]
fn test_unison_becomes_one_note() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: shareone }
music:
  - measure:
      - voices:
          1: [ {time: "1", notes: [c5]} ]
          2: [ {time: "1", notes: [c5]} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["1 c5"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["1 s"]);
}

#[test]
fn test_nooverlap_rejects_shared_pitch() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2] }
music:
  - measure:
      - voices:
          1: [ {time: "2", notes: [c5]}, {time: "2", notes: [e5]} ]
          2: [ {time: "2", notes: [c5]}, {time: "2", notes: [c5]} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["2 c5", "2 e5 c5"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["2 c5", "2 s"]);
}

#[test]
fn test_voice_two_above_voice_one_needs_overlap() {
    let source = |qualifier: &str| {
        format!(
            r#"
vcombine: {{ voices: [1, 2], qualifier: {} }}
music:
  - measure:
      - voices:
          1: [ {{time: "1", notes: [c5]}} ]
          2: [ {{time: "1", notes: [e5]}} ]
"#,
            qualifier
        )
    };
    assert_eq!(combined(&source("nooverlap")).1, 0);
    assert_eq!(combined(&source("shareone")).1, 0);
    let (score, count) = combined(&source("overlap"));
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["1 e5 c5"]);
}

#[test]
fn test_different_rhythms_stay_apart() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "2", notes: [e5]}, {time: "2", notes: [e5]} ]
          2: [ {time: "1", notes: [c5]} ]
"#,
    );
    assert_eq!(count, 0);
    assert_eq!(printed(&score, 1, 1, 2), vec!["1 c5"]);
}

#[test]
fn test_rests_combine_with_rests_only() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "2", rest: true}, {time: "2", rest: true} ]
          2: [ {time: "2", rest: true}, {time: "2", notes: [c4]} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["2 r", "2 r"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["2 s", "2 c4"]);
}

#[test]
fn test_restsonly_leaves_notes_alone() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: restsonly }
music:
  - measure:
      - voices:
          1: [ {time: "2", notes: [e5]}, {time: "2", rest: true} ]
          2: [ {time: "2", notes: [c4]}, {time: "2", rest: true} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["2 e5", "2 r"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["2 c4", "2 s"]);
}

#[test]
fn test_space_yields_to_the_other_voice() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2] }
music:
  - measure:
      - voices:
          1: [ {time: "1", space: true} ]
          2: [ {time: "1", notes: [g3]} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["1 g3"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["1 s"]);
    let voice1 = score.measures().next().unwrap().staff(1).unwrap().voice(1).unwrap()[0];
    assert_eq!(score.groups[voice1].voice, 1);
}

#[test]
fn test_measure_repeats_combine_with_each_other() {
    let (_, count) = combined(
        r#"
vcombine: { voices: [1, 2] }
music:
  - measure:
      - voices:
          1: [ {time: "m", mrpt: true} ]
          2: [ {time: "m", mrpt: true} ]
  - measure:
      - voices:
          1: [ {time: "m", mrpt: true} ]
          2: [ {time: "1", notes: [c4]} ]
"#,
    );
    assert_eq!(count, 1);
}

#[test]
fn test_cross_voice_tie_blocks_combination() {
    let (_, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "2", notes: [e5]}, {time: "2", notes: [{pitch: e5, tie-to-voice: 2}]} ]
          2: [ {time: "2", notes: [c5]}, {time: "2", notes: [c5]} ]
"#,
    );
    assert_eq!(count, 1);
}

#[test]
fn test_bymeas_needs_the_whole_measure() {
    let source = |bymeas: bool| {
        format!(
            r#"
vcombine: {{ voices: [1, 2], bymeas: {} }}
music:
  - measure:
      - voices:
          1: [ {{time: "2", notes: [e5]}}, {{time: "2", notes: [c5]}} ]
          2: [ {{time: "2", notes: [c5]}}, {{time: "2", notes: [e5]}} ]
  - measure:
      - voices:
          1: [ {{time: "1", notes: [g5]}} ]
          2: [ {{time: "1", notes: [g4]}} ]
"#,
            bymeas
        )
    };
    let (score, count) = combined(&source(false));
    assert_eq!(count, 2);
    assert_eq!(printed(&score, 1, 1, 2), vec!["2 s", "2 e5"]);

    let (score, count) = combined(&source(true));
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 2), vec!["2 c5", "2 e5"]);
    assert_eq!(printed(&score, 2, 1, 2), vec!["1 s"]);
}

#[test]
fn test_beam_carries_incompatibility_to_its_start() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2] }
music:
  - measure:
      - voices:
          1: [ {time: "8", notes: [g5], beam: start}, {time: "8", notes: [d5], beam: end}, {time: "2.", notes: [g5]} ]
          2: [ {time: "8", notes: [c5], beam: start}, {time: "8", notes: [e5], beam: end}, {time: "2.", notes: [c5]} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["8 g5", "8 d5", "2. g5 c5"]);
}

#[test]
fn test_tie_across_barline_checks_next_measure() {
    let source = |second: &str| {
        format!(
            r#"
vcombine: {{ voices: [1, 2] }}
music:
  - measure:
      - voices:
          1: [ {{time: "1", notes: [{{pitch: e5, tie: true}}]}} ]
          2: [ {{time: "1", notes: [{{pitch: c5, tie: true}}]}} ]
  - measure:
      - voices:
          1: [ {{time: "1", notes: [e5]}} ]
          2: [ {} ]
"#,
            second
        )
    };
    let (score, count) = combined(&source(r#"{time: "1", rest: true}"#));
    assert_eq!(count, 0);
    assert_eq!(printed(&score, 1, 1, 2), vec!["1 c5"]);

    let (score, count) = combined(&source(r#"{time: "1", notes: [c5]}"#));
    assert_eq!(count, 2);
    assert_eq!(printed(&score, 1, 1, 1), vec!["1 e5 c5"]);
    assert_eq!(printed(&score, 2, 1, 1), vec!["1 e5 c5"]);
}

#[test]
fn test_three_voices_merge_twice() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2, 3], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "1", notes: [e5]} ]
          2: [ {time: "1", notes: [c4]} ]
          3: [ {time: "1", notes: [g4]} ]
"#,
    );
    assert_eq!(count, 2);
    assert_eq!(printed(&score, 1, 1, 1), vec!["1 e5 g4 c4"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["1 s"]);
    assert_eq!(printed(&score, 1, 1, 3), vec!["1 s"]);
}

#[test]
fn test_merged_voice_inherits_incompatibility() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2, 3] }
music:
  - measure:
      - voices:
          1: [ {time: "1", space: true} ]
          2: [ {time: "1", notes: [c4]} ]
          3: [ {time: "1", rest: true} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["1 c4"]);
    assert_eq!(printed(&score, 1, 1, 3), vec!["1 r"]);
}

#[test]
fn test_wish_list_change_applies_from_its_position() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2] }
music:
  - measure:
      - voices:
          1: [ {time: "1", notes: [e5]} ]
          2: [ {time: "1", notes: [c5]} ]
  - params: { staff: 1, vcombine: { voices: [] } }
  - measure:
      - voices:
          1: [ {time: "1", notes: [e5]} ]
          2: [ {time: "1", notes: [c5]} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 2, 1, 2), vec!["1 c5"]);
}

#[test]
fn test_only_named_staff_combines() {
    let (score, count) = combined(
        r#"
staffs: 2
music:
  - params: { staff: 2, vcombine: { voices: [1, 2], qualifier: overlap } }
  - measure:
      - staff: 1
        voices:
          1: [ {time: "1", notes: [e5]} ]
          2: [ {time: "1", notes: [c5]} ]
      - staff: 2
        voices:
          1: [ {time: "1", notes: [e3]} ]
          2: [ {time: "1", notes: [c3]} ]
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 2), vec!["1 c5"]);
    assert_eq!(printed(&score, 1, 2, 2), vec!["1 s"]);
}

#[test]
fn test_surplus_graces_move_to_destination() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "8", grace: true, notes: [f5], beam: end}, {time: "1", notes: [e5]} ]
          2:
            - {time: "8", grace: true, notes: [b3], beam: start}
            - {time: "8", grace: true, notes: [d4], beam: end}
            - {time: "1", notes: [c4]}
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["g8 b3", "g8 f5 d4", "1 e5 c4"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["g8 s", "1 s"]);

    let voice1 = score.measures().next().unwrap().staff(1).unwrap().voice(1).unwrap();
    let beams: Vec<Span> = voice1[..2].iter().map(|k| score.groups[*k].beam).collect();
    assert_eq!(beams, vec![Span::Start, Span::End]);
    assert!(voice1.iter().all(|k| score.groups[*k].voice == 1));
    // The paired source grace stays behind as a space.
    assert_eq!(score.groups.len(), 5);
}

#[test]
fn test_moved_graces_keep_their_own_beam() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "8", grace: true, notes: [f5]}, {time: "1", notes: [e5]} ]
          2:
            - {time: "16", grace: true, notes: [a3], beam: start}
            - {time: "16", grace: true, notes: [b3], beam: end}
            - {time: "8", grace: true, notes: [d4]}
            - {time: "1", notes: [c4]}
"#,
    );
    assert_eq!(count, 1);
    assert_eq!(printed(&score, 1, 1, 1), vec!["g16 a3", "g16 b3", "g8 f5 d4", "1 e5 c4"]);
    let voice1 = score.measures().next().unwrap().staff(1).unwrap().voice(1).unwrap();
    let beams: Vec<Span> = voice1[..3].iter().map(|k| score.groups[*k].beam).collect();
    assert_eq!(beams, vec![Span::Start, Span::End, Span::None]);
}

#[test]
fn test_third_voice_follows_its_whole_beam() {
    let (score, count) = combined(
        r#"
vcombine: { voices: [1, 2, 3], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "8", notes: [e5], beam: start}, {time: "8", notes: [e5], beam: end}, {time: "2.", rest: true} ]
          2: [ {time: "8", notes: [c5], beam: start}, {time: "8", notes: [c5], beam: end}, {time: "2.", rest: true} ]
          3: [ {time: "8", notes: [c5], beam: start}, {time: "8", notes: [c#5], beam: end}, {time: "2.", rest: true} ]
"#,
    );
    assert_eq!(printed(&score, 1, 1, 1), vec!["8 e5 c5", "8 e5 c5", "2. r"]);
    assert_eq!(printed(&score, 1, 1, 2), vec!["8 s", "8 s", "2. s"]);
    assert_eq!(printed(&score, 1, 1, 3), vec!["8 c5", "8 c#5", "2. s"]);
    assert_eq!(count, 4);
}

#[test]
fn test_linked_hands_plan_the_same_merges() {
    let score = prepared(
        r#"
vcombine: { voices: [1, 2, 3], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "8", notes: [e5], beam: start}, {time: "8", notes: [e5], beam: inner}, {time: "8", notes: [e5], beam: end}, {time: "8", rest: true}, {time: "2", rest: true} ]
          2: [ {time: "8", notes: [c5], beam: start}, {time: "8", notes: [c5], beam: inner}, {time: "8", notes: [c5], beam: end}, {time: "8", rest: true}, {time: "2", rest: true} ]
          3: [ {time: "8", notes: [c5], beam: start}, {time: "8", notes: [c5], beam: inner}, {time: "8", notes: [c#5], beam: end}, {time: "8", rest: true}, {time: "2", rest: true} ]
"#,
    );
    let layout = Layout::new(&score).unwrap();
    let mut compat = check_hands(&score, &layout).unwrap();
    let plans = plan_merges(&score, &layout, &mut compat);
    let beamed: Vec<&Plan> = plans.iter().take(3).collect();
    assert!(beamed.iter().all(|p| p.as_slice() == beamed[0].as_slice()));
    assert_eq!(beamed[0].as_slice(), &[Merge { dest: 1, src: 2 }]);
}

#[test]
fn test_incompatible_graces_block_combination() {
    let (_, count) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "16", grace: true, notes: [f5]}, {time: "1", notes: [e5]} ]
          2: [ {time: "8", grace: true, notes: [d4]}, {time: "1", notes: [c4]} ]
"#,
    );
    assert_eq!(count, 0);
}

#[test]
fn test_tags_follow_merged_notes() {
    let (score, _) = combined(
        r#"
vcombine: { voices: [1, 2], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "1", notes: [{pitch: g5, tag: top}, {pitch: e4, tag: low}]} ]
          2: [ {time: "1", notes: [{pitch: f4, tag: mid}], tag: lower-voice} ]
"#,
    );
    let dest = score.measures().next().unwrap().staff(1).unwrap().voice(1).unwrap()[0];
    assert_eq!(score.tags["top"], TagRef { group: dest, note: Some(0) });
    assert_eq!(score.tags["mid"], TagRef { group: dest, note: Some(1) });
    assert_eq!(score.tags["low"], TagRef { group: dest, note: Some(2) });
    assert_eq!(score.tags["lower-voice"], TagRef { group: dest, note: None });
}

#[test]
fn test_voice_lists_keep_their_shape() {
    let source = r#"
vcombine: { voices: [1, 2, 3], qualifier: overlap }
music:
  - measure:
      - voices:
          1: [ {time: "4", notes: [e5]}, {time: "4", notes: [e5]}, {time: "2", rest: true} ]
          2: [ {time: "4", notes: [c4]}, {time: "4", rest: true}, {time: "2", rest: true} ]
          3: [ {time: "4", notes: [g4]}, {time: "4", notes: [g4]}, {time: "2", notes: [g4]} ]
"#;
    let before = prepared(source);
    let (after, count) = combined(source);
    assert!(count > 0);
    for voice in 1..=3 {
        assert_eq!(
            printed(&before, 1, 1, voice).len(),
            printed(&after, 1, 1, voice).len()
        );
    }
}

#[test]
fn test_pass_one_incompatibility_is_final() {
    let score = prepared(
        r#"
vcombine: { voices: [1, 2, 3], qualifier: shareone }
music:
  - measure:
      - voices:
          1: [ {time: "4", notes: [e5]}, {time: "4", notes: [c5]}, {time: "4", rest: true}, {time: "4", notes: [g5]} ]
          2: [ {time: "4", notes: [c5]}, {time: "4", notes: [e5]}, {time: "4", rest: true}, {time: "4", space: true} ]
          3: [ {time: "4", notes: [d5]}, {time: "4", notes: [d5]}, {time: "4", notes: [d5]}, {time: "4", notes: [d5]} ]
"#,
    );
    let layout = Layout::new(&score).unwrap();
    let local = check_hands(&score, &layout).unwrap();
    let mut compat = local.clone();
    let plans = plan_merges(&score, &layout, &mut compat);

    let mut planned = 0;
    for (h, plan) in plans.iter().enumerate() {
        assert!(plan.len() <= 2);
        for merge in plan {
            assert!(local[h].get(merge.dest, merge.src));
            planned += 1;
        }
    }
    assert!(planned > 0);
}

#[test]
fn test_merge_keeps_every_pitch_once() {
    let pitches = |letters: &[(NoteName, i8)]| -> Vec<Note> {
        letters
            .iter()
            .map(|&(letter, octave)| Note {
                letter,
                octave,
                ..Default::default()
            })
            .collect()
    };
    let cases = [
        (
            pitches(&[(NoteName::G, 5), (NoteName::C, 5)]),
            pitches(&[(NoteName::C, 5), (NoteName::A, 4)]),
        ),
        (
            pitches(&[(NoteName::E, 4)]),
            pitches(&[(NoteName::B, 5), (NoteName::E, 4), (NoteName::C, 3)]),
        ),
    ];
    for (dest_notes, src_notes) in cases {
        let dest = Group {
            notes: dest_notes,
            ..Default::default()
        };
        let src = Group {
            voice: 2,
            notes: src_notes,
            ..Default::default()
        };
        let merged = merge_groups(&dest, &src);
        let expected: BTreeSet<(NoteName, i8)> = dest
            .notes
            .iter()
            .chain(&src.notes)
            .map(|n| (n.letter, n.octave))
            .collect();
        let got: Vec<(NoteName, i8)> = merged.group.notes.iter().map(|n| (n.letter, n.octave)).collect();
        assert_eq!(got.len(), expected.len());
        assert_eq!(got.iter().copied().collect::<BTreeSet<_>>(), expected);
        assert!(merged.group.notes.windows(2).all(|w| w[0].step() > w[1].step()));
    }
}
