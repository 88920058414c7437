//! Tests for the propagator state machines

use super::*;
use crate::error::EngineError;
use crate::wire::{EventKind, WireKind};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn output(
    input: ResponseMode,
    output: ResponseMode,
    kind: EventKind,
) -> OutputPropagator {
    OutputPropagator::new(input, output, kind, 36, 0, None).unwrap()
}

#[test]
fn test_gate_to_gate_passes_presses_and_releases() {
    let mut p = output(ResponseMode::Gate, ResponseMode::Gate, EventKind::NoteOnOff);

    let on = p.handle_message(WireEvent::note_on(0, 36, 100)).unwrap();
    assert_eq!(on, Some(WireEvent::note_on(0, 36, 100)));
    assert_eq!(p.state(), OutputState::On);

    let off = p.handle_message(WireEvent::note_off(0, 36, 0)).unwrap();
    assert_eq!(off, Some(WireEvent::note_off(0, 36, 0)));
    assert_eq!(p.state(), OutputState::Off);
}

#[test]
fn test_gate_to_toggle_alternates_and_suppresses_releases() {
    let mut p = output(ResponseMode::Gate, ResponseMode::Toggle, EventKind::NoteOnOff);

    let first = p.handle_message(WireEvent::note_on(0, 36, 64)).unwrap();
    assert_eq!(first, Some(WireEvent::note_on(0, 36, 127)));

    assert_eq!(p.handle_message(WireEvent::note_off(0, 36, 0)).unwrap(), None);
    assert_eq!(p.last_emitted(), first);

    let second = p.handle_message(WireEvent::note_on(0, 36, 64)).unwrap();
    assert_eq!(second, Some(WireEvent::note_off(0, 36, 0)));
    assert_eq!(p.state(), OutputState::Off);
}

#[test]
fn test_gate_to_toggle_on_control_change() {
    let mut p = output(ResponseMode::Gate, ResponseMode::Toggle, EventKind::ControlChange);

    let values: Vec<u8> = (0..4)
        .filter_map(|_| {
            let out = p.handle_message(WireEvent::note_on(0, 36, 100)).unwrap();
            p.handle_message(WireEvent::note_off(0, 36, 0)).unwrap();
            out.map(|e| e.value)
        })
        .collect();
    assert_eq!(values, vec![127, 0, 127, 0]);
}

#[test]
fn test_illogical_pairs_rejected() {
    let err = OutputPropagator::new(
        ResponseMode::Linear,
        ResponseMode::Toggle,
        EventKind::ControlChange,
        1,
        0,
        None,
    )
    .unwrap_err();
    assert_eq!(
        err,
        EngineError::IllogicalResponse {
            input: ResponseMode::Linear,
            output: ResponseMode::Toggle
        }
    );

    let mut p = output(ResponseMode::Toggle, ResponseMode::Toggle, EventKind::NoteOnOff);
    assert!(p.set_output_response(ResponseMode::Gate).is_err());
    assert_eq!(p.output_response(), ResponseMode::Toggle);
}

#[test]
fn test_single_note_kind_under_gate_is_fatal() {
    let mut p = output(ResponseMode::Gate, ResponseMode::Gate, EventKind::NoteOn);
    let err = p.handle_message(WireEvent::note_on(0, 36, 100)).unwrap_err();
    assert!(matches!(err, EngineError::UnmappedEventKind { .. }));
    assert_eq!(p.last_emitted(), None);
}

#[test]
fn test_linear_remaps_address_and_keeps_value() {
    let mut p = OutputPropagator::new(
        ResponseMode::Linear,
        ResponseMode::Linear,
        EventKind::ControlChange,
        20,
        4,
        None,
    )
    .unwrap();

    let out = p.handle_message(WireEvent::control_change(0, 7, 55)).unwrap();
    assert_eq!(out, Some(WireEvent::control_change(4, 20, 55)));
    assert_eq!(p.state(), OutputState::Value(55));
}

#[test]
fn test_linear_pitch_bend_only_remaps_channel() {
    let mut p = OutputPropagator::new(
        ResponseMode::Linear,
        ResponseMode::Linear,
        EventKind::PitchBend,
        0,
        9,
        None,
    )
    .unwrap();

    let out = p
        .handle_message(WireEvent::pitch_bend(2, 0x11, 0x40))
        .unwrap()
        .unwrap();
    assert_eq!(out.kind, WireKind::PitchBend);
    assert_eq!(out.channel, 9);
    assert_eq!(out.pitch_bend_value(), WireEvent::pitch_bend(2, 0x11, 0x40).pitch_bend_value());
}

#[test]
fn test_linear_note_pair_follows_value() {
    let mut p = output(ResponseMode::Linear, ResponseMode::Linear, EventKind::NoteOnOff);
    let on = p.handle_message(WireEvent::control_change(0, 1, 30)).unwrap();
    assert_eq!(on, Some(WireEvent::note_on(0, 36, 30)));
    let off = p.handle_message(WireEvent::control_change(0, 1, 0)).unwrap();
    assert_eq!(off, Some(WireEvent::note_off(0, 36, 0)));
}

#[test]
fn test_constant_hardware_emulates_toggle() {
    let mut p = output(ResponseMode::Constant, ResponseMode::Toggle, EventKind::ControlChange);
    assert_eq!(p.state(), OutputState::Off);

    let first = p.handle_message(WireEvent::control_change(0, 36, 127)).unwrap();
    assert_eq!(first.map(|e| e.value), Some(127));
    assert_eq!(p.state(), OutputState::On);

    let second = p.handle_message(WireEvent::control_change(0, 36, 127)).unwrap();
    assert_eq!(second.map(|e| e.value), Some(0));
    assert_eq!(p.state(), OutputState::Off);
}

#[test]
fn test_constant_to_constant_reports_off() {
    let mut p = output(ResponseMode::Constant, ResponseMode::Constant, EventKind::ControlChange);
    p.handle_message(WireEvent::control_change(0, 36, 127)).unwrap();
    assert_eq!(p.state(), OutputState::Off);
}

#[test]
fn test_reset_returns_to_unbound() {
    let mut p = output(ResponseMode::Toggle, ResponseMode::Toggle, EventKind::NoteOnOff);
    p.handle_message(WireEvent::note_on(0, 36, 127)).unwrap();
    assert!(p.last_emitted().is_some());

    p.reset();
    assert_eq!(p.last_emitted(), None);
    assert_eq!(p.state(), p.default_state());
}

#[test]
fn test_binary_feedback_flips() {
    let on = WireEvent::note_on(0, 36, 3);
    let off = WireEvent::note_on(0, 36, 5);
    let mut fb = FeedbackPropagator::Binary(
        BinaryFeedback::new(ResponseMode::Gate, ResponseMode::Toggle, Some(on), Some(off)).unwrap(),
    );

    assert_eq!(fb.state(), FeedbackState::Off);
    assert_eq!(fb.handle_message(WireEvent::note_on(0, 36, 99)).unwrap(), Some(on));
    assert_eq!(fb.state(), FeedbackState::On);

    // Release is suppressed under gate hardware with a toggle light
    assert_eq!(fb.handle_message(WireEvent::note_off(0, 36, 0)).unwrap(), None);
    assert_eq!(fb.state(), FeedbackState::On);

    assert_eq!(fb.handle_message(WireEvent::note_on(0, 36, 1)).unwrap(), Some(off));
    assert_eq!(fb.state(), FeedbackState::Off);
}

#[test]
fn test_binary_feedback_without_events() {
    let mut fb = BinaryFeedback::new(ResponseMode::Toggle, ResponseMode::Toggle, None, None).unwrap();
    assert_eq!(fb.handle_message(WireEvent::note_on(0, 36, 127)).unwrap(), None);
    assert_eq!(fb.last_emitted(), None);
    assert_eq!(fb.state(), FeedbackState::Off);
}

#[test]
fn test_step_feedback_cycles_and_wraps() {
    let steps: BTreeMap<usize, WireEvent> = [0u8, 1, 2]
        .into_iter()
        .map(|i| (i as usize, WireEvent::note_on(0, 36, 10 + i)))
        .collect();
    let mut fb = StepFeedback::new(ResponseMode::Toggle, ResponseMode::Toggle, steps).unwrap();
    assert_eq!(fb.n_steps(), 3);
    assert_eq!(fb.state(), 0);

    let press = WireEvent::note_on(0, 36, 127);
    let seen: Vec<u8> = (0..4)
        .map(|_| fb.handle_message(press).unwrap().unwrap().value)
        .collect();
    assert_eq!(seen, vec![11, 12, 10, 11]);
    assert_eq!(fb.state(), 1);
}

#[test]
fn test_step_feedback_skips_over_missing_step() {
    let mut steps = BTreeMap::new();
    steps.insert(0, WireEvent::note_on(0, 36, 10));
    steps.insert(2, WireEvent::note_on(0, 36, 12));
    let mut fb = StepFeedback::new(ResponseMode::Toggle, ResponseMode::Toggle, steps).unwrap();

    let press = WireEvent::note_on(0, 36, 127);
    let seen: Vec<Option<u8>> = (0..6)
        .map(|_| fb.handle_message(press).unwrap().map(|e| e.value))
        .collect();
    assert_eq!(seen, vec![None, Some(12), Some(10), None, Some(12), Some(10)]);
    assert_eq!(fb.state(), 0);

    // Step 1 has no colour, but the cursor still lands on it
    fb.handle_message(press).unwrap();
    assert_eq!(fb.state(), 1);
    assert_eq!(fb.last_emitted(), Some(WireEvent::note_on(0, 36, 10)));

    fb.reset();
    assert_eq!(fb.state(), 0);
    assert_eq!(fb.last_emitted(), None);
}

#[test]
fn test_step_feedback_empty() {
    let mut fb = FeedbackPropagator::Steps(
        StepFeedback::new(ResponseMode::Toggle, ResponseMode::Toggle, BTreeMap::new()).unwrap(),
    );
    assert!(fb.eligible_states().is_empty());
    assert_eq!(fb.handle_message(WireEvent::note_on(0, 36, 127)).unwrap(), None);
    assert_eq!(fb.state(), FeedbackState::Step(0));
}

#[test]
fn test_null_feedback() {
    let mut fb = FeedbackPropagator::Null;
    assert_eq!(fb.handle_message(WireEvent::note_on(0, 36, 127)).unwrap(), None);
    assert_eq!(fb.output_response(), None);
    assert!(fb.set_output_response(ResponseMode::Toggle).is_ok());
    assert_eq!(fb.state(), FeedbackState::Off);
}

#[test]
fn test_feedback_state_labels() {
    assert_eq!("on".parse::<FeedbackState>().unwrap(), FeedbackState::On);
    assert_eq!("3".parse::<FeedbackState>().unwrap(), FeedbackState::Step(3));
    assert!("lit".parse::<FeedbackState>().is_err());

    let mut map = BTreeMap::new();
    map.insert(FeedbackState::Off, "Red");
    map.insert(FeedbackState::Step(2), "Blue");
    let json = serde_json::to_string(&map).unwrap();
    assert_eq!(json, r#"{"off":"Red","2":"Blue"}"#);
}

fn arb_wire_event() -> impl Strategy<Value = WireEvent> {
    (0u8..16, 0u8..128, 0u8..128, 0usize..3).prop_map(|(ch, n, v, k)| match k {
        0 => WireEvent::note_on(ch, n, v),
        1 => WireEvent::note_off(ch, n, v),
        _ => WireEvent::control_change(ch, n, v),
    })
}

proptest! {
    #[test]
    fn prop_constant_output_ignores_incoming(a in arb_wire_event(), b in arb_wire_event(), value in 0u8..128) {
        let mut p = OutputPropagator::new(
            ResponseMode::Toggle,
            ResponseMode::Constant,
            EventKind::ControlChange,
            12,
            3,
            Some(value),
        )
        .unwrap();

        let first = p.handle_message(a).unwrap();
        let second = p.handle_message(b).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(first, Some(WireEvent::control_change(3, 12, value)));
    }

    #[test]
    fn prop_toggle_returns_after_even_presses(
        hardware in prop_oneof![Just(ResponseMode::Gate), Just(ResponseMode::Constant)],
        pairs in 1usize..6,
        velocity in 1u8..128,
    ) {
        let mut p = output(hardware, ResponseMode::Toggle, EventKind::NoteOnOff);
        let before = p.state();

        for _ in 0..pairs * 2 {
            p.handle_message(WireEvent::note_on(0, 36, velocity)).unwrap();
        }

        prop_assert_eq!(p.state(), before);
    }

    #[test]
    fn prop_release_never_propagates_under_gate_toggle(events in prop::collection::vec(arb_wire_event(), 1..20)) {
        let mut p = output(ResponseMode::Gate, ResponseMode::Toggle, EventKind::NoteOnOff);

        for event in events {
            let out = p.handle_message(event).unwrap();
            if !event.is_press(true) {
                prop_assert_eq!(out, None);
            }
        }
    }
}
