//! End-to-end checks of collection and comparison on traces produced by the
//! in-process tracker.

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use vartrace_check::{collect, Comparator, RunContext, Tracker};
use vartrace_core::{
    parse_expected_values, ElementType, ProbeId, Scalar, Step, TrackingPoint, TypedValue,
};

fn int(v: i32) -> TypedValue {
    TypedValue::Scalar(Scalar::Int(v))
}

fn ints(values: &[i32]) -> TypedValue {
    TypedValue::vector(ElementType::Int, values.iter().copied().map(Scalar::Int).collect())
        .unwrap()
}

// ----------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------

#[test]
fn scalar_mismatch_yields_record_and_correction() {
    let points = vec![TrackingPoint::new(12, ProbeId(1), ["x"])];
    let expected = parse_expected_values("step probe variable value\n1 1 x 7\n").items;

    let ctx = Arc::new(RunContext::new());
    let tracker = Tracker::new(Arc::clone(&ctx), Vec::new(), &expected);
    let firing = tracker.track(ProbeId(1), &[("x", int(5))]).unwrap();
    assert_eq!(firing.corrections.get("x"), Some(&int(7)));

    let trace = collect(&String::from_utf8(tracker.into_sink()).unwrap());
    let report = Comparator::new(&points, &expected).compare(&ctx, &trace.values);
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].to_line(), "1//1//12//x//5//7");
    assert_eq!(report.correction(Step(1), ProbeId(1), "x"), Some(&int(7)));
}

#[test]
fn vector_mismatch_yields_vector_correction() {
    let points = vec![TrackingPoint::new(4, ProbeId(1), ["arr"])];
    let expected = parse_expected_values("1 1 arr 9,9,9\n").items;

    let ctx = Arc::new(RunContext::new());
    let tracker = Tracker::new(Arc::clone(&ctx), Vec::new(), &expected);
    tracker.track(ProbeId(1), &[("arr", ints(&[1, 2, 3]))]).unwrap();

    let trace = collect(&String::from_utf8(tracker.into_sink()).unwrap());
    let report = Comparator::new(&points, &expected).compare(&ctx, &trace.values);
    assert_eq!(report.mismatches[0].actual_value, "1,2,3");
    assert_eq!(
        report.correction(Step(1), ProbeId(1), "arr"),
        Some(&ints(&[9, 9, 9]))
    );
}

#[test]
fn matrix_expected_value_uses_row_separator() {
    let points = vec![TrackingPoint::new(4, ProbeId(1), ["m"])];
    let expected = parse_expected_values("1 1 m 1,2;3,5\n").items;
    let m = TypedValue::matrix(
        ElementType::Int,
        vec![
            vec![Scalar::Int(1), Scalar::Int(2)],
            vec![Scalar::Int(3), Scalar::Int(4)],
        ],
    )
    .unwrap();

    let ctx = Arc::new(RunContext::new());
    let tracker = Tracker::new(Arc::clone(&ctx), Vec::new(), &expected);
    tracker.track(ProbeId(1), &[("m", m)]).unwrap();
    let text = String::from_utf8(tracker.into_sink()).unwrap();
    assert_eq!(text.lines().count(), 2);

    let trace = collect(&text);
    let report = Comparator::new(&points, &expected).compare(&ctx, &trace.values);
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].actual_value, "1,2;3,4");
    assert_eq!(report.mismatches[0].expected_value.as_deref(), Some("1,2;3,5"));
}

// ----------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------

#[test]
fn concurrent_firings_keep_trace_steps_increasing() {
    let ctx = Arc::new(RunContext::new());
    let tracker = Arc::new(Tracker::new(Arc::clone(&ctx), Vec::new(), &[]));
    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for i in 0..100 {
                    tracker.track(ProbeId(t + 1), &[("v", int(i))]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let tracker = Arc::try_unwrap(tracker).unwrap();
    let trace = collect(&String::from_utf8(tracker.into_sink()).unwrap());
    assert_eq!(trace.values.len(), 400);
    assert!(trace.steps_increasing());
    assert_eq!(ctx.current_step(), Step(400));
}

// ----------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------

proptest! {
    #[test]
    fn comparison_is_idempotent_within_a_run(
        actual in proptest::collection::vec(-50i32..50, 1..20),
        wanted in proptest::collection::vec(-50i32..50, 1..20),
    ) {
        let points = vec![TrackingPoint::new(3, ProbeId(1), ["x"])];
        let expected_text: String = wanted
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{} 1 x {}\n", i + 1, v))
            .collect();
        let expected = parse_expected_values(&expected_text).items;

        let ctx = Arc::new(RunContext::new());
        let tracker = Tracker::new(Arc::clone(&ctx), Vec::new(), &expected);
        for v in &actual {
            tracker.track(ProbeId(1), &[("x", int(*v))]).unwrap();
        }
        let trace = collect(&String::from_utf8(tracker.into_sink()).unwrap());
        prop_assert!(trace.steps_increasing());

        let comparator = Comparator::new(&points, &expected);
        let first = comparator.compare(&ctx, &trace.values);
        let differing = actual
            .iter()
            .zip(&wanted)
            .filter(|(a, w)| a != w)
            .count();
        prop_assert_eq!(first.mismatches.len(), differing);
        prop_assert_eq!(first.corrections.len(), differing);

        let second = comparator.compare(&ctx, &trace.values);
        prop_assert!(second.mismatches.is_empty());
        prop_assert!(second.corrections.is_empty());
    }
}
