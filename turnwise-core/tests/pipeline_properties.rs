// End-to-end properties of the processing pipeline, through the public API

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use turnwise_core::{
    inline_process, process, quick_process, CanonicalMessage, NoopSink, Pipeline, Preset, ProcessOptions, RawEntry,
    Role, ToolCallStatus,
};

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_800_000_000_000).unwrap()
}

fn run(entries: &[RawEntry], options: ProcessOptions) -> Vec<CanonicalMessage> {
    Pipeline::new(options).with_sink(&NoopSink).with_clock(now()).run(entries)
}

fn tool_call(id: &str, status: &str) -> Value {
    json!({"id": id, "name": "lookup", "arguments": {"q": id}, "status": status})
}

/// A messy batch mixing both tool-call shapes, missing ids and timestamps,
/// an unknown role, and results arriving out of order
fn messy_batch() -> Vec<RawEntry> {
    let mut broken_time = RawEntry::new("user", Some("when?")).with_id("u2");
    broken_time.timestamp = Some(json!("half past never"));

    vec![
        RawEntry::new("system", Some("You are helpful.")).with_created_at("2025-11-09 14:00:00"),
        RawEntry::new("user", Some("Find two things.")).with_id("u1").with_timestamp_ms(1_762_696_810_000),
        RawEntry::new("assistant", Some("Searching."))
            .with_id("a1")
            .with_created_at("2025-11-09T14:00:20Z")
            .with_tool_calls(vec![
                tool_call("t1", "pending"),
                json!({"id": "t2", "type": "function", "function": {"name": "fetch", "arguments": "{}"}}),
            ]),
        RawEntry::new("tool", Some("not-json")).with_tool_call_id("t2").with_created_at("2025-11-09T14:00:22Z"),
        RawEntry::new("tool", Some(r#"{"ok":true}"#)).with_tool_call_id("t1").with_created_at("2025-11-09T14:00:21Z"),
        RawEntry::new("assistant", Some("Both found."))
            .with_id("a2")
            .with_created_at("2025-11-09T14:00:25Z"),
        RawEntry::new("assistant", Some("Anything else?"))
            .with_id("a3")
            .with_created_at("2025-11-09T14:00:26Z"),
        RawEntry::new("critic", Some("meh")),
        broken_time,
        RawEntry::new("user", Some("Thanks")).with_id("u1"),
    ]
}

fn all_option_sets() -> Vec<ProcessOptions> {
    let mut sets = Vec::new();
    for bits in 0..16u8 {
        sets.push(ProcessOptions {
            filter_tool_messages: bits & 1 != 0,
            merge_assistant_messages: bits & 2 != 0,
            enhance_tool_calls: bits & 4 != 0,
            preserve_order: bits & 8 != 0,
        });
    }
    sets
}

fn reprocess(messages: &[CanonicalMessage]) -> Vec<RawEntry> {
    messages.iter().map(RawEntry::from).collect()
}

#[test]
fn test_output_never_longer_than_input() {
    let batch = messy_batch();
    for options in all_option_sets() {
        let output = run(&batch, options);
        assert!(output.len() <= batch.len(), "{options:?}");
    }
}

#[test]
fn test_ids_unique_for_every_option_set() {
    let batch = messy_batch();
    for options in all_option_sets() {
        let output = run(&batch, options);
        let ids: HashSet<_> = output.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), output.len(), "{options:?}");
    }
}

#[test]
fn test_tool_calls_only_on_assistant_messages() {
    let mut batch = messy_batch();
    batch.push(RawEntry::new("user", Some("sneaky")).with_tool_calls(vec![tool_call("t9", "running")]));

    for options in all_option_sets() {
        for message in run(&batch, options) {
            if message.role != Role::Assistant {
                assert!(message.tool_calls.is_empty(), "{options:?}");
            }
        }
    }
}

#[test]
fn test_reprocessing_without_merge_is_identity() {
    let batch = messy_batch();
    for options in all_option_sets().into_iter().filter(|o| !o.merge_assistant_messages) {
        let once = run(&batch, options);
        let twice = run(&reprocess(&once), options);
        assert_eq!(once, twice, "{options:?}");
    }
}

#[test]
fn test_reprocessing_keeps_null_tool_result() {
    let batch = vec![
        RawEntry::new("assistant", None)
            .with_id("a1")
            .with_timestamp_ms(1_000)
            .with_tool_calls(vec![tool_call("t1", "pending")]),
        RawEntry::new("tool", Some("null")).with_tool_call_id("t1").with_timestamp_ms(2_000),
    ];

    for options in all_option_sets().into_iter().filter(|o| !o.merge_assistant_messages) {
        let once = run(&batch, options);
        if options.enhance_tool_calls {
            assert_eq!(once[0].tool_calls[0].result, Some(Value::Null), "{options:?}");
        }
        let twice = run(&reprocess(&once), options);
        assert_eq!(once, twice, "{options:?}");
    }
}

#[test]
fn test_reprocessing_merged_output_is_noop() {
    let once = run(&messy_batch(), ProcessOptions::DEEP);
    let twice = run(&reprocess(&once), ProcessOptions::DEEP);
    assert_eq!(once, twice);
}

#[test]
fn test_merge_locality() {
    let batch = vec![
        RawEntry::new("assistant", None)
            .with_id("a1")
            .with_timestamp_ms(1_000)
            .with_tool_calls(vec![tool_call("x", "success")]),
        RawEntry::new("assistant", Some("a")).with_id("a2").with_timestamp_ms(2_000),
        RawEntry::new("assistant", Some("b")).with_id("a3").with_timestamp_ms(3_000),
    ];

    let output = run(&batch, ProcessOptions::DEEP);
    assert_eq!(output.len(), 2);
    assert_eq!(output[0].content, "a");
    assert_eq!(output[0].original_id, "a1");
    assert_eq!(output[0].merged_from, vec!["a1", "a2"]);
    assert_eq!(output[1].content, "b");
    assert_eq!(output[1].id, "a3");
}

#[test]
fn test_reconciliation_forces_success() {
    let batch = vec![
        RawEntry::new("assistant", None)
            .with_id("a1")
            .with_tool_calls(vec![tool_call("t1", "pending")]),
        RawEntry::new("tool", Some(r#"{"ok":true}"#)).with_tool_call_id("t1"),
    ];

    let output = run(&batch, ProcessOptions::DEEP);
    let call = &output[0].tool_calls[0];
    assert_eq!(call.status, ToolCallStatus::Success);
    assert_eq!(call.result, Some(json!({"ok": true})));
}

#[test]
fn test_malformed_tool_result_kept_as_string() {
    let batch = vec![
        RawEntry::new("assistant", None)
            .with_id("a1")
            .with_tool_calls(vec![tool_call("t1", "error")]),
        RawEntry::new("tool", Some("not-json")).with_tool_call_id("t1"),
    ];

    let output = run(&batch, ProcessOptions::DEEP);
    let call = &output[0].tool_calls[0];
    assert_eq!(call.result, Some(Value::String("not-json".to_string())));
    assert_eq!(call.status, ToolCallStatus::Success);
}

#[test]
fn test_estimated_timing_is_marked() {
    let output = run(&messy_batch(), ProcessOptions::DEEP);
    let calls: Vec<_> = output.iter().flat_map(|m| m.tool_calls.iter()).collect();

    assert_eq!(calls.len(), 2);
    for call in calls {
        assert!(call.estimated);
        assert_eq!(call.execution_time, Some(2_000));
        assert_eq!(call.end_time, Some(now()));
    }

    // Without reconciliation there is no timing to speak of
    let quick = run(&messy_batch(), ProcessOptions::QUICK);
    assert!(quick
        .iter()
        .flat_map(|m| m.tool_calls.iter())
        .all(|c| !c.estimated && c.execution_time.is_none()));
}

#[test]
fn test_ordering_is_stable_and_ascending() {
    let batch = vec![
        RawEntry::new("user", Some("third")).with_timestamp_ms(3_000),
        RawEntry::new("user", Some("first-a")).with_timestamp_ms(1_000),
        RawEntry::new("assistant", Some("second")).with_created_at("1970-01-01T00:00:02Z"),
        RawEntry::new("user", Some("first-b")).with_timestamp_ms(1_000),
    ];

    let output = run(&batch, ProcessOptions::QUICK);
    let contents: Vec<_> = output.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first-a", "first-b", "second", "third"]);
    assert!(output.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_quick_matches_explicit_options() {
    let batch: Vec<RawEntry> = messy_batch()
        .into_iter()
        .enumerate()
        .map(|(i, entry)| entry.with_timestamp_ms(1_000 * (10 - i as i64)))
        .collect();

    let explicit = ProcessOptions {
        filter_tool_messages: true,
        merge_assistant_messages: false,
        enhance_tool_calls: false,
        preserve_order: true,
    };

    assert_eq!(quick_process(&batch), process(&batch, &explicit));
    assert_eq!(inline_process(&batch), quick_process(&batch));
}

#[test]
fn test_presets_are_distinct_where_documented() {
    let batch = messy_batch();
    let quick = run(&batch, Preset::Quick.options());
    let inline = run(&batch, Preset::Inline.options());
    let deep = run(&batch, Preset::Deep.options());

    assert_eq!(quick, inline);
    assert_ne!(quick, deep);
    // deep folds a2 into a1 and attaches both results
    assert_eq!(deep.len(), quick.len() - 1);
}

#[test]
fn test_unknown_role_and_bad_timestamp_do_not_abort() {
    let output = run(&messy_batch(), ProcessOptions::QUICK);

    assert!(output.iter().all(|m| m.content != "meh"));
    let fallback = output.iter().find(|m| m.id == "u2").unwrap();
    assert_eq!(fallback.timestamp, now());
    // The repeated explicit id was reassigned rather than duplicated
    assert!(output.iter().any(|m| m.id == "u1~2"));
}

#[test]
fn test_concurrent_runs_are_independent() {
    let batch = messy_batch();
    let expected = run(&batch, ProcessOptions::DEEP);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| run(&batch, ProcessOptions::DEEP)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
