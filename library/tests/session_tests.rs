//! Integration tests for evaluation, result caching and push handling.

use std::time::{Duration, Instant};

use serde_json::json;

use blockgraph::authority::RecordingAuthority;
use blockgraph::model::{BlockId, EvalOutput, EvalResult, LinkId, PortRef, Position, RunId};
use blockgraph::protocol::{
    BlockRecord, LinkRecord, PushEvent, RawResult, Request, Sequenced, Snapshot, VariableRecord,
};
use blockgraph::tensor::Tensor;
use blockgraph::{ConnectionStatus, FetchStatus, Session, SessionConfig};

/// Helper: a connected session over a small graph.
///
/// `a` (code, out y) feeds `b` (code, in x); `viz` is a visual block.
fn session_with(config: SessionConfig) -> Session<RecordingAuthority> {
    let mut session = Session::new(RecordingAuthority::new(), config);
    session.on_connect();
    session.on_snapshot(&Snapshot {
        blocks: vec![
            BlockRecord::code("a", "y = [1, 2, 3]", &[], &["y"]),
            BlockRecord::code("b", "z = x", &["x"], &["z"]),
            BlockRecord::new("viz", blockgraph::protocol::BlockKindTag::Visual),
        ],
        links: vec![LinkRecord::new("l1", ("a", "y"), ("b", "x"))],
        vars: vec![VariableRecord {
            name: "x_train".to_string(),
            type_name: "ndarray".to_string(),
            value: json!(null),
        }],
    });
    session.client_mut().clear();
    session
}

fn session() -> Session<RecordingAuthority> {
    session_with(SessionConfig::default())
}

fn results(run: &str, blocks: serde_json::Value) -> PushEvent {
    PushEvent::from_wire("eval_results", json!({ "id": run, "blocks": blocks })).unwrap()
}

#[test]
fn test_connect_requests_snapshot() {
    let mut session = Session::new(RecordingAuthority::new(), SessionConfig::default());
    assert_eq!(session.status(), ConnectionStatus::Connecting);
    session.on_connect();
    assert_eq!(session.client().requests(), [Request::Data]);
    assert_eq!(session.status(), ConnectionStatus::Connected);
}

#[test]
fn test_cached_result_needs_no_request() {
    let mut session = session();
    let (run, b1) = (RunId::from("r1"), BlockId::from("a"));

    assert_eq!(session.fetch_result(&run, &b1), FetchStatus::Requested);
    let resolved = session
        .handle_result(&run, &b1, RawResult::json(json!([1, 2, 3])))
        .unwrap();
    assert_eq!(resolved.output, Some(EvalOutput::Value(json!([1, 2, 3]))));
    assert_eq!(session.client().count("eval_get"), 1);

    let second = session.fetch_result(&run, &b1);
    assert_eq!(
        second,
        FetchStatus::Cached(EvalResult::ok(EvalOutput::Value(json!([1, 2, 3]))))
    );
    assert_eq!(session.client().count("eval_get"), 1);
}

#[test]
fn test_concurrent_fetches_share_one_request() {
    let mut session = session();
    let (run, id) = (RunId::from("r1"), BlockId::from("a"));

    assert_eq!(session.fetch_result(&run, &id), FetchStatus::Requested);
    assert_eq!(session.fetch_result(&run, &id), FetchStatus::Pending);
    assert_eq!(session.client().count("eval_get"), 1);

    session.handle_result(&run, &id, RawResult::error("boom"));
    assert!(matches!(
        session.fetch_result(&run, &id),
        FetchStatus::Cached(r) if r.is_error()
    ));
}

#[test]
fn test_snapshot_reload_clears_cache() {
    let mut session = session();
    let run = RunId::from("r1");
    for id in ["a", "b"] {
        let id = BlockId::from(id);
        session.fetch_result(&run, &id);
        session.handle_result(&run, &id, RawResult::json(json!(1)));
    }
    assert_eq!(session.cache().len(), 2);

    session.on_snapshot(&Snapshot {
        blocks: vec![BlockRecord::code("a", "y = 1", &[], &["y"])],
        ..Snapshot::default()
    });
    session.client_mut().clear();

    assert_eq!(
        session.fetch_result(&run, &BlockId::from("a")),
        FetchStatus::Requested
    );
    assert_eq!(
        session.fetch_result(&run, &BlockId::from("b")),
        FetchStatus::Requested
    );
    assert_eq!(session.client().count("eval_get"), 2);
}

#[test]
fn test_evaluate_then_results_fetch_running_block() {
    let mut session = session();
    let a = BlockId::from("a");
    session.evaluate(&a).unwrap();
    assert!(session.store().block(&a).unwrap().eval.running);
    assert_eq!(session.client().last(), Some(&Request::BlockEval { id: a.clone() }));

    session
        .handle_event(Sequenced::unsequenced(results(
            "r1",
            json!({"a": {"outputs": {"y": "(3,)"}}, "b": {"outputs": {"z": "(3,)"}}}),
        )))
        .unwrap();

    // only the running block is fetched eagerly
    assert_eq!(
        session.client().requests().last(),
        Some(&Request::EvalGet {
            run: RunId::from("r1"),
            block: a.clone()
        })
    );
    assert_eq!(session.client().count("eval_get"), 1);

    let link = session.store().link(&LinkId::confirmed("l1")).unwrap();
    assert_eq!(link.labels(), ["(3,)".to_string()]);

    let tensor = Tensor::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
    session.handle_result(&RunId::from("r1"), &a, RawResult::binary(tensor.encode()));
    let block = session.store().block(&a).unwrap();
    assert!(!block.eval.running);
    assert_eq!(block.eval.out, Some(EvalOutput::Tensor(tensor)));
}

#[test]
fn test_error_results_fetched_eagerly() {
    let mut session = session();
    session
        .handle_event(Sequenced::unsequenced(results(
            "r1",
            json!({"b": {"error": true}, "a": false}),
        )))
        .unwrap();
    assert_eq!(
        session.client().requests(),
        [Request::EvalGet {
            run: RunId::from("r1"),
            block: BlockId::from("b")
        }]
    );
    session.handle_result(
        &RunId::from("r1"),
        &BlockId::from("b"),
        RawResult::error("NameError: x"),
    );
    let shown = session.visible_result(&BlockId::from("b")).unwrap();
    assert_eq!(shown.error.as_deref(), Some("NameError: x"));
}

#[test]
fn test_play_mode_fetches_visual_blocks() {
    let mut session = session();
    session
        .handle_event(Sequenced::unsequenced(results("r1", json!({"viz": true}))))
        .unwrap();
    assert_eq!(session.client().count("eval_get"), 0);

    session.set_playing(true);
    session
        .handle_event(Sequenced::unsequenced(results("r2", json!({"viz": true}))))
        .unwrap();
    assert_eq!(session.client().count("eval_get"), 1);
}

#[test]
fn test_lazy_fetch_on_display() {
    let mut session = session();
    let b = BlockId::from("b");
    session
        .handle_event(Sequenced::unsequenced(results("r1", json!({"b": {}}))))
        .unwrap();
    assert_eq!(session.client().count("eval_get"), 0);

    assert_eq!(session.display_block(&b), Some(FetchStatus::Requested));
    session.handle_result(&RunId::from("r1"), &b, RawResult::json(json!("ok")));
    assert_eq!(session.display_block(&b), None);
}

#[test]
fn test_rerun_does_not_show_previous_result() {
    let mut session = session();
    let a = BlockId::from("a");
    let r1 = RunId::from("r1");
    session
        .handle_event(Sequenced::unsequenced(results("r1", json!({"a": {}}))))
        .unwrap();
    session.fetch_result(&r1, &a);
    session.handle_result(&r1, &a, RawResult::json(json!("old")));
    assert!(session.store().block(&a).unwrap().eval.has_result());

    session.evaluate(&a).unwrap();
    session.client_mut().clear();

    assert_eq!(session.display_block(&a), None);
    assert_eq!(
        session.fetch_result(&r1, &a),
        FetchStatus::Cached(EvalResult::ok(EvalOutput::Value(json!("old"))))
    );
    let block = session.store().block(&a).unwrap();
    assert!(block.eval.running);
    assert!(!block.eval.has_result());
    assert_eq!(session.client().count("eval_get"), 0);
}

#[test]
fn test_stale_result_is_cached_not_applied() {
    let mut session = session();
    let a = BlockId::from("a");
    session
        .handle_event(Sequenced::unsequenced(results("r1", json!({"a": {}}))))
        .unwrap();
    session.fetch_result(&RunId::from("r1"), &a);
    session
        .handle_event(Sequenced::unsequenced(results("r2", json!({"a": {}}))))
        .unwrap();

    session.handle_result(&RunId::from("r1"), &a, RawResult::json(json!("old")));
    let block = session.store().block(&a).unwrap();
    assert_eq!(block.eval.eval_id, Some(RunId::from("r2")));
    assert!(!block.eval.has_result());
    assert!(session.cache().contains(&RunId::from("r1"), &a));
}

#[test]
fn test_unsolicited_result_is_ignored() {
    let mut session = session();
    let applied = session.handle_result(
        &RunId::from("r9"),
        &BlockId::from("a"),
        RawResult::json(json!(1)),
    );
    assert!(applied.is_none());
    assert!(session.cache().is_empty());
}

#[test]
fn test_evaluate_all_marks_executable_blocks() {
    let mut session = session();
    session
        .handle_wire("block_create", json!({"id": "v", "type": "var", "var": "x_train"}))
        .unwrap();
    session.evaluate_all();
    assert_eq!(session.client().requests(), [Request::BlockEvalAll]);
    let store = session.store();
    assert!(store.block(&BlockId::from("a")).unwrap().eval.running);
    assert!(store.block(&BlockId::from("viz")).unwrap().eval.running);
    assert!(!store.block(&BlockId::from("v")).unwrap().eval.running);
}

#[test]
fn test_results_hidden_while_reconnecting() {
    let mut session = session();
    let a = BlockId::from("a");
    let run = RunId::from("r1");
    session.fetch_result(&run, &a);
    session.handle_result(&run, &a, RawResult::json(json!(5)));
    assert!(session.visible_result(&a).is_some());

    session.on_disconnect();
    assert_eq!(session.status(), ConnectionStatus::Reconnecting);
    assert!(session.visible_result(&a).is_none());

    session.on_connect();
    assert_eq!(session.client().last(), Some(&Request::Data));
}

#[test]
fn test_sequence_gap_triggers_resync() {
    let mut session = session();
    session
        .handle_wire("block_move", json!({"id": "a", "x": 1.0, "y": 1.0, "seq": 1}))
        .unwrap();
    // duplicate delivery
    session
        .handle_wire("block_move", json!({"id": "a", "x": 9.0, "y": 9.0, "seq": 1}))
        .unwrap();
    assert_eq!(
        session.store().block(&BlockId::from("a")).unwrap().position(),
        Position::new(1.0, 1.0)
    );
    assert!(session.client().requests().is_empty());

    session
        .handle_wire("block_move", json!({"id": "a", "x": 5.0, "y": 5.0, "seq": 4}))
        .unwrap();
    assert_eq!(session.client().requests(), [Request::Data]);
}

#[test]
fn test_sequence_gap_tolerated_when_not_strict() {
    let mut session = session_with(SessionConfig {
        strict_sequencing: false,
        ..SessionConfig::default()
    });
    session
        .handle_wire("block_move", json!({"id": "a", "x": 1.0, "y": 1.0, "seq": 1}))
        .unwrap();
    session
        .handle_wire("block_move", json!({"id": "a", "x": 5.0, "y": 5.0, "seq": 3}))
        .unwrap();
    assert!(session.client().requests().is_empty());
    assert_eq!(
        session.store().block(&BlockId::from("a")).unwrap().position(),
        Position::new(5.0, 5.0)
    );
}

#[test]
fn test_drag_is_debounced_per_block() {
    let mut session = session();
    let start = Instant::now();
    let (a, b) = (BlockId::from("a"), BlockId::from("b"));

    session.move_block(&a, Position::new(10.0, 0.0), start).unwrap();
    session
        .move_block(&b, Position::new(0.0, 10.0), start + Duration::from_millis(60))
        .unwrap();
    assert_eq!(session.tick(start + Duration::from_millis(100)), 1);
    assert_eq!(
        session.client().last(),
        Some(&Request::BlockMove {
            id: a,
            x: 10.0,
            y: 0.0
        })
    );
    assert_eq!(session.tick(start + Duration::from_millis(160)), 1);
    assert_eq!(session.client().count("block_move"), 2);
}

#[test]
fn test_delete_waits_for_echo() {
    let mut session = session();
    let a = BlockId::from("a");
    assert!(session.delete_block(&a, &mut |_: &str| true).unwrap());
    assert!(session.store().block(&a).is_some());

    session
        .handle_event(Sequenced::unsequenced(
            PushEvent::from_wire("block_delete", json!({"id": "a"})).unwrap(),
        ))
        .unwrap();
    assert!(session.store().block(&a).is_none());
    assert!(session.store().links_at(&PortRef::new("b", "x")).is_empty());
}

#[test]
fn test_link_removed_before_echo_is_deleted_on_echo() {
    let mut session = session();
    session.remove_link(&LinkId::confirmed("l1")).unwrap();
    let link = session
        .connect(PortRef::new("a", "y"), PortRef::new("b", "x"))
        .unwrap();
    session.remove_link(&link).unwrap();
    session.client_mut().clear();

    session
        .handle_wire(
            "link_create",
            json!({"id": "l2", "fromId": "a", "fromPort": "y", "toId": "b", "toPort": "x"}),
        )
        .unwrap();
    assert_eq!(
        session.client().requests(),
        [Request::LinkDelete {
            id: "l2".to_string()
        }]
    );
    assert_eq!(session.store().link_count(), 0);
}

#[test]
fn test_variable_block_requires_known_variable() {
    let mut session = session();
    assert!(session.add_variable_block("y_test").is_err());
    session.add_variable_block("x_train").unwrap();
    assert_eq!(session.client().count("block_create"), 1);
}

#[test]
fn test_training_progress_from_pushes() {
    let mut session = session();
    session.start_training();
    assert_eq!(session.client().requests(), [Request::TrainStart]);
    session.handle_wire("train_begin", json!(null)).unwrap();
    session
        .handle_wire("epoch_begin", json!({"epoch": 2, "epochs": 5}))
        .unwrap();
    session.handle_wire("set_params", json!({"lr": 0.1})).unwrap();
    let progress = session.training();
    assert!(progress.running);
    assert_eq!(progress.epoch, Some(2));
    assert_eq!(progress.params, Some(json!({"lr": 0.1})));

    session.handle_wire("train_end", json!(null)).unwrap();
    assert!(!session.training().running);
}
