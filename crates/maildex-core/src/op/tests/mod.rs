
use crate::{
    backend::memory::MemoryIndex,
    hit::SortKey,
    index::PrepareContext,
    obs::{NoopSink, test_sink::RecordingSink},
    op::{OpKind, QueryOperation},
    predicate::Predicate,
    target::{QueryTarget, QueryTargetSet},
    test_support::{TestHit, hits},
};

fn target(id: &str) -> QueryTarget {
    QueryTarget::new(id)
}

fn pred(text: &str) -> Predicate {
    Predicate::term("subject", text)
}

fn leaf(t: &str, text: &str) -> QueryOperation<TestHit> {
    QueryOperation::leaf(target(t), pred(text))
}

fn prepare(
    op: &mut QueryOperation<TestHit>,
    index: &MemoryIndex<TestHit>,
    sort: SortKey,
) -> Result<(), crate::error::QueryError> {
    op.prepare(&PrepareContext::new(index, sort, 10, &NoopSink))
}

fn drain(op: &mut QueryOperation<TestHit>) -> Vec<u64> {
    let mut out = Vec::new();
    while let Some(hit) = op.get_next().expect("iteration should succeed") {
        out.push(hit.value);
    }
    out
}

//
// iteration
//

#[test]
fn union_merges_children_in_sort_order_preserving_duplicates() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 3, 5]));
    index.insert(target("t2"), &pred("b"), hits(&[2, 3, 6]));

    let mut op = QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(drain(&mut op), vec![1, 2, 3, 3, 5, 6]);
    assert!(!op.has_next());
}

#[test]
fn union_merges_under_a_descending_sort_key() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[5, 3, 1]));
    index.insert(target("t2"), &pred("b"), hits(&[6, 3, 2]));

    let mut op = QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateDesc).expect("prepare should succeed");

    assert_eq!(drain(&mut op), vec![6, 5, 3, 3, 2, 1]);
}

#[test]
fn intersection_emits_only_hits_all_children_agree_on() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 3, 5]));
    index.insert(target("t2"), &pred("b"), hits(&[2, 3, 6]));

    let mut op = QueryOperation::intersection(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(drain(&mut op), vec![3]);
}

#[test]
fn intersection_with_an_empty_child_is_empty() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 2, 3]));

    let mut op = QueryOperation::intersection(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert!(!op.has_next());
    assert_eq!(drain(&mut op), Vec::<u64>::new());
}

#[test]
fn three_way_intersection_joins_across_all_children() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 4, 7, 9]));
    index.insert(target("t2"), &pred("b"), hits(&[2, 4, 9]));
    index.insert(target("t3"), &pred("c"), hits(&[4, 8, 9]));

    let mut op = QueryOperation::intersection(vec![
        leaf("t1", "a"),
        leaf("t2", "b"),
        leaf("t3", "c"),
    ]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(drain(&mut op), vec![4, 9]);
}

#[test]
fn peek_does_not_consume_the_lookahead_hit() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 2]));

    let mut op = leaf("t1", "a");
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(op.peek_next(), Some(&TestHit::at(1)));
    assert_eq!(op.peek_next(), Some(&TestHit::at(1)));
    assert_eq!(
        op.get_next().expect("iteration should succeed"),
        Some(TestHit::at(1))
    );
    assert_eq!(op.peek_next(), Some(&TestHit::at(2)));
}

#[test]
fn exhausted_tree_keeps_returning_none() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1]));

    let mut op = QueryOperation::union(vec![leaf("t1", "a")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(drain(&mut op), vec![1]);
    assert_eq!(op.get_next().expect("iteration should succeed"), None);
    assert_eq!(op.get_next().expect("iteration should succeed"), None);
}

#[test]
fn sentinels_iterate_as_empty() {
    let mut none: QueryOperation<TestHit> = QueryOperation::no_result();
    let mut all: QueryOperation<TestHit> = QueryOperation::all_result();

    assert!(!none.has_next());
    assert!(!all.has_next());
    assert_eq!(none.get_next().expect("iteration should succeed"), None);
    assert_eq!(all.get_next().expect("iteration should succeed"), None);
}

//
// reset
//

#[test]
fn reset_before_iteration_is_a_no_op() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 2]));
    index.insert(target("t2"), &pred("b"), hits(&[3]));

    let mut op = QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    op.reset_iterator().expect("reset should succeed");
    assert_eq!(drain(&mut op), vec![1, 2, 3]);
}

#[test]
fn reset_after_partial_consumption_replays_the_full_sequence() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 3, 5]));
    index.insert(target("t2"), &pred("b"), hits(&[2, 3, 6]));

    let mut op = QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    let _ = op.get_next().expect("iteration should succeed");
    let _ = op.get_next().expect("iteration should succeed");
    op.reset_iterator().expect("reset should succeed");

    assert_eq!(drain(&mut op), vec![1, 2, 3, 3, 5, 6]);
}

#[test]
fn reset_after_exhaustion_replays_an_intersection() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 3]));
    index.insert(target("t2"), &pred("b"), hits(&[3, 4]));

    let mut op = QueryOperation::intersection(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(drain(&mut op), vec![3]);
    op.reset_iterator().expect("reset should succeed");
    assert_eq!(drain(&mut op), vec![3]);
}

//
// optimizer
//

#[test]
fn nested_unions_flatten_preserving_child_order() {
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]),
        QueryOperation::union(vec![leaf("t3", "c"), leaf("t4", "d")]),
    ]);

    let optimized = tree.optimize();
    let QueryOperation::Union(union) = &optimized else {
        panic!("expected a union after optimization");
    };
    assert_eq!(union.children().len(), 4);
    assert_eq!(
        optimized.to_string(),
        "(t1:subject:a OR t2:subject:b OR t3:subject:c OR t4:subject:d)"
    );
}

#[test]
fn nested_intersections_flatten() {
    let tree: QueryOperation<TestHit> = QueryOperation::intersection(vec![
        QueryOperation::intersection(vec![leaf("t1", "a"), leaf("t2", "b")]),
        leaf("t3", "c"),
    ]);

    let optimized = tree.optimize();
    let QueryOperation::Intersection(intersection) = &optimized else {
        panic!("expected an intersection after optimization");
    };
    assert_eq!(intersection.children().len(), 3);
}

#[test]
fn a_union_inside_an_intersection_is_not_flattened() {
    let tree: QueryOperation<TestHit> = QueryOperation::intersection(vec![
        QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]),
        leaf("t3", "c"),
    ]);

    let optimized = tree.optimize();
    let QueryOperation::Intersection(intersection) = &optimized else {
        panic!("expected an intersection after optimization");
    };
    assert_eq!(intersection.children().len(), 2);
    assert_eq!(intersection.children()[0].kind(), OpKind::Union);
}

#[test]
fn singleton_combinators_collapse_to_their_child() {
    let union: QueryOperation<TestHit> = QueryOperation::union(vec![leaf("t1", "a")]);
    assert_eq!(union.optimize().kind(), OpKind::Leaf);

    let intersection: QueryOperation<TestHit> =
        QueryOperation::intersection(vec![leaf("t1", "a")]);
    assert_eq!(intersection.optimize().kind(), OpKind::Leaf);
}

#[test]
fn empty_combinators_optimize_to_no_result() {
    let union: QueryOperation<TestHit> = QueryOperation::union(Vec::new());
    assert!(union.optimize().has_no_results());

    let intersection: QueryOperation<TestHit> = QueryOperation::intersection(Vec::new());
    assert!(intersection.optimize().has_no_results());
}

#[test]
fn same_target_leaves_fuse_under_union() {
    let tree: QueryOperation<TestHit> =
        QueryOperation::union(vec![leaf("t1", "a"), leaf("t1", "b")]);

    let optimized = tree.optimize();
    assert_eq!(optimized.kind(), OpKind::Leaf);
    assert_eq!(optimized.to_string(), "t1:(subject:a OR subject:b)");
}

#[test]
fn same_target_leaves_fuse_under_intersection() {
    let tree: QueryOperation<TestHit> =
        QueryOperation::intersection(vec![leaf("t1", "a"), leaf("t1", "b")]);

    let optimized = tree.optimize();
    assert_eq!(optimized.kind(), OpKind::Leaf);
    assert_eq!(optimized.to_string(), "t1:(subject:a AND subject:b)");
}

#[test]
fn leaves_on_different_targets_do_not_fuse() {
    let tree: QueryOperation<TestHit> =
        QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);

    let optimized = tree.optimize();
    let QueryOperation::Union(union) = &optimized else {
        panic!("expected a union after optimization");
    };
    assert_eq!(union.children().len(), 2);
}

#[test]
fn leaves_with_differing_spam_trash_flags_do_not_fuse() {
    let fenced = leaf("t1", "a").ensure_spam_trash_setting(true, true);
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![fenced, leaf("t1", "b")]);

    let optimized = tree.optimize();
    assert_eq!(optimized.kind(), OpKind::Union);
}

#[test]
fn fusion_runs_to_a_fixed_point_across_flattened_levels() {
    // three same-target leaves arriving from two nesting levels collapse
    // into a single leaf
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        QueryOperation::union(vec![leaf("t1", "a"), leaf("t1", "b")]),
        leaf("t1", "c"),
    ]);

    let optimized = tree.optimize();
    assert_eq!(optimized.kind(), OpKind::Leaf);
    assert_eq!(
        optimized.to_string(),
        "t1:(subject:a OR subject:b OR subject:c)"
    );
}

#[test]
fn no_result_is_the_union_identity() {
    let tree: QueryOperation<TestHit> =
        QueryOperation::union(vec![QueryOperation::no_result(), leaf("t1", "a")]);
    assert_eq!(tree.optimize().kind(), OpKind::Leaf);
}

#[test]
fn all_result_absorbs_a_union() {
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        leaf("t1", "a"),
        QueryOperation::all_result(),
        leaf("t2", "b"),
    ]);
    assert!(tree.optimize().has_all_results());
}

#[test]
fn all_result_is_the_intersection_identity() {
    let tree: QueryOperation<TestHit> =
        QueryOperation::intersection(vec![QueryOperation::all_result(), leaf("t1", "a")]);
    assert_eq!(tree.optimize().kind(), OpKind::Leaf);
}

#[test]
fn no_result_annihilates_an_intersection() {
    let tree: QueryOperation<TestHit> = QueryOperation::intersection(vec![
        leaf("t1", "a"),
        QueryOperation::no_result(),
        leaf("t2", "b"),
    ]);
    assert!(tree.optimize().has_no_results());
}

#[test]
fn a_union_of_only_no_results_collapses_to_no_result() {
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        QueryOperation::no_result(),
        QueryOperation::no_result(),
    ]);
    assert!(tree.optimize().has_no_results());
}

#[test]
fn sentinel_laws_apply_through_nesting() {
    // the inner intersection annihilates to NoResult, which is then the
    // identity of the outer union
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        QueryOperation::intersection(vec![leaf("t1", "a"), QueryOperation::no_result()]),
        leaf("t2", "b"),
    ]);

    let optimized = tree.optimize();
    assert_eq!(optimized.kind(), OpKind::Leaf);
    assert_eq!(optimized.to_string(), "t2:subject:b");
}

//
// targets and pruning
//

#[test]
fn query_targets_union_across_the_tree() {
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        leaf("t1", "a"),
        QueryOperation::intersection(vec![leaf("t2", "b"), leaf("t3", "c")]),
    ]);

    let expected: QueryTargetSet = [target("t1"), target("t2"), target("t3")]
        .into_iter()
        .collect();
    assert_eq!(tree.get_query_targets(), expected);
}

#[test]
fn pruning_removes_leaves_outside_the_allowed_set() {
    let mut tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        leaf("t1", "a"),
        leaf("t2", "b"),
        QueryOperation::intersection(vec![leaf("t1", "c"), leaf("t3", "d")]),
    ]);
    let allowed = QueryTargetSet::singleton(target("t1"));

    let removed = tree.prune_incompatible_targets(&allowed, &NoopSink);

    assert_eq!(removed, 2);
    assert_eq!(tree.get_query_targets(), allowed);
    let QueryOperation::Union(union) = &tree else {
        panic!("expected the union to survive pruning");
    };
    assert_eq!(union.children().len(), 2);
}

#[test]
fn a_fully_pruned_combinator_becomes_no_result() {
    let mut tree: QueryOperation<TestHit> =
        QueryOperation::union(vec![leaf("t2", "a"), leaf("t3", "b")]);

    let removed =
        tree.prune_incompatible_targets(&QueryTargetSet::singleton(target("t1")), &NoopSink);

    assert_eq!(removed, 2);
    assert!(tree.has_no_results());
}

#[test]
fn a_top_level_incompatible_leaf_becomes_no_result() {
    let mut tree: QueryOperation<TestHit> = leaf("t2", "a");

    let removed =
        tree.prune_incompatible_targets(&QueryTargetSet::singleton(target("t1")), &NoopSink);

    assert_eq!(removed, 1);
    assert!(tree.has_no_results());
}

#[test]
fn pruning_a_compatible_tree_removes_nothing() {
    let mut tree: QueryOperation<TestHit> =
        QueryOperation::union(vec![leaf("t1", "a"), leaf("t1", "b")]);
    let allowed = QueryTargetSet::singleton(target("t1"));

    assert_eq!(tree.prune_incompatible_targets(&allowed, &NoopSink), 0);
    let QueryOperation::Union(union) = &tree else {
        panic!("expected the union to survive pruning");
    };
    assert_eq!(union.children().len(), 2);
}

#[test]
fn pruning_reports_the_removed_count_to_the_sink() {
    let mut tree: QueryOperation<TestHit> =
        QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b"), leaf("t3", "c")]);
    let allowed = QueryTargetSet::singleton(target("t1"));
    let sink = RecordingSink::default();

    tree.prune_incompatible_targets(&allowed, &sink);
    assert_eq!(sink.lines(), vec!["TargetsPruned { removed: 2 }".to_string()]);

    // nothing left to prune, nothing recorded
    tree.prune_incompatible_targets(&allowed, &sink);
    assert_eq!(sink.lines().len(), 1);
}

//
// spam/trash fixup
//

#[test]
fn spam_trash_flag_is_conjunctive_over_children() {
    let fenced = leaf("t1", "a").ensure_spam_trash_setting(false, false);
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![fenced, leaf("t2", "b")]);

    assert!(!tree.has_spam_trash_setting());

    let tree = tree.ensure_spam_trash_setting(false, false);
    assert!(tree.has_spam_trash_setting());
}

#[test]
fn spam_trash_fixup_fences_both_folders_by_default() {
    let tree: QueryOperation<TestHit> = leaf("t1", "a");
    let tree = tree.ensure_spam_trash_setting(false, false);

    assert_eq!(
        tree.to_string(),
        "t1:(subject:a AND -in:junk AND -in:trash)"
    );
}

#[test]
fn spam_trash_fixup_respects_opt_ins() {
    let junk_ok: QueryOperation<TestHit> =
        leaf("t1", "a").ensure_spam_trash_setting(true, false);
    assert_eq!(junk_ok.to_string(), "t1:(subject:a AND -in:trash)");

    let both_ok: QueryOperation<TestHit> =
        leaf("t1", "a").ensure_spam_trash_setting(true, true);
    assert_eq!(both_ok.to_string(), "t1:subject:a");
    assert!(both_ok.has_spam_trash_setting());
}

#[test]
fn spam_trash_fixup_is_idempotent() {
    let tree: QueryOperation<TestHit> = leaf("t1", "a")
        .ensure_spam_trash_setting(false, false)
        .ensure_spam_trash_setting(false, false);

    assert_eq!(
        tree.to_string(),
        "t1:(subject:a AND -in:junk AND -in:trash)"
    );
}

#[test]
fn spam_trash_fixup_preserves_child_order_and_count() {
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        leaf("t1", "a"),
        leaf("t2", "b").ensure_spam_trash_setting(false, false),
        leaf("t3", "c"),
    ]);

    let tree = tree.ensure_spam_trash_setting(false, false);
    let QueryOperation::Union(union) = &tree else {
        panic!("expected the union to survive the fixup");
    };
    assert_eq!(union.children().len(), 3);
    assert_eq!(
        tree.to_string(),
        "(t1:(subject:a AND -in:junk AND -in:trash) \
         OR t2:(subject:b AND -in:junk AND -in:trash) \
         OR t3:(subject:c AND -in:junk AND -in:trash))"
    );
}

//
// prepare and chunk hints
//

#[test]
fn combinators_widen_the_chunk_hint_by_one_per_level() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1]));
    index.insert(target("t2"), &pred("b"), hits(&[2]));
    index.insert(target("t3"), &pred("c"), hits(&[3]));

    let mut op = QueryOperation::union(vec![
        leaf("t1", "a"),
        QueryOperation::intersection(vec![leaf("t2", "b"), leaf("t3", "c")]),
    ]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    // direct leaf sees 10+1; leaves under the nested intersection see 10+2
    assert_eq!(index.chunk_hints(), vec![11, 12, 12]);
}

#[test]
fn a_leaf_passes_the_chunk_hint_through_unchanged() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1]));

    let mut op = leaf("t1", "a");
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(index.chunk_hints(), vec![10]);
}

#[test]
fn prepare_records_one_event_per_node() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1]));
    index.insert(target("t2"), &pred("b"), hits(&[2]));

    let sink = RecordingSink::default();
    let mut op = QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);
    op.prepare(&PrepareContext::new(&index, SortKey::DateAsc, 10, &sink))
        .expect("prepare should succeed");

    let lines = sink.lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[2].contains("Union"));
}

//
// failures and cleanup
//

#[test]
fn a_failing_open_propagates_out_of_prepare() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1]));
    index.fail_open(target("t2"), &pred("b"));

    let mut op = QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);
    let err = prepare(&mut op, &index, SortKey::DateAsc).expect_err("prepare should fail");

    assert!(err.is_backend());
}

#[test]
fn a_mid_iteration_fetch_failure_propagates() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1, 2, 3]));
    index.fail_fetch_at(target("t1"), &pred("a"), 2);

    let mut op = leaf("t1", "a");
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    assert_eq!(
        op.get_next().expect("first pull should succeed"),
        Some(TestHit::at(1))
    );
    let err = op.get_next().expect_err("second pull should fail");
    assert!(err.is_backend());
}

#[test]
fn cleanup_is_best_effort_and_reported_to_the_sink() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1]));
    index.insert(target("t2"), &pred("b"), hits(&[2]));
    index.fail_close(target("t1"), &pred("a"));

    let sink = RecordingSink::default();
    let mut op = QueryOperation::union(vec![leaf("t1", "a"), leaf("t2", "b")]);
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    op.done_with_search_results(&sink);

    let lines = sink.lines();
    let failures = lines
        .iter()
        .filter(|line| line.contains("CleanupFailed"))
        .count();
    assert_eq!(failures, 1);
    // release failures are classified, not passed through raw
    assert!(lines.iter().any(|line| line.contains("operation:cleanup:")));
}

#[test]
fn cleanup_is_idempotent() {
    let mut index = MemoryIndex::new();
    index.insert(target("t1"), &pred("a"), hits(&[1]));
    index.fail_close(target("t1"), &pred("a"));

    let sink = RecordingSink::default();
    let mut op = leaf("t1", "a");
    prepare(&mut op, &index, SortKey::DateAsc).expect("prepare should succeed");

    op.done_with_search_results(&sink);
    op.done_with_search_results(&sink);

    assert_eq!(sink.lines().len(), 1);
}

#[test]
fn cleanup_before_prepare_is_safe() {
    let sink = RecordingSink::default();
    let mut op = leaf("t1", "a");
    op.done_with_search_results(&sink);

    assert!(sink.lines().is_empty());
}

//
// display
//

#[test]
fn display_renders_the_tree_as_query_text() {
    let tree: QueryOperation<TestHit> = QueryOperation::union(vec![
        leaf("t1", "a"),
        QueryOperation::intersection(vec![leaf("t2", "b"), QueryOperation::no_result()]),
    ]);

    assert_eq!(
        tree.to_string(),
        "(t1:subject:a OR (t2:subject:b AND NO_RESULTS))"
    );
}
