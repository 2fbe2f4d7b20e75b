//! End-to-end scenarios driven entirely through `Session`'s public surface
//! against the in-memory `FakeTree`, the way `valor`'s own
//! `tests/events_basic.rs` drives a whole page rather than one module.

use std::time::Duration;

use agent::Session;
use dom::fake::FakeTree;
use dom::{Action, LayoutState, MutationRecord};
use wire::{AgentConfig, Event, Origin, Payload};

fn wait_for_batch(session: &mut Session<FakeTree>) -> wire::CompressedBatch {
    for _ in 0..200 {
        if let Some(batch) = session.try_recv_batch() {
            return batch;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for background worker");
}

/// Forces a flush and decodes everything the background worker has
/// accumulated since the last flush.
fn drain_events(session: &mut Session<FakeTree>, time: u64) -> Vec<Event> {
    session.force_compression(time).expect("force compression");
    let batch = wait_for_batch(session);
    let payload: Payload = serde_json::from_str(&batch.raw_data).expect("decode payload");
    payload.events
}

fn layout_events(events: &[Event], action: Action) -> Vec<LayoutState> {
    events
        .iter()
        .filter(|event| event.origin == Origin::Plugin("layout".to_string()))
        .map(|event| serde_json::from_value::<LayoutState>(event.data.clone()).expect("decode layout state"))
        .filter(|state| state.action == action)
        .collect()
}

#[test]
fn appending_a_child_under_a_discovered_element_emits_one_insert() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = Session::new(AgentConfig::default(), FakeTree::new()).expect("new session");
    let div = {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        let root = tree.root();
        let body = tree.append_element(root, "body");
        tree.append_element(body, "div")
    };
    session.start().expect("start");
    while !session.tick_backfill().expect("tick") {}
    let _ = drain_events(&mut session, 1);

    let div_index = session.index_of(div).expect("div discovered");
    let span = {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        tree.append_element(div, "span")
    };
    session.on_mutation_batch(vec![MutationRecord::ChildList { target: div }]).expect("batch");

    let events = drain_events(&mut session, 2);
    let inserted = layout_events(&events, Action::Insert);
    assert_eq!(inserted.len(), 1, "expected exactly one insert event, got {inserted:?}");
    assert_eq!(inserted[0].parent, Some(div_index));
    assert_eq!(session.index_of(span), Some(inserted[0].index));

    session.shutdown(3).expect("shutdown");
}

#[test]
fn mutating_an_attribute_emits_one_update_with_the_new_value() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = Session::new(AgentConfig::default(), FakeTree::new()).expect("new session");
    let div = {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        let root = tree.root();
        let body = tree.append_element(root, "body");
        let div = tree.append_element(body, "div");
        tree.set_attribute(div, "title", "x");
        div
    };
    session.start().expect("start");
    while !session.tick_backfill().expect("tick") {}
    let _ = drain_events(&mut session, 1);

    {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        tree.set_attribute(div, "title", "y");
    }
    session.on_mutation_batch(vec![MutationRecord::Attributes { target: div }]).expect("batch");

    let events = drain_events(&mut session, 2);
    let updated = layout_events(&events, Action::Update);
    assert_eq!(updated.len(), 1, "expected exactly one update event, got {updated:?}");
    assert!(updated[0].attributes.contains(&("title".to_string(), "y".to_string())));

    session.shutdown(3).expect("shutdown");
}

#[test]
fn small_scroll_is_suppressed_and_only_the_larger_one_is_emitted() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = Session::new(AgentConfig::default(), FakeTree::new()).expect("new session");
    let div = {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        let root = tree.root();
        let body = tree.append_element(root, "body");
        let div = tree.append_element(body, "div");
        tree.set_geometry(
            div,
            dom::LayoutGeometry { x: 0.0, y: 0.0, width: 100.0, height: 100.0, scroll_x: Some(0.0), scroll_y: Some(0.0) },
        );
        div
    };
    session.start().expect("start");
    while !session.tick_backfill().expect("tick") {}
    let div_index = session.index_of(div).expect("div discovered");
    let _ = drain_events(&mut session, 1);

    session.observe_scroll(div_index, 0.0, 3.0).expect("scroll 3px");
    session.observe_scroll(div_index, 0.0, 10.0).expect("scroll 10px");

    let events = drain_events(&mut session, 2);
    let scrolled: Vec<_> = events
        .iter()
        .filter(|event| event.origin == Origin::Plugin("layout".to_string()))
        .map(|event| serde_json::from_value::<LayoutState>(event.data.clone()).expect("decode layout state"))
        .filter(|state| matches!(state.source, dom::Source::Scroll))
        .collect();

    assert_eq!(scrolled.len(), 1, "expected only the 10px scroll to emit, got {scrolled:?}");
    let dom::LayoutPayload::Element(geometry) = &scrolled[0].layout else {
        panic!("expected element geometry on a scroll event");
    };
    assert_eq!(geometry.scroll_y, Some(10.0));

    session.shutdown(3).expect("shutdown");
}

#[test]
fn two_consecutive_divergences_degrade_the_session_and_stop_applying_batches() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = Session::new(AgentConfig::default(), FakeTree::new()).expect("new session");
    let body = {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        let root = tree.root();
        tree.append_element(root, "body")
    };
    session.start().expect("start");
    while !session.tick_backfill().expect("tick") {}
    assert!(!session.is_degraded());

    // A node appears live without ever being reported through a mutation
    // batch, twice in a row: the shadow and live trees disagree both times.
    {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        tree.append_element(body, "span");
    }
    session.on_mutation_batch(Vec::new()).expect("batch");
    assert!(!session.is_degraded());

    {
        let tree = session.live();
        let mut tree = tree.borrow_mut();
        tree.append_element(body, "em");
    }
    session.on_mutation_batch(Vec::new()).expect("batch");
    assert!(session.is_degraded());

    let events = drain_events(&mut session, 2);
    let reports: Vec<_> =
        events.iter().filter(|event| event.event_type == "ShadowDomInconsistent").collect();
    assert_eq!(reports.len(), 1, "expected exactly one degraded-mode report, got {reports:?}");

    session.shutdown(3).expect("shutdown");
}
