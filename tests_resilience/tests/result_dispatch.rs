//! Result Dispatch Tests
//!
//! Validates routing of platform results through the retained holder:
//! ordering, unknown codes, duplicates and the persisted blob format.

use continuation_codec::{Blob, FORMAT_VERSION};
use core_types::RequestCode;
use lifecycle::CancellationReason;
use parcelable_continuation::ParcelRecord;
use retained_holder::{ActivityResultPayload, RetainingHolder};
use scope_wrapper::ActivityScope;
use std::cell::Cell;
use std::rc::Rc;
use tests_resilience::{activity_request, take_journal, test_bootstrap};
use ui_api::{ActivityResult, Dispatch, FragmentCallbacks, Intent, SavedState, UiError};

/// Test: Results are dispatched in delivery order, not request order
///
/// This validates that:
/// 1. Consecutive requests get consecutive codes starting at 0xF00
/// 2. Each result resumes exactly the continuation registered for its code
/// 3. The holder removes itself once nothing is pending
#[test]
fn test_results_dispatch_by_code() {
    let (mut ui, activity, handlers) = test_bootstrap();
    let scope = ActivityScope::new(&mut ui, activity, handlers.clone()).expect("Failed to create scope");
    let first = scope
        .start_activity_for_result(&mut ui, Intent::new("a"), activity_request("first"))
        .expect("Failed to start first");
    let second = scope
        .start_activity_for_result(&mut ui, Intent::new("b"), activity_request("second"))
        .expect("Failed to start second");
    ui.run_until_idle();
    assert_eq!(first, RequestCode::new(0xF00));
    assert_eq!(second, RequestCode::new(0xF01));

    ui.deliver_activity_result(second, ActivityResult::canceled())
        .expect("Delivery failed");
    assert_eq!(take_journal(), vec!["second: cancelled".to_string()]);
    assert!(RetainingHolder::<ActivityResultPayload>::find(&ui, activity, handlers.config()).is_some());

    ui.deliver_activity_result(first, ActivityResult::ok(Some(Intent::new("picked"))))
        .expect("Delivery failed");
    assert_eq!(take_journal(), vec!["first: ok picked".to_string()]);
    assert!(RetainingHolder::<ActivityResultPayload>::find(&ui, activity, handlers.config()).is_none());
    assert!(ui.fragments_of(activity).is_empty());
}

/// Test: A code the holder never issued falls through to default handling
#[test]
fn test_unknown_code_is_unhandled() {
    let (mut ui, activity, handlers) = test_bootstrap();
    let scope = ActivityScope::new(&mut ui, activity, handlers.clone()).expect("Failed to create scope");
    let code = scope
        .start_activity_for_result(&mut ui, Intent::new("pick"), activity_request("kept"))
        .expect("Failed to start activity");
    ui.run_until_idle();

    let holder = RetainingHolder::<ActivityResultPayload>::find(&ui, activity, handlers.config())
        .expect("Holder missing");
    let fragment = holder.fragment().expect("Holder detached");

    let dispatch = ui
        .deliver_activity_result_to(fragment, RequestCode::new(0xABC), ActivityResult::ok(None))
        .expect("Delivery failed");
    assert_eq!(dispatch, Dispatch::Unhandled);
    assert_eq!(ui.unhandled_results().len(), 1);
    assert_eq!(ui.unhandled_results()[0].fragment, Some(fragment));
    assert_eq!(holder.pending_codes(), vec![code]);
    assert!(take_journal().is_empty());
}

/// Test: A second result for an already resolved code is rejected
///
/// This validates that:
/// 1. The first delivery resumes the continuation
/// 2. A repeated delivery fails instead of resuming anything again
/// 3. Other pending continuations are untouched
#[test]
fn test_duplicate_delivery_rejected() {
    let (mut ui, activity, handlers) = test_bootstrap();
    let scope = ActivityScope::new(&mut ui, activity, handlers.clone()).expect("Failed to create scope");
    let once = scope
        .start_activity_for_result(&mut ui, Intent::new("a"), activity_request("once"))
        .expect("Failed to start first");
    let other = scope
        .start_activity_for_result(&mut ui, Intent::new("b"), activity_request("other"))
        .expect("Failed to start second");
    ui.run_until_idle();

    let holder = RetainingHolder::<ActivityResultPayload>::find(&ui, activity, handlers.config())
        .expect("Holder missing");
    let fragment = holder.fragment().expect("Holder detached");

    ui.deliver_activity_result(once, ActivityResult::ok(None))
        .expect("Delivery failed");
    let err = ui
        .deliver_activity_result_to(fragment, once, ActivityResult::ok(None))
        .expect_err("Duplicate delivery should fail");
    assert!(matches!(err, UiError::CallbackFailed(_)));

    assert_eq!(take_journal(), vec!["once: ok".to_string()]);
    assert_eq!(holder.pending_codes(), vec![other]);
}

/// Test: Finishing the activity cancels what is still pending
#[test]
fn test_finish_cancels_pending() {
    let (mut ui, activity, handlers) = test_bootstrap();
    let scope = ActivityScope::new(&mut ui, activity, handlers).expect("Failed to create scope");
    scope
        .start_activity_for_result(&mut ui, Intent::new("pick"), activity_request("x"))
        .expect("Failed to start activity");
    ui.run_until_idle();

    ui.finish_activity(activity).expect("Finish failed");
    assert_eq!(take_journal(), vec!["x: cancelled".to_string()]);
    assert!(ui.outstanding_requests().is_empty());
}

/// Test: Finishing the activity stops the scope's jobs
///
/// This validates that:
/// 1. The scope's root job is cancelled as host destroyed
/// 2. A job launched but not yet run never starts
/// 3. Recreating the activity first does not count as destruction
#[test]
fn test_finish_cancels_scope_jobs() {
    let (mut ui, activity, handlers) = test_bootstrap();
    let mut scope = ActivityScope::new(&mut ui, activity, handlers).expect("Failed to create scope");
    let recreated = ui.recreate_activity(activity).expect("Recreation failed");
    assert!(!scope.job().is_cancelled());
    scope.rebind(&mut ui, recreated).expect("Rebind failed");

    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let job = scope.launch(&mut ui, move |cx| {
        cx.run_on_ui_thread(move |_host, _binding| flag.set(true));
    });

    ui.finish_activity(recreated).expect("Finish failed");
    ui.run_until_idle();
    assert_eq!(job.cancellation_reason(), Some(CancellationReason::HostDestroyed));
    assert!(!ran.get());
}

/// Test: Layout of the state a holder persists
///
/// This validates that:
/// 1. The holder slot holds a list of request-code/payload records
/// 2. Each payload is a versioned blob naming the handler to rebuild
#[test]
fn test_saved_blob_format() {
    let (mut ui, activity, handlers) = test_bootstrap();
    let scope = ActivityScope::new(&mut ui, activity, handlers.clone()).expect("Failed to create scope");
    let code = scope
        .start_activity_for_result(&mut ui, Intent::new("pick"), activity_request("saved"))
        .expect("Failed to start activity");
    ui.run_until_idle();

    let holder = RetainingHolder::<ActivityResultPayload>::find(&ui, activity, handlers.config())
        .expect("Holder missing");
    let mut saved = SavedState::new();
    holder
        .on_save_instance_state(&ui, &mut saved)
        .expect("Save failed");

    let slot = saved
        .get(&handlers.config().state_slot)
        .expect("Holder slot missing");
    let records: Vec<ParcelRecord> = serde_json::from_slice(slot).expect("Slot is not a record list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_code, code);

    let blob: Blob = serde_json::from_slice(&records[0].payload).expect("Payload is not a blob");
    assert_eq!(blob.version, FORMAT_VERSION);
    assert_eq!(blob.handler, "journal_activity");
}
