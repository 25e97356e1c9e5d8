use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nextedit_primitives::{DocumentId, Position, TextRange};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

use super::*;
use crate::host::{EditableRegion, RegionRequest, RegionStrategy};
use crate::testing::{FailPoint, HostCall, MemoryHost};

type Log = Arc<Mutex<Vec<String>>>;

fn doc() -> DocumentId {
	DocumentId::from("file:///src/lib.rs")
}

fn at(line: u32) -> SelectionChangeEvent {
	SelectionChangeEvent::cursor_at(doc(), Position::new(line, 0))
}

fn dispatcher() -> EventDispatcher {
	EventDispatcher::spawn(&ArbiterConfig::default(), Arc::new(NoChainState))
}

/// Handler that appends `name@line` to `log` and returns `claim`.
fn recorder(log: &Log, name: &'static str, claim: bool) -> Arc<dyn SelectionHandler> {
	let log = Arc::clone(log);
	handler_fn(move |event, _snapshot| {
		let log = Arc::clone(&log);
		async move {
			let line = event.cursor().map(|pos| pos.line).unwrap_or_default();
			log.lock().push(format!("{name}@{line}"));
			Ok(claim)
		}
	})
}

struct Panicking;

#[async_trait]
impl SelectionHandler for Panicking {
	async fn handle(&self, _event: &SelectionChangeEvent, _snapshot: &StateSnapshot) -> Result<bool, HandlerError> {
		panic!("handler exploded")
	}
}

#[tokio::test]
async fn reregistering_an_id_replaces_the_entry() {
	let log = Log::default();
	let dispatcher = dispatcher();
	dispatcher.register_listener("ghost", HandlerPriority::High, recorder(&log, "first", true));
	dispatcher.register_listener("ghost", HandlerPriority::Low, recorder(&log, "second", true));

	assert_eq!(dispatcher.listeners(), vec![(Arc::from("ghost"), HandlerPriority::Low)]);

	dispatcher.handle_selection_change(at(1)).await;
	dispatcher.idle().await;
	assert_eq!(*log.lock(), vec!["second@1"]);
}

#[tokio::test]
async fn handlers_run_by_descending_priority_until_claimed() {
	let log = Log::default();
	let dispatcher = dispatcher();
	dispatcher.register_listener("fallback", HandlerPriority::Fallback, recorder(&log, "fallback", true));
	dispatcher.register_listener("normal-a", HandlerPriority::Normal, recorder(&log, "normal-a", false));
	dispatcher.register_listener("critical", HandlerPriority::Critical, recorder(&log, "critical", false));
	dispatcher.register_listener("normal-b", HandlerPriority::Normal, recorder(&log, "normal-b", true));
	dispatcher.register_listener("low", HandlerPriority::Low, recorder(&log, "low", true));

	let order: Vec<_> = dispatcher.listeners().into_iter().map(|(id, _)| id.to_string()).collect();
	assert_eq!(order, vec!["critical", "normal-a", "normal-b", "low", "fallback"]);

	dispatcher.handle_selection_change(at(3)).await;
	dispatcher.idle().await;
	assert_eq!(*log.lock(), vec!["critical@3", "normal-a@3", "normal-b@3"]);
	assert_eq!(dispatcher.stats().fallbacks, 0);
}

#[tokio::test]
async fn unregister_removes_only_its_own_registration() {
	let log = Log::default();
	let dispatcher = dispatcher();
	let stale = dispatcher.register_listener("jump", HandlerPriority::High, recorder(&log, "old", true));
	let current = dispatcher.register_listener("jump", HandlerPriority::High, recorder(&log, "new", true));

	assert!(!stale.unregister());
	assert_eq!(dispatcher.listeners().len(), 1);
	assert_eq!(current.id(), "jump");
	assert!(current.unregister());
	assert!(dispatcher.listeners().is_empty());
}

#[tokio::test(start_paused = true)]
async fn burst_inside_window_processes_first_and_last() {
	let log = Log::default();
	let dispatcher = dispatcher();
	dispatcher.register_listener("rec", HandlerPriority::Normal, recorder(&log, "rec", true));

	let start = Instant::now();
	assert_eq!(dispatcher.handle_selection_change(at(0)).await, DispatchOutcome::Accepted);
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(dispatcher.handle_selection_change(at(10)).await, DispatchOutcome::Deferred);
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(dispatcher.handle_selection_change(at(20)).await, DispatchOutcome::Coalesced);

	dispatcher.idle().await;
	assert_eq!(*log.lock(), vec!["rec@0", "rec@20"]);
	assert!(Instant::now() >= start + Duration::from_millis(50));

	let stats = dispatcher.stats();
	assert_eq!(stats.passes, 2);
	assert_eq!(stats.coalesced, 1);
}

#[tokio::test(start_paused = true)]
async fn events_behind_a_running_pass_are_processed_in_order() {
	let log = Log::default();
	let config = ArbiterConfig {
		debounce_ms: 0,
		..ArbiterConfig::default()
	};
	let dispatcher = EventDispatcher::spawn(&config, Arc::new(NoChainState));
	let slow_log = Arc::clone(&log);
	dispatcher.register_listener(
		"slow",
		HandlerPriority::Normal,
		handler_fn(move |event, _| {
			let log = Arc::clone(&slow_log);
			async move {
				tokio::time::sleep(Duration::from_millis(100)).await;
				log.lock().push(format!("slow@{}", event.cursor().map(|p| p.line).unwrap_or_default()));
				Ok(true)
			}
		}),
	);

	assert_eq!(dispatcher.handle_selection_change(at(1)).await, DispatchOutcome::Accepted);
	tokio::task::yield_now().await;
	assert_eq!(dispatcher.handle_selection_change(at(2)).await, DispatchOutcome::Queued);
	assert_eq!(dispatcher.handle_selection_change(at(3)).await, DispatchOutcome::Queued);

	dispatcher.idle().await;
	assert_eq!(*log.lock(), vec!["slow@1", "slow@2", "slow@3"]);
	assert_eq!(dispatcher.stats().queued, 2);
	assert!(!dispatcher.is_processing());
}

#[tokio::test]
async fn failing_handlers_do_not_stop_the_pass() {
	let _ = tracing_subscriber::fmt::try_init();
	let log = Log::default();
	let dispatcher = dispatcher();
	dispatcher.register_listener("panics", HandlerPriority::Critical, Arc::new(Panicking));
	dispatcher.register_listener(
		"errors",
		HandlerPriority::High,
		handler_fn(|_, _| async { Err::<bool, _>(HandlerError::Collaborator("no region".into())) }),
	);
	dispatcher.register_listener("declines", HandlerPriority::Normal, recorder(&log, "declines", false));
	dispatcher.register_listener("fallback", HandlerPriority::Fallback, recorder(&log, "fallback", true));

	dispatcher.handle_selection_change(at(7)).await;
	dispatcher.idle().await;

	assert_eq!(*log.lock(), vec!["declines@7", "fallback@7"]);
	let stats = dispatcher.stats();
	assert_eq!(stats.handler_faults, 2);
	assert_eq!(stats.fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn pass_exceeding_timeout_is_abandoned() {
	let log = Log::default();
	let dispatcher = dispatcher();
	let stalled_once = Arc::new(AtomicBool::new(false));
	let flag = Arc::clone(&stalled_once);
	dispatcher.register_listener(
		"stalls",
		HandlerPriority::High,
		handler_fn(move |_, _| {
			let flag = Arc::clone(&flag);
			async move {
				if !flag.swap(true, Ordering::SeqCst) {
					tokio::time::sleep(Duration::from_secs(30)).await;
				}
				Ok(false)
			}
		}),
	);
	dispatcher.register_listener("after", HandlerPriority::Low, recorder(&log, "after", true));

	let start = Instant::now();
	dispatcher.handle_selection_change(at(1)).await;
	dispatcher.idle().await;
	let elapsed = start.elapsed();
	assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_secs(30));
	assert!(log.lock().is_empty());
	assert_eq!(dispatcher.stats().timeouts, 1);
	assert!(!dispatcher.is_processing());

	dispatcher.handle_selection_change(at(2)).await;
	dispatcher.idle().await;
	assert_eq!(*log.lock(), vec!["after@2"]);
}

#[tokio::test(start_paused = true)]
async fn typing_session_expires_after_quiet_period() {
	let dispatcher = dispatcher();
	dispatcher.register_listener("typing", HandlerPriority::Normal, Arc::new(TypingSessionHandler));
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	dispatcher.register_listener(
		"observer",
		HandlerPriority::Critical,
		handler_fn(move |_, snapshot| {
			let sink = Arc::clone(&sink);
			async move {
				sink.lock().push(snapshot.is_typing_session);
				Ok(false)
			}
		}),
	);

	dispatcher.on_document_edited();
	assert!(dispatcher.typing().is_typing());
	assert!(dispatcher.typing().last_change().is_some());
	dispatcher.handle_selection_change(at(1)).await;
	dispatcher.idle().await;

	tokio::time::sleep(Duration::from_millis(1500)).await;
	dispatcher.on_document_edited();
	tokio::time::sleep(Duration::from_millis(1500)).await;
	assert!(dispatcher.typing().is_typing());

	tokio::time::sleep(Duration::from_millis(600)).await;
	assert!(!dispatcher.typing().is_typing());
	dispatcher.handle_selection_change(at(2)).await;
	dispatcher.idle().await;

	assert_eq!(*seen.lock(), vec![true, false]);
	assert_eq!(dispatcher.stats().fallbacks, 0);
}

#[tokio::test]
async fn shutdown_drains_then_refuses() {
	let log = Log::default();
	let dispatcher = dispatcher();
	dispatcher.register_listener("rec", HandlerPriority::Normal, recorder(&log, "rec", true));

	dispatcher.handle_selection_change(at(1)).await;
	dispatcher.shutdown().await;
	assert_eq!(*log.lock(), vec!["rec@1"]);
	assert_eq!(dispatcher.handle_selection_change(at(2)).await, DispatchOutcome::Closed);
	dispatcher.idle().await;
}

fn region(line: u32) -> EditableRegion {
	EditableRegion {
		document: doc(),
		range: TextRange::new(Position::new(line, 0), Position::new(line + 5, 0)),
	}
}

fn fallback_dispatcher(host: &Arc<MemoryHost>, full_file_diff: bool) -> EventDispatcher {
	let dispatcher = dispatcher();
	let fallback = FallbackHandler::new(host.clone(), host.clone(), host.clone(), RegionStrategy::Static, full_file_diff);
	dispatcher.register_listener("fallback", HandlerPriority::Fallback, Arc::new(fallback));
	dispatcher
}

#[tokio::test]
async fn fallback_deletes_chain_and_prefetches_first_region() {
	let host = Arc::new(MemoryHost::new());
	host.set_regions(vec![region(40), region(80)]);
	let dispatcher = fallback_dispatcher(&host, false);

	let anchor = Position::new(12, 3);
	let event = SelectionChangeEvent::new(doc(), vec![nextedit_primitives::Selection::new(anchor, Position::new(14, 0))]);
	dispatcher.handle_selection_change(event).await;
	dispatcher.idle().await;

	assert_eq!(
		host.calls(),
		vec![
			HostCall::DeleteChain,
			HostCall::NextEditableRegion {
				strategy: RegionStrategy::Static,
				request: RegionRequest {
					document: doc(),
					cursor: anchor,
				},
			},
			HostCall::EnqueueUnprocessed { region: region(40) },
		]
	);
	assert_eq!(dispatcher.stats().fallbacks, 1);
}

#[tokio::test]
async fn fallback_skips_prefetch_for_full_file_diff() {
	let host = Arc::new(MemoryHost::new());
	host.set_regions(vec![region(40)]);
	let dispatcher = fallback_dispatcher(&host, true);

	dispatcher.handle_selection_change(at(3)).await;
	dispatcher.idle().await;
	assert_eq!(host.calls(), vec![HostCall::DeleteChain]);
}

#[tokio::test]
async fn fallback_with_no_regions_only_deletes() {
	let host = Arc::new(MemoryHost::new());
	let dispatcher = fallback_dispatcher(&host, false);

	dispatcher.handle_selection_change(at(3)).await;
	dispatcher.idle().await;
	let calls = host.calls();
	assert_eq!(calls.len(), 2);
	assert_eq!(calls[0], HostCall::DeleteChain);
	assert_eq!(dispatcher.stats().fallbacks, 1);
}

#[tokio::test]
async fn fallback_failure_is_a_handler_fault() {
	let host = Arc::new(MemoryHost::new());
	host.fail(FailPoint::DeleteChain);
	let dispatcher = fallback_dispatcher(&host, false);

	dispatcher.handle_selection_change(at(3)).await;
	dispatcher.idle().await;
	assert_eq!(host.calls(), vec![HostCall::DeleteChain]);
	let stats = dispatcher.stats();
	assert_eq!(stats.handler_faults, 1);
	assert_eq!(stats.fallbacks, 0);
}
