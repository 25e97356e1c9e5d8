use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nextedit_primitives::LineSpan;
use pretty_assertions::assert_eq;

use super::*;
use crate::config::ArbiterConfig;
use crate::dispatch::{ChainStateProbe, handler_fn};
use crate::testing::{FailPoint, HostCall, MemoryHost};

const FLAG: &str = "jumpDecorationVisible";

fn document() -> DocumentId {
	DocumentId::from("file:///src/main.rs")
}

fn source() -> String {
	(0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
}

fn setup() -> (Arc<MemoryHost>, Arc<JumpCoordinator>) {
	let host = Arc::new(MemoryHost::new());
	host.open_document(document(), &source());
	host.set_viewport(Some(LineSpan::new(10, 50)));
	let jump = Arc::new(JumpCoordinator::new(host.clone(), host.clone(), FLAG, Duration::from_millis(100)));
	(host, jump)
}

fn flag(value: bool) -> HostCall {
	HostCall::SetContextFlag {
		key: FLAG.to_string(),
		value,
	}
}

#[tokio::test]
async fn identical_content_is_not_suggested() {
	let (host, jump) = setup();
	let shown = jump
		.suggest_jump(Position::new(20, 0), Position::new(120, 0), Some("line 120\nline 121"))
		.await;

	assert!(!shown);
	assert_eq!(host.calls(), vec![]);
	assert_eq!(jump.phase(), JumpPhase::Idle);
}

#[tokio::test]
async fn content_past_end_of_document_is_suggested() {
	let (_host, jump) = setup();
	let shown = jump
		.suggest_jump(Position::new(20, 0), Position::new(199, 0), Some("line 199\nline 200"))
		.await;
	assert!(shown);
}

#[tokio::test]
async fn target_below_viewport_clamps_indicator_and_reveals() {
	let (host, jump) = setup();
	let target = Position::new(120, 4);
	assert!(jump.suggest_jump(Position::new(20, 0), target, Some("changed")).await);

	assert_eq!(
		host.calls(),
		vec![
			HostCall::ShowJumpIndicator {
				document: document(),
				line: 50,
				target,
			},
			HostCall::Reveal {
				document: document(),
				range: TextRange::point(target),
				mode: RevealMode::Minimal,
			},
			HostCall::BindTransient {
				command: TransientCommand::AcceptJump
			},
			HostCall::BindTransient {
				command: TransientCommand::RejectJump
			},
			flag(true),
		]
	);
	assert_eq!(jump.phase(), JumpPhase::Suggested);
	assert!(jump.jump_in_progress());
}

#[tokio::test]
async fn target_in_view_is_not_revealed() {
	let (host, jump) = setup();
	assert!(jump.suggest_jump(Position::new(20, 0), Position::new(30, 0), None).await);
	assert!(!host.calls().iter().any(|call| matches!(call, HostCall::Reveal { .. })));
	assert!(host.calls().contains(&HostCall::ShowJumpIndicator {
		document: document(),
		line: 30,
		target: Position::new(30, 0),
	}));
}

#[tokio::test(start_paused = true)]
async fn accept_moves_cursor_and_holds_grace_window() {
	let (host, jump) = setup();
	let target = Position::new(120, 4);
	jump.suggest_jump(Position::new(20, 0), target, None).await;
	host.take_calls();

	assert!(jump.accept_jump().await);
	assert_eq!(host.cursor(), Some((document(), target)));
	let calls = host.take_calls();
	assert_eq!(calls[0], HostCall::SetCursor {
		document: document(),
		position: target,
	});
	assert_eq!(calls[1], HostCall::Reveal {
		document: document(),
		range: TextRange::point(target),
		mode: RevealMode::Center,
	});
	assert!(matches!(calls[2], HostCall::ClearIndicator { .. }));
	assert!(calls.contains(&flag(false)));
	assert_eq!(calls.last(), Some(&HostCall::TriggerInlineSuggest));
	assert!(!calls.contains(&HostCall::DeleteChain));

	assert_eq!(jump.phase(), JumpPhase::Idle);
	assert!(jump.jump_just_accepted());
	tokio::time::sleep(Duration::from_millis(99)).await;
	assert!(jump.jump_just_accepted());
	tokio::time::sleep(Duration::from_millis(2)).await;
	assert!(!jump.jump_just_accepted());

	assert!(!jump.accept_jump().await);
}

#[tokio::test]
async fn completion_after_jump_is_shown_on_accept_only() {
	let (host, jump) = setup();
	let completion = CompletionAfterJump {
		completion: "let y = 2;".to_string(),
		range: TextRange::point(Position::new(120, 0)),
	};

	jump.set_completion_after_jump(completion.clone());
	jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), None).await;
	jump.reject_jump().await;
	jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), None).await;
	jump.accept_jump().await;
	assert!(!host.calls().iter().any(|call| matches!(call, HostCall::ShowAfterJump { .. })));

	jump.set_completion_after_jump(completion.clone());
	jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), None).await;
	host.take_calls();
	jump.accept_jump().await;
	assert_eq!(host.calls().last(), Some(&HostCall::ShowAfterJump { completion }));
}

#[tokio::test]
async fn reject_clears_indicator_and_deletes_chain() {
	let (host, jump) = setup();
	jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), None).await;
	host.take_calls();

	assert!(jump.reject_jump().await);
	let calls = host.calls();
	assert!(matches!(calls[0], HostCall::ClearIndicator { .. }));
	assert!(calls.contains(&flag(false)));
	assert_eq!(calls.last(), Some(&HostCall::DeleteChain));
	assert_eq!(jump.phase(), JumpPhase::Idle);
	assert!(!jump.jump_just_accepted());
	assert!(!jump.reject_jump().await);
}

#[tokio::test]
async fn cursor_moving_elsewhere_rejects() {
	let (host, jump) = setup();
	let current = Position::new(20, 0);
	let target = Position::new(120, 0);
	jump.suggest_jump(current, target, None).await;

	assert!(!jump.observe_cursor(&document(), current).await);
	assert!(!jump.observe_cursor(&document(), target).await);
	assert!(!jump.observe_cursor(&DocumentId::from("file:///other.rs"), Position::new(3, 3)).await);
	assert_eq!(jump.phase(), JumpPhase::Suggested);

	assert!(jump.observe_cursor(&document(), Position::new(21, 0)).await);
	assert_eq!(jump.phase(), JumpPhase::Idle);
	assert_eq!(host.calls().last(), Some(&HostCall::DeleteChain));
}

#[tokio::test]
async fn new_suggestion_supersedes_without_teardown() {
	let (host, jump) = setup();
	jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), None).await;
	jump.suggest_jump(Position::new(20, 0), Position::new(150, 0), None).await;

	let calls = host.calls();
	assert_eq!(calls.iter().filter(|call| matches!(call, HostCall::ClearIndicator { .. })).count(), 1);
	assert!(!calls.contains(&HostCall::DeleteChain));
	assert!(!calls.contains(&flag(false)));
	assert_eq!(jump.current_suggestion().map(|s| s.target), Some(Position::new(150, 0)));
}

#[tokio::test]
async fn render_failure_resets_state() {
	let (host, jump) = setup();
	host.fail(FailPoint::ShowIndicator);

	assert!(!jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), None).await);
	assert_eq!(jump.phase(), JumpPhase::Idle);
	assert!(!jump.jump_in_progress());
	assert_eq!(host.calls(), vec![]);
}

#[tokio::test]
async fn read_failure_during_dedup_still_suggests() {
	let (host, jump) = setup();
	host.fail(FailPoint::ReadText);
	assert!(jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), Some("line 120")).await);
}

struct JumpProbe(Arc<JumpCoordinator>);

impl ChainStateProbe for JumpProbe {
	fn suggestion_window_accepted(&self) -> bool {
		false
	}

	fn jump_in_progress(&self) -> bool {
		self.0.jump_in_progress()
	}

	fn jump_just_accepted(&self) -> bool {
		self.0.jump_just_accepted()
	}
}

#[tokio::test(start_paused = true)]
async fn handler_claims_moves_caused_by_the_jump() {
	let (_host, jump) = setup();
	let dispatcher = EventDispatcher::spawn(&ArbiterConfig::default(), Arc::new(JumpProbe(Arc::clone(&jump))));
	jump.attach(&dispatcher);
	jump.attach(&dispatcher);

	let fallbacks = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&fallbacks);
	dispatcher.register_listener(
		"fallback",
		HandlerPriority::Fallback,
		handler_fn(move |_, _| {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(true)
			}
		}),
	);
	assert_eq!(dispatcher.listeners().len(), 2);

	jump.suggest_jump(Position::new(20, 0), Position::new(120, 0), None).await;
	dispatcher
		.handle_selection_change(SelectionChangeEvent::cursor_at(document(), Position::new(20, 0)))
		.await;
	dispatcher.idle().await;
	assert_eq!(fallbacks.load(Ordering::SeqCst), 0);

	tokio::time::sleep(Duration::from_millis(60)).await;
	jump.accept_jump().await;
	dispatcher
		.handle_selection_change(SelectionChangeEvent::cursor_at(document(), Position::new(120, 0)))
		.await;
	dispatcher.idle().await;
	assert_eq!(fallbacks.load(Ordering::SeqCst), 0);

	tokio::time::sleep(Duration::from_millis(200)).await;
	dispatcher
		.handle_selection_change(SelectionChangeEvent::cursor_at(document(), Position::new(121, 0)))
		.await;
	dispatcher.idle().await;
	assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
	dispatcher.shutdown().await;
}
