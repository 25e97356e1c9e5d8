use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{SelectionChangeEvent, StateSnapshot};
use crate::error::HandlerError;

/// Dispatch order of a handler. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandlerPriority {
	Fallback = 1,
	Low = 2,
	Normal = 3,
	High = 4,
	Critical = 5,
}

impl HandlerPriority {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fallback => "fallback",
			Self::Low => "low",
			Self::Normal => "normal",
			Self::High => "high",
			Self::Critical => "critical",
		}
	}
}

/// A vote on whether a selection change keeps the edit chain alive.
///
/// Returning `Ok(true)` claims the event and stops the pass. Errors are
/// logged and the pass moves on to the next handler.
#[async_trait]
pub trait SelectionHandler: Send + Sync + 'static {
	async fn handle(&self, event: &SelectionChangeEvent, snapshot: &StateSnapshot) -> Result<bool, HandlerError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> SelectionHandler for FnHandler<F>
where
	F: Fn(SelectionChangeEvent, StateSnapshot) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
{
	async fn handle(&self, event: &SelectionChangeEvent, snapshot: &StateSnapshot) -> Result<bool, HandlerError> {
		(self.0)(event.clone(), snapshot.clone()).await
	}
}

/// Wraps an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn SelectionHandler>
where
	F: Fn(SelectionChangeEvent, StateSnapshot) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
{
	Arc::new(FnHandler(f))
}

#[derive(Clone)]
pub(crate) struct Registration {
	pub(crate) id: Arc<str>,
	pub(crate) priority: HandlerPriority,
	pub(crate) handler: Arc<dyn SelectionHandler>,
	token: u64,
}

/// Handlers ordered by descending priority, ties in registration order.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
	entries: Vec<Registration>,
	next_token: u64,
}

impl HandlerRegistry {
	/// Inserts a handler, replacing any entry with the same id.
	///
	/// Returns the registration token and whether an entry was replaced.
	pub(crate) fn register(&mut self, id: Arc<str>, priority: HandlerPriority, handler: Arc<dyn SelectionHandler>) -> (u64, bool) {
		let before = self.entries.len();
		self.entries.retain(|entry| entry.id != id);
		let replaced = self.entries.len() != before;

		self.next_token += 1;
		let token = self.next_token;
		self.entries.push(Registration {
			id,
			priority,
			handler,
			token,
		});
		self.entries
			.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.token.cmp(&b.token)));
		(token, replaced)
	}

	/// Removes the entry registered under `token`. A replaced entry is left alone.
	pub(crate) fn unregister(&mut self, id: &str, token: u64) -> bool {
		let before = self.entries.len();
		self.entries.retain(|entry| !(entry.token == token && &*entry.id == id));
		self.entries.len() != before
	}

	pub(crate) fn ordered(&self) -> Vec<Registration> {
		self.entries.clone()
	}

	pub(crate) fn ids(&self) -> Vec<(Arc<str>, HandlerPriority)> {
		self.entries.iter().map(|entry| (Arc::clone(&entry.id), entry.priority)).collect()
	}
}

/// Capability to remove one registration.
///
/// Dropping the handle keeps the handler registered.
pub struct ListenerHandle {
	id: Arc<str>,
	token: u64,
	registry: Weak<RwLock<HandlerRegistry>>,
}

impl ListenerHandle {
	pub(crate) fn new(id: Arc<str>, token: u64, registry: Weak<RwLock<HandlerRegistry>>) -> Self {
		Self { id, token, registry }
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Removes the registration. Returns false if it was already replaced or removed.
	pub fn unregister(self) -> bool {
		let Some(registry) = self.registry.upgrade() else {
			return false;
		};
		let removed = registry.write().unregister(&self.id, self.token);
		if removed {
			tracing::debug!(handler = %self.id, "dispatch.unregister");
		}
		removed
	}
}

impl fmt::Debug for ListenerHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ListenerHandle")
			.field("id", &self.id)
			.field("token", &self.token)
			.finish()
	}
}
