use std::sync::Arc;

use crate::{Data, Interest, NetworkNack};

pub type OnData = Arc<dyn Fn(&Interest, &Data) + Send + Sync>;
pub type OnTimeout = Arc<dyn Fn(&Interest) + Send + Sync>;
pub type OnNack = Arc<dyn Fn(&Interest, &NetworkNack) + Send + Sync>;

/// The three outcomes of an expressed interest.
#[derive(Clone)]
pub struct ResponseHandler {
	pub on_data: OnData,
	pub on_timeout: OnTimeout,
	pub on_nack: OnNack,
}

impl ResponseHandler {
	pub fn data(&self, interest: &Interest, data: &Data) {
		(self.on_data)(interest, data)
	}

	pub fn timeout(&self, interest: &Interest) {
		(self.on_timeout)(interest)
	}

	pub fn nack(&self, interest: &Interest, nack: &NetworkNack) {
		(self.on_nack)(interest, nack)
	}
}

impl std::fmt::Debug for ResponseHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResponseHandler").finish_non_exhaustive()
	}
}

/// The network session interests are sent through.
///
/// Implementations deliver exactly one outcome per interest, and never from within
/// [Face::express_interest] itself.
pub trait Face: Send + Sync + 'static {
	fn express_interest(&self, interest: Interest, handler: ResponseHandler);
}
