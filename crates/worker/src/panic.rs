use tokio::task::JoinError;

/// Extracts the panic payload message from a failed join, if it panicked.
///
/// Returns `None` for cancellation and for payloads that are neither `&str`
/// nor `String`.
pub fn join_error_panic_message(err: JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload = err.into_panic();
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return Some((*msg).to_string());
	}
	payload.downcast_ref::<String>().cloned()
}
