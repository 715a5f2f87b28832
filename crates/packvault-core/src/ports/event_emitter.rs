//! Transfer event emitter port.
//!
//! The engine announces item boundaries as [`TransferEvent`]s; where those
//! events go (an SSE stream, a Tauri window, nowhere) is an adapter concern
//! behind this port.

use crate::transfer::TransferEvent;

/// Port for emitting transfer events.
///
/// Implementations own the delivery mechanism. Emission must not block the
/// engine: buffer or hand off if the transport is slow.
pub trait TransferEventEmitterPort: Send + Sync {
    /// Emit a transfer event.
    fn emit(&self, event: TransferEvent);

    /// Clone this emitter into a boxed trait object.
    ///
    /// Lets holders of `Arc<dyn TransferEventEmitterPort>` duplicate the
    /// emitter without a `Clone` bound on the underlying type.
    fn clone_box(&self) -> Box<dyn TransferEventEmitterPort>;
}

/// Emitter that discards every event.
///
/// Used by tests that assert on watch snapshots rather than events, and by
/// CLI contexts that render progress directly.
#[derive(Debug, Clone, Default)]
pub struct NoopTransferEmitter;

impl NoopTransferEmitter {
    /// Create a new no-op transfer emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransferEventEmitterPort for NoopTransferEmitter {
    fn emit(&self, _event: TransferEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn TransferEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_noop_emitter() {
        let emitter = NoopTransferEmitter::new();

        // Should not panic
        emitter.emit(TransferEvent::completed(Uuid::new_v4()));
    }

    #[test]
    fn test_noop_emitter_clone_box() {
        let emitter = NoopTransferEmitter::new();
        let _boxed: Box<dyn TransferEventEmitterPort> = emitter.clone_box();
    }

    #[test]
    fn test_arc_emitter() {
        let emitter: Arc<dyn TransferEventEmitterPort> = Arc::new(NoopTransferEmitter::new());
        emitter.emit(TransferEvent::cancelled(Uuid::new_v4()));
    }
}
