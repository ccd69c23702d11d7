//! Receiver contract driven by the fetch engine.

use crate::error::ReceiverError;
use crate::types::Position;

/// Consumer-supplied sink for one fetch.
///
/// For every inspected event the engine calls [`event`](Self::event) (only
/// when the event passed the type filter) followed by
/// [`checkpoint`](Self::checkpoint). Any error aborts the fetch and is returned
/// to the caller unchanged.
pub trait EventReceiver {
    /// One event's serialized wire envelope.
    fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError>;

    /// Everything up to and including `position` has been inspected.
    fn checkpoint(&mut self, position: Position) -> Result<(), ReceiverError>;
}

impl<R: EventReceiver + ?Sized> EventReceiver for &mut R {
    fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError> {
        (**self).event(payload)
    }

    fn checkpoint(&mut self, position: Position) -> Result<(), ReceiverError> {
        (**self).checkpoint(position)
    }
}

/// Receiver built from a pair of closures.
pub struct FnReceiver<E, C> {
    on_event: E,
    on_checkpoint: C,
}

impl<E, C> FnReceiver<E, C>
where
    E: FnMut(&[u8]) -> Result<(), ReceiverError>,
    C: FnMut(Position) -> Result<(), ReceiverError>,
{
    pub fn new(on_event: E, on_checkpoint: C) -> Self {
        Self {
            on_event,
            on_checkpoint,
        }
    }
}

impl<E, C> EventReceiver for FnReceiver<E, C>
where
    E: FnMut(&[u8]) -> Result<(), ReceiverError>,
    C: FnMut(Position) -> Result<(), ReceiverError>,
{
    fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError> {
        (self.on_event)(payload)
    }

    fn checkpoint(&mut self, position: Position) -> Result<(), ReceiverError> {
        (self.on_checkpoint)(position)
    }
}
