// Observation queue - Lock-free fan-out of dispatched events for display
// Best effort: a full ring or a busy producer drops the event

use crate::event::ObservedEvent;
use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapRb, traits::Split};
use std::sync::{Arc, Mutex};

pub type ObservationProducer = ringbuf::HeapProd<ObservedEvent>;
pub type ObservationConsumer = ringbuf::HeapCons<ObservedEvent>;

pub fn create_observation_channel(capacity: usize) -> (ObservationProducer, ObservationConsumer) {
    let rb = HeapRb::<ObservedEvent>::new(capacity);
    rb.split()
}

/// Producer side shared by every dispatch task
#[derive(Clone)]
pub(crate) struct ObservationSink {
    tx: Arc<Mutex<ObservationProducer>>,
}

impl ObservationSink {
    pub(crate) fn new(tx: ObservationProducer) -> Self {
        Self {
            tx: Arc::new(Mutex::new(tx)),
        }
    }

    /// Offer an event without blocking; false when it was dropped
    pub(crate) fn offer(&self, observed: ObservedEvent) -> bool {
        match self.tx.try_lock() {
            Ok(mut tx) => tx.try_push(observed).is_ok(),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().try_push(observed).is_ok()
            }
            Err(std::sync::TryLockError::WouldBlock) => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn occupied(&self) -> usize {
        use ringbuf::traits::Observer;
        crate::lock_or_recover(&self.tx).occupied_len()
    }
}

/// Pop everything currently queued
pub fn drain_observations(rx: &mut ObservationConsumer) -> Vec<ObservedEvent> {
    let mut observed = Vec::new();
    while let Some(event) = rx.try_pop() {
        observed.push(event);
    }
    observed
}
