//! Fake processor and recording event sink

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use core_kernel::DomainPort;
use domain_billing::events::{DomainEvent, EventSink};
use domain_billing::ports::{
    CreateIntentRequest, CreateRefundRequest, PaymentIntent, PaymentProcessor, ProcessorError,
    Refund,
};

#[derive(Default)]
struct FakeProcessorState {
    intents: Vec<CreateIntentRequest>,
    refunds: Vec<CreateRefundRequest>,
    next_intent_error: Option<ProcessorError>,
    next_refund_error: Option<ProcessorError>,
    counter: u64,
}

/// Fake [`PaymentProcessor`] that fabricates intents and refunds
///
/// Records every request for assertions and can be primed to fail the
/// next call with a specific error.
#[derive(Default)]
pub struct FakeProcessor {
    state: Mutex<FakeProcessorState>,
}

impl FakeProcessor {
    /// Creates a fake processor that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next create_payment_intent call with the given error
    pub fn fail_next_intent(&self, error: ProcessorError) {
        self.state.lock().unwrap().next_intent_error = Some(error);
    }

    /// Fails the next create_refund call with the given error
    pub fn fail_next_refund(&self, error: ProcessorError) {
        self.state.lock().unwrap().next_refund_error = Some(error);
    }

    /// Number of intents created so far
    pub fn intent_count(&self) -> usize {
        self.state.lock().unwrap().intents.len()
    }

    /// Number of refunds created so far
    pub fn refund_count(&self) -> usize {
        self.state.lock().unwrap().refunds.len()
    }

    /// The most recent intent request, if any
    pub fn last_intent(&self) -> Option<CreateIntentRequest> {
        self.state.lock().unwrap().intents.last().cloned()
    }

    /// The most recent refund request, if any
    pub fn last_refund(&self) -> Option<CreateRefundRequest> {
        self.state.lock().unwrap().refunds.last().cloned()
    }
}

impl DomainPort for FakeProcessor {}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.next_intent_error.take() {
            return Err(error);
        }

        state.counter += 1;
        let id = format!("pi_fake_{:04}", state.counter);
        let intent = PaymentIntent {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            status: "requires_payment_method".to_string(),
            client_secret: Some(format!("{}_secret", id)),
            payment_method: None,
            created: 1_700_000_000 + state.counter as i64,
            metadata: request.metadata.clone(),
            last_payment_error: None,
        };
        state.intents.push(request);
        Ok(intent)
    }

    async fn create_refund(&self, request: CreateRefundRequest) -> Result<Refund, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.next_refund_error.take() {
            return Err(error);
        }

        state.counter += 1;
        let refund = Refund {
            id: format!("re_fake_{:04}", state.counter),
            amount: request.amount,
            currency: None,
            status: Some("succeeded".to_string()),
            payment_intent: Some(request.payment_intent.clone()),
            created: Some(1_700_000_000 + state.counter as i64),
            metadata: request.metadata.clone(),
        };
        state.refunds.push(request);
        Ok(refund)
    }
}

/// [`EventSink`] that records every emitted event for assertions
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, in order
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    /// True when at least one event matches the predicate
    pub fn any(&self, predicate: impl Fn(&DomainEvent) -> bool) -> bool {
        self.events.lock().unwrap().iter().any(predicate)
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}
