//! One in-flight request per agent, with stale-response discarding.
//!
//! Every `send` bumps the agent's generation and cancels the previous call.
//! Transport calls run as spawned tasks and report back over a channel; the
//! event loop hands each [`Completion`] to [`RequestController::accept`],
//! which drops it unless its generation is still the agent's current one.
//! Cancellation is best effort at the transport, but the generation check is
//! unconditional, so a superseded call can never reach shared state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use super::message::{MessageId, WebhookRequest};
use super::normalize::{Normalized, normalize};
use super::providers::{PolicyTransport, RequestError, WebhookTarget};

/// Identifies one request's typing indicator. Equal to the request generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypingToken(pub u64);

/// Everything needed to issue one request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub agent_id: String,
    /// The user message this request evaluates; rewrites are routed to it.
    pub user_message_id: MessageId,
    pub target: WebhookTarget,
    pub request: WebhookRequest,
}

/// Result of a transport call, tagged with the generation that issued it.
#[derive(Debug)]
pub struct Completion {
    pub agent_id: String,
    pub generation: u64,
    pub user_message_id: MessageId,
    pub endpoint: String,
    pub outcome: Result<Normalized, RequestError>,
}

/// A completion that survived the generation check.
#[derive(Debug)]
pub struct Accepted {
    pub agent_id: String,
    pub token: TypingToken,
    pub user_message_id: MessageId,
    pub endpoint: String,
    pub outcome: Result<Normalized, RequestError>,
}

/// Returned by [`RequestController::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub token: TypingToken,
    /// The request this one replaced, if it was still outstanding.
    pub superseded: Option<TypingToken>,
}

#[derive(Debug, Default)]
struct RequestSlot {
    generation: u64,
    in_flight: Option<InFlight>,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

impl RequestSlot {
    fn supersede(&mut self) -> Option<TypingToken> {
        self.generation += 1;
        self.in_flight.take().map(|previous| {
            previous.cancel.cancel();
            TypingToken(previous.generation)
        })
    }
}

pub struct RequestController {
    transport: Arc<dyn PolicyTransport>,
    timeout: Option<Duration>,
    slots: HashMap<String, RequestSlot>,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
}

impl RequestController {
    pub fn new(transport: Arc<dyn PolicyTransport>, timeout: Option<Duration>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            timeout,
            slots: HashMap::new(),
            completions_tx,
            completions_rx,
        }
    }

    /// Cancels the agent's outstanding call, if any, and issues a new one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send(&mut self, ticket: RequestTicket) -> Dispatched {
        let slot = self.slots.entry(ticket.agent_id.clone()).or_default();
        let superseded = slot.supersede();
        let generation = slot.generation;
        let cancel = CancellationToken::new();
        slot.in_flight = Some(InFlight {
            generation,
            cancel: cancel.clone(),
        });
        if let Some(previous) = superseded {
            debug!(
                "Agent {}: request {} superseded by {}",
                ticket.agent_id, previous.0, generation
            );
        }

        let transport = Arc::clone(&self.transport);
        let timeout = self.timeout;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let RequestTicket {
                agent_id,
                user_message_id,
                target,
                request,
            } = ticket;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RequestError::Cancelled),
                result = execute(transport.as_ref(), &target, &request, timeout) => result,
            };
            // The receiver lives as long as the controller; a send error only
            // means the whole session is shutting down.
            let _ = tx.send(Completion {
                agent_id,
                generation,
                user_message_id,
                endpoint: target.endpoint,
                outcome,
            });
        });

        Dispatched {
            token: TypingToken(generation),
            superseded,
        }
    }

    /// Supersedes the agent's outstanding call without issuing a new one.
    pub fn cancel(&mut self, agent_id: &str) -> Option<TypingToken> {
        self.slots.get_mut(agent_id).and_then(RequestSlot::supersede)
    }

    pub fn is_pending(&self, agent_id: &str) -> bool {
        self.slots
            .get(agent_id)
            .is_some_and(|slot| slot.in_flight.is_some())
    }

    pub fn has_pending(&self) -> bool {
        self.slots.values().any(|slot| slot.in_flight.is_some())
    }

    /// Current generation for the agent (0 before its first request).
    pub fn generation(&self, agent_id: &str) -> u64 {
        self.slots.get(agent_id).map_or(0, |slot| slot.generation)
    }

    /// Next completion without waiting.
    pub fn try_next(&mut self) -> Option<Completion> {
        self.completions_rx.try_recv().ok()
    }

    /// Waits for the next completion.
    pub async fn next(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Applies the generation check. `None` means the completion is stale and
    /// must be dropped without touching any state.
    pub fn accept(&mut self, completion: Completion) -> Option<Accepted> {
        let slot = self.slots.get_mut(&completion.agent_id)?;
        if completion.generation != slot.generation {
            debug!(
                "Agent {}: discarding stale response {} (current {})",
                completion.agent_id, completion.generation, slot.generation
            );
            return None;
        }
        if slot
            .in_flight
            .as_ref()
            .is_some_and(|flight| flight.generation == completion.generation)
        {
            slot.in_flight = None;
        }
        Some(Accepted {
            agent_id: completion.agent_id,
            token: TypingToken(completion.generation),
            user_message_id: completion.user_message_id,
            endpoint: completion.endpoint,
            outcome: completion.outcome,
        })
    }
}

async fn execute(
    transport: &dyn PolicyTransport,
    target: &WebhookTarget,
    request: &WebhookRequest,
    timeout: Option<Duration>,
) -> Result<Normalized, RequestError> {
    let call = transport.deliver(target, request);
    let body = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| RequestError::Timeout(limit))??,
        None => call.await?,
    };
    normalize(&body).map_err(|err| RequestError::Protocol(err.to_string()))
}
