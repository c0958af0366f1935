//! Outbound event stream
//!
//! The state machine publishes to a broadcast channel after its transaction
//! commits; delivery (email, websocket, webhook) lives behind whatever
//! subscribes. Publishing is fire-and-forget: a missing or slow consumer
//! never affects committed state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::models::enums::Role;

/// Who should be notified next: the pending stage's requirement, copied
/// verbatim so the notification collaborator can route without a DB read
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StageRouting {
    pub step_no: i16,
    pub role: Role,
    pub department_id: Option<i32>,
    pub section_id: Option<i32>,
}

/// Engine events, named as they appear on the wire
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum EngineEvent {
    #[serde(rename = "TICKET_CREATED")]
    TicketCreated {
        ticket_id: i32,
        requester_id: i32,
        routing: StageRouting,
    },
    #[serde(rename = "STAGE_APPROVED")]
    StageApproved {
        ticket_id: i32,
        step_no: i16,
        routing: StageRouting,
    },
    #[serde(rename = "TICKET_APPROVED")]
    TicketApproved { ticket_id: i32 },
    #[serde(rename = "TICKET_REJECTED")]
    TicketRejected {
        ticket_id: i32,
        reason: Option<String>,
    },
    #[serde(rename = "TICKET_IN_USE")]
    TicketInUse { ticket_id: i32 },
    #[serde(rename = "TICKET_OVERDUE")]
    TicketOverdue { ticket_id: i32 },
    #[serde(rename = "TICKET_COMPLETED")]
    TicketCompleted { ticket_id: i32 },
    #[serde(rename = "TICKET_DUE_SOON")]
    TicketDueSoon {
        ticket_id: i32,
        window_end: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::TicketCreated { .. } => "TICKET_CREATED",
            EngineEvent::StageApproved { .. } => "STAGE_APPROVED",
            EngineEvent::TicketApproved { .. } => "TICKET_APPROVED",
            EngineEvent::TicketRejected { .. } => "TICKET_REJECTED",
            EngineEvent::TicketInUse { .. } => "TICKET_IN_USE",
            EngineEvent::TicketOverdue { .. } => "TICKET_OVERDUE",
            EngineEvent::TicketCompleted { .. } => "TICKET_COMPLETED",
            EngineEvent::TicketDueSoon { .. } => "TICKET_DUE_SOON",
        }
    }

    pub fn ticket_id(&self) -> i32 {
        match self {
            EngineEvent::TicketCreated { ticket_id, .. }
            | EngineEvent::StageApproved { ticket_id, .. }
            | EngineEvent::TicketApproved { ticket_id }
            | EngineEvent::TicketRejected { ticket_id, .. }
            | EngineEvent::TicketInUse { ticket_id }
            | EngineEvent::TicketOverdue { ticket_id }
            | EngineEvent::TicketCompleted { ticket_id }
            | EngineEvent::TicketDueSoon { ticket_id, .. } => *ticket_id,
        }
    }

    fn routing(&self) -> Option<&StageRouting> {
        match self {
            EngineEvent::TicketCreated { routing, .. }
            | EngineEvent::StageApproved { routing, .. } => Some(routing),
            _ => None,
        }
    }
}

/// Published event with identity and emission time
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: EngineEvent,
}

#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Never fails: no subscribers simply means nobody is
    /// listening yet.
    pub fn publish(&self, event: EngineEvent) {
        if let Some(routing) = event.routing() {
            if routing.department_id.is_none() && routing.section_id.is_none() {
                tracing::warn!(
                    ticket_id = event.ticket_id(),
                    step_no = routing.step_no,
                    "stage has no department/section routing; notification targeting is best-effort"
                );
            }
        }

        let envelope = EventEnvelope {
            id: Uuid::new_v4(),
            emitted_at: Utc::now(),
            event,
        };
        tracing::debug!(
            event = envelope.event.name(),
            ticket_id = envelope.event.ticket_id(),
            "engine event emitted"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn stream(&self) -> BroadcastStream<EventEnvelope> {
        BroadcastStream::new(self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_the_wire_protocol() {
        assert_eq!(EngineEvent::TicketApproved { ticket_id: 1 }.name(), "TICKET_APPROVED");
        assert_eq!(EngineEvent::TicketInUse { ticket_id: 1 }.name(), "TICKET_IN_USE");
        assert_eq!(
            EngineEvent::TicketRejected { ticket_id: 1, reason: None }.name(),
            "TICKET_REJECTED"
        );
    }

    #[test]
    fn envelope_serializes_with_wire_event_name() {
        let publisher = EventPublisher::new(4);
        let mut rx = publisher.subscribe();
        publisher.publish(EngineEvent::TicketApproved { ticket_id: 42 });

        let envelope = rx.try_recv().expect("event should be delivered");
        let json = serde_json::to_value(&envelope).expect("serializable");
        assert_eq!(json["event"], "TICKET_APPROVED");
        assert_eq!(json["data"]["ticket_id"], 42);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let publisher = EventPublisher::new(4);
        publisher.publish(EngineEvent::TicketCompleted { ticket_id: 7 });
    }
}
