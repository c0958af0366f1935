//! Ticket lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        audit::TicketAuditEntry,
        ticket::{ActOnStage, CompleteTicket, CreateTicket, Ticket, TicketDetails},
    },
};

use super::AuthenticatedActor;

/// Pickup confirmation result
#[derive(Serialize, ToSchema)]
pub struct PickupResponse {
    /// "in_use" when this call performed the transition, "already_in_use"
    /// when someone (or the scheduler) beat it to it
    pub status: String,
}

/// Create a borrow-return ticket
#[utoipa::path(
    post,
    path = "/tickets",
    tag = "tickets",
    security(("bearer_auth" = [])),
    request_body = CreateTicket,
    responses(
        (status = 201, description = "Ticket created", body = TicketDetails),
        (status = 400, description = "Invalid window or unit selection"),
        (status = 409, description = "A requested unit is unavailable for the window"),
        (status = 422, description = "Device approval flow is misconfigured")
    )
)]
pub async fn create_ticket(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(request): Json<CreateTicket>,
) -> AppResult<(StatusCode, Json<TicketDetails>)> {
    let ticket = state.services.tickets.create_ticket(&actor, &request).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Get a ticket with its stages and requested units
#[utoipa::path(
    get,
    path = "/tickets/{id}",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Ticket details", body = TicketDetails),
        (status = 404, description = "Ticket not found")
    )
)]
pub async fn get_ticket(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Path(ticket_id): Path<i32>,
) -> AppResult<Json<TicketDetails>> {
    let ticket = state.services.tickets.get_ticket(ticket_id).await?;
    Ok(Json(ticket))
}

/// List the caller's own tickets
#[utoipa::path(
    get,
    path = "/tickets",
    tag = "tickets",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's tickets", body = Vec<Ticket>)
    )
)]
pub async fn list_my_tickets(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> AppResult<Json<Vec<Ticket>>> {
    let requester_id = actor.user_id()?;
    let tickets = state.services.tickets.list_for_requester(requester_id).await?;
    Ok(Json(tickets))
}

/// Pending tickets awaiting a decision from the caller
#[utoipa::path(
    get,
    path = "/tickets/inbox",
    tag = "tickets",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Tickets whose current stage the caller can decide", body = Vec<Ticket>)
    )
)]
pub async fn approver_inbox(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> AppResult<Json<Vec<Ticket>>> {
    let tickets = state.services.tickets.approver_inbox(&actor).await?;
    Ok(Json(tickets))
}

/// Approve or reject one approval stage
#[utoipa::path(
    post,
    path = "/tickets/{id}/stages/{step}",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Ticket ID"),
        ("step" = i16, Path, description = "Stage step number")
    ),
    request_body = ActOnStage,
    responses(
        (status = 200, description = "Decision recorded", body = TicketDetails),
        (status = 403, description = "Caller is not eligible for this stage"),
        (status = 409, description = "Stage was decided concurrently"),
        (status = 422, description = "Ticket or stage is not in a decidable state")
    )
)]
pub async fn act_on_stage(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path((ticket_id, step_no)): Path<(i32, i16)>,
    Json(request): Json<ActOnStage>,
) -> AppResult<Json<TicketDetails>> {
    let ticket = state
        .services
        .tickets
        .act_on_stage(&actor, ticket_id, step_no, &request)
        .await?;
    Ok(Json(ticket))
}

/// Confirm pickup of an approved ticket
#[utoipa::path(
    post,
    path = "/tickets/{id}/pickup",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Pickup processed", body = PickupResponse),
        (status = 404, description = "Ticket not found"),
        (status = 422, description = "Ticket is not approved or its window has not started")
    )
)]
pub async fn pickup(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(ticket_id): Path<i32>,
) -> AppResult<Json<PickupResponse>> {
    let transitioned = state
        .services
        .tickets
        .transition_to_in_use(&actor, ticket_id)
        .await?;
    Ok(Json(PickupResponse {
        status: if transitioned {
            "in_use".to_string()
        } else {
            "already_in_use".to_string()
        },
    }))
}

/// Return the borrowed units and complete the ticket
#[utoipa::path(
    post,
    path = "/tickets/{id}/return",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Ticket ID")
    ),
    request_body = CompleteTicket,
    responses(
        (status = 200, description = "Ticket completed", body = TicketDetails),
        (status = 404, description = "Ticket not found"),
        (status = 422, description = "Ticket is not out on loan")
    )
)]
pub async fn complete_ticket(
    State(state): State<crate::AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(ticket_id): Path<i32>,
    Json(request): Json<CompleteTicket>,
) -> AppResult<Json<TicketDetails>> {
    let ticket = state
        .services
        .tickets
        .complete_ticket(&actor, ticket_id, &request)
        .await?;
    Ok(Json(ticket))
}

/// A ticket's append-only audit history
#[utoipa::path(
    get,
    path = "/tickets/{id}/history",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Audit entries, oldest first", body = Vec<TicketAuditEntry>),
        (status = 404, description = "Ticket not found")
    )
)]
pub async fn ticket_history(
    State(state): State<crate::AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Path(ticket_id): Path<i32>,
) -> AppResult<Json<Vec<TicketAuditEntry>>> {
    let entries = state.services.tickets.ticket_history(ticket_id).await?;
    Ok(Json(entries))
}
