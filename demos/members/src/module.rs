//! Wiring of the members module: projection, HTTP surface, registration.
//!
//! The module subscribes one projection handler for its two event types,
//! serves the member list and member cards publicly, accepts flirts from
//! authenticated members, and registers a reset hook that wipes the view.

use axum::Json;
use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use modulith_core::bus::{EventBus, EventHandler, HandlerError, HandlerFuture};
use modulith_core::clock::{Clock, SystemClock};
use modulith_core::event::{EventRecord, PendingEvent};
use modulith_core::module::{Context, Module, RegistrationError};
use modulith_core::stream::StreamId;
use modulith_web::{AppError, Identity, WebHandler, publish_response};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::types::{Gender, MemberCard, MemberEvent, MembersView, Portrait};

/// Stable module name, used in subscriptions and failure reports.
pub const MODULE_NAME: &str = "members";

/// The members module.
///
/// Owns the view model; nothing outside this struct (and the closures it
/// registers) ever touches it. Constructed with the bus handle before
/// registration, wired in via [`Module::register`].
pub struct MembersModule {
    bus: Arc<EventBus>,
    view: Arc<RwLock<MembersView>>,
    clock: Arc<dyn Clock>,
}

impl MembersModule {
    /// Create the module with an empty view and the system clock.
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_clock(bus, Arc::new(SystemClock))
    }

    /// Create the module with an explicit clock (deterministic ages in tests).
    #[must_use]
    pub fn with_clock(bus: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            view: Arc::new(RwLock::new(MembersView::new())),
            clock,
        }
    }

    /// A point-in-time copy of the view model.
    #[must_use]
    pub fn snapshot(&self) -> MembersView {
        read_lock(&self.view).clone()
    }
}

impl Module<WebHandler> for MembersModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn register(&self, ctx: &mut Context<'_, WebHandler>) -> Result<(), RegistrationError> {
        let view = Arc::clone(&self.view);
        let clock = Arc::clone(&self.clock);
        ctx.add_http_handler(
            "/members",
            get(move || {
                let view = Arc::clone(&view);
                let clock = Arc::clone(&clock);
                async move { list_members(&view, clock.as_ref()) }
            }),
        )?;

        let view = Arc::clone(&self.view);
        let clock = Arc::clone(&self.clock);
        ctx.add_http_handler(
            "/members/:id",
            get(move |Path(member_id): Path<Uuid>| {
                let view = Arc::clone(&view);
                let clock = Arc::clone(&clock);
                async move { get_member(&view, clock.as_ref(), member_id) }
            }),
        )?;

        let bus = Arc::clone(&self.bus);
        ctx.add_auth_http(
            "/flirts",
            post(move |identity: Identity, Json(request): Json<FlirtRequest>| {
                let bus = Arc::clone(&bus);
                async move { send_flirt(&bus, &identity, request).await }
            }),
        )?;

        ctx.register_event_handler(Arc::new(MembersProjection {
            view: Arc::clone(&self.view),
        }))?;

        let view = Arc::clone(&self.view);
        ctx.reset_data(move || write_lock(&view).clear());

        Ok(())
    }
}

/// The fold side of the module: decodes its two event types and applies
/// them to the view. Both folds insert by id, so re-delivery during
/// replay lands on the same state.
struct MembersProjection {
    view: Arc<RwLock<MembersView>>,
}

impl EventHandler for MembersProjection {
    fn module(&self) -> &str {
        MODULE_NAME
    }

    fn interests(&self) -> &[&str] {
        &["RegistrationApproved.v1", "FlirtSent.v1"]
    }

    fn handle<'a>(&'a self, record: &'a EventRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            let event: MemberEvent = record
                .decode()
                .map_err(|e| HandlerError::new(e.to_string()))?;
            write_lock(&self.view).apply(&event, record.occurred_at);
            Ok(())
        })
    }
}

/// Body of a flirt request. The sender comes from the established
/// identity, never from the body.
#[derive(Debug, Deserialize)]
pub struct FlirtRequest {
    /// The member being flirted with.
    pub to: Uuid,
}

/// A member card as served over HTTP; age is derived at request time.
#[derive(Debug, Serialize)]
struct MemberResponse {
    member_id: Uuid,
    name: String,
    gender: Gender,
    age: u32,
    portrait: Portrait,
}

impl MemberResponse {
    fn from_card(card: &MemberCard, today: chrono::NaiveDate) -> Self {
        Self {
            member_id: card.member_id,
            name: card.name.clone(),
            gender: card.gender,
            age: card.birthday.age_on(today),
            portrait: card.portrait.clone(),
        }
    }
}

fn list_members(view: &RwLock<MembersView>, clock: &dyn Clock) -> Json<Vec<MemberResponse>> {
    let today = clock.now().date_naive();
    let members = read_lock(view)
        .members()
        .map(|card| MemberResponse::from_card(card, today))
        .collect();
    Json(members)
}

fn get_member(
    view: &RwLock<MembersView>,
    clock: &dyn Clock,
    member_id: Uuid,
) -> Result<Json<MemberResponse>, AppError> {
    let today = clock.now().date_naive();
    read_lock(view)
        .member(&member_id)
        .map(|card| Json(MemberResponse::from_card(card, today)))
        .ok_or_else(|| AppError::not_found(format!("no member {member_id}")))
}

async fn send_flirt(bus: &EventBus, identity: &Identity, request: FlirtRequest) -> Response {
    if request.to == identity.user_id {
        return AppError::bad_request("cannot flirt with yourself").into_response();
    }
    let event = MemberEvent::FlirtSent {
        flirt_id: Uuid::new_v4(),
        from: identity.user_id,
        to: request.to,
    };
    let pending = match PendingEvent::from_event(&event, StreamId::from_uuid(identity.user_id)) {
        Ok(pending) => pending,
        Err(error) => {
            return AppError::internal("event could not be encoded")
                .with_source(error.into())
                .into_response();
        }
    };
    publish_response(bus.publish(pending).await)
}

/// Read the view, recovering from a poisoned lock. Folds are insert-only,
/// so a poisoned write left the maps valid.
fn read_lock(lock: &RwLock<MembersView>) -> RwLockReadGuard<'_, MembersView> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock(lock: &RwLock<MembersView>) -> RwLockWriteGuard<'_, MembersView> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
