//! JSON API under `/api/v1`.
//!
//! Callers identify themselves with `x-actor-id` and `x-actor-role`
//! (`travel_agent` | `dmc_agent`). Completion, payment and sweep routes act as
//! the system and require `x-system-token` to match `server.system_token`.
//! `x-correlation-id` is echoed in every error body and generated when absent.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;
use voyage_core::domain::actor::{Actor, ActorRole, AgentId, RequestContext};
use voyage_core::domain::booking::{Booking, BookingId, BookingStatus, GuestDetails, PaymentStatus};
use voyage_core::domain::hotel::{Hotel, HotelDraft, HotelId, HotelPatch};
use voyage_core::domain::offer::{Offer, OfferId, OfferRequest, OfferStatus};
use voyage_core::domain::quote::QuoteDraft;
use voyage_core::errors::{ApplicationError, DomainError, InterfaceError};
use voyage_core::search::{HotelSearchFilters, Page, PageRequest};
use voyage_workflow::{
    AcceptedOffer, BookingStatistics, MarketplaceService, OfferStatistics, SweepSummary,
};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const SYSTEM_TOKEN_HEADER: &str = "x-system-token";

#[derive(Clone)]
pub struct ApiState {
    service: Arc<MarketplaceService>,
    system_token: Option<SecretString>,
}

pub fn router(service: Arc<MarketplaceService>, system_token: Option<SecretString>) -> Router {
    Router::new()
        .route("/api/v1/hotels", post(create_hotel))
        .route("/api/v1/hotels/search", post(search_hotels))
        .route(
            "/api/v1/hotels/{hotel_id}",
            get(get_hotel).patch(update_hotel).delete(deactivate_hotel),
        )
        .route("/api/v1/dmc/{agent_id}/hotels", get(list_hotels_for_dmc))
        .route("/api/v1/offers", post(create_offer).get(list_offers))
        .route("/api/v1/offers/statistics", get(offer_statistics))
        .route("/api/v1/offers/{offer_id}", get(get_offer))
        .route("/api/v1/offers/{offer_id}/quote", post(attach_quote))
        .route("/api/v1/offers/{offer_id}/accept", post(accept_quote))
        .route("/api/v1/offers/{offer_id}/reject", post(reject_quote))
        .route("/api/v1/bookings", get(list_bookings))
        .route("/api/v1/bookings/statistics", get(booking_statistics))
        .route("/api/v1/bookings/confirmation/{code}", get(find_booking_by_confirmation))
        .route("/api/v1/bookings/{booking_id}", get(get_booking))
        .route("/api/v1/bookings/{booking_id}/cancel", post(cancel_booking))
        .route("/api/v1/bookings/{booking_id}/complete", post(complete_booking))
        .route("/api/v1/bookings/{booking_id}/payment", post(record_payment))
        .route("/api/v1/sweeps", post(run_sweeps))
        .with_state(ApiState { service, system_token })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub user_message: &'static str,
    pub correlation_id: String,
}

impl ApiError {
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::from_application(DomainError::validation(message).into(), correlation_id)
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            InterfaceError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            InterfaceError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            InterfaceError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
            InterfaceError::ConcurrentModification { .. } => {
                (StatusCode::CONFLICT, "concurrent_modification")
            }
            InterfaceError::Expired { .. } => (StatusCode::GONE, "expired"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        } else {
            warn!(
                event_name = "api.request.rejected",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
        }

        let body = ErrorBody {
            error: kind,
            message: self.0.message().to_owned(),
            user_message: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Caller extraction
// ---------------------------------------------------------------------------

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

/// An authenticated travel agent or DMC agent.
pub struct Caller(pub RequestContext);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let Some(id) = header(&parts.headers, ACTOR_ID_HEADER) else {
            return Err(ApiError::bad_request(
                format!("missing `{ACTOR_ID_HEADER}` header"),
                &correlation_id,
            ));
        };
        let Some(role) = header(&parts.headers, ACTOR_ROLE_HEADER).and_then(ActorRole::parse)
        else {
            return Err(ApiError::bad_request(
                format!("`{ACTOR_ROLE_HEADER}` must be `travel_agent` or `dmc_agent`"),
                &correlation_id,
            ));
        };

        let actor = Actor { id: AgentId(id.to_owned()), role };
        Ok(Self(RequestContext::new(actor, correlation_id)))
    }
}

/// A caller holding the configured system token. Carries the correlation id.
pub struct SystemCaller(pub String);

impl FromRequestParts<ApiState> for SystemCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let presented = header(&parts.headers, SYSTEM_TOKEN_HEADER);
        let authorized = match (&state.system_token, presented) {
            (Some(expected), Some(presented)) => expected.expose_secret().trim() == presented,
            _ => false,
        };
        if !authorized {
            return Err(ApiError::from_application(
                DomainError::Forbidden(format!(
                    "system operations require a valid `{SYSTEM_TOKEN_HEADER}` header"
                ))
                .into(),
                &correlation_id,
            ));
        }
        Ok(Self(correlation_id))
    }
}

/// Correlation id for anonymous reads.
pub struct Correlation(pub String);

impl<S> FromRequestParts<S> for Correlation
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(correlation_id(&parts.headers)))
    }
}

// ---------------------------------------------------------------------------
// Request bodies and queries
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest { page: self.page, limit: self.limit }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListQuery {
    fn request(&self) -> PageRequest {
        PageRequest { page: self.page, limit: self.limit }
    }

    fn status<T>(
        &self,
        parse: fn(&str) -> Option<T>,
        correlation_id: &str,
    ) -> ApiResult<Option<T>> {
        match self.status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(None),
            Some(raw) => parse(raw).map(Some).ok_or_else(|| {
                ApiError::bad_request(format!("unknown status filter `{raw}`"), correlation_id)
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub guest_details: GuestDetails,
    #[serde(default)]
    pub special_requests: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub status: PaymentStatus,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

async fn create_hotel(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Json(draft): Json<HotelDraft>,
) -> ApiResult<(StatusCode, Json<Hotel>)> {
    let hotel = state
        .service
        .create_hotel(&ctx, draft)
        .await
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))?;
    Ok((StatusCode::CREATED, Json(hotel)))
}

async fn search_hotels(
    State(state): State<ApiState>,
    Correlation(correlation_id): Correlation,
    Query(page): Query<PageQuery>,
    Json(filters): Json<HotelSearchFilters>,
) -> ApiResult<Json<Page<Hotel>>> {
    state
        .service
        .search_hotels(&filters, page.request())
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn get_hotel(
    State(state): State<ApiState>,
    Correlation(correlation_id): Correlation,
    Path(hotel_id): Path<String>,
) -> ApiResult<Json<Hotel>> {
    state
        .service
        .get_hotel(&HotelId(hotel_id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn update_hotel(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(hotel_id): Path<String>,
    Json(patch): Json<HotelPatch>,
) -> ApiResult<Json<Hotel>> {
    state
        .service
        .update_hotel(&ctx, &HotelId(hotel_id), patch)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn deactivate_hotel(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(hotel_id): Path<String>,
) -> ApiResult<Json<Hotel>> {
    state
        .service
        .deactivate_hotel(&ctx, &HotelId(hotel_id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn list_hotels_for_dmc(
    State(state): State<ApiState>,
    Correlation(correlation_id): Correlation,
    Path(agent_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Hotel>>> {
    state
        .service
        .list_hotels_for_dmc(&AgentId(agent_id), page.request())
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

async fn create_offer(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Json(request): Json<OfferRequest>,
) -> ApiResult<(StatusCode, Json<Offer>)> {
    let offer = state
        .service
        .create_offer(&ctx, request)
        .await
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))?;
    Ok((StatusCode::CREATED, Json(offer)))
}

async fn list_offers(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Offer>>> {
    let status = query.status(OfferStatus::parse, &ctx.correlation_id)?;
    state
        .service
        .list_offers(&ctx, status, query.request())
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn offer_statistics(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
) -> ApiResult<Json<OfferStatistics>> {
    state
        .service
        .offer_statistics(&ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn get_offer(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(offer_id): Path<String>,
) -> ApiResult<Json<Offer>> {
    state
        .service
        .get_offer(&ctx, &OfferId(offer_id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn attach_quote(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(offer_id): Path<String>,
    Json(draft): Json<QuoteDraft>,
) -> ApiResult<Json<Offer>> {
    state
        .service
        .attach_quote(&ctx, &OfferId(offer_id), draft)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn accept_quote(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(offer_id): Path<String>,
    Json(body): Json<AcceptRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedOffer>)> {
    let accepted = state
        .service
        .accept_quote(&ctx, &OfferId(offer_id), body.guest_details, body.special_requests)
        .await
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))?;
    Ok((StatusCode::CREATED, Json(accepted)))
}

async fn reject_quote(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(offer_id): Path<String>,
) -> ApiResult<Json<Offer>> {
    state
        .service
        .reject_quote(&ctx, &OfferId(offer_id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

// ---------------------------------------------------------------------------
// Bookings
// ---------------------------------------------------------------------------

async fn list_bookings(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Booking>>> {
    let status = query.status(BookingStatus::parse, &ctx.correlation_id)?;
    state
        .service
        .list_bookings(&ctx, status, query.request())
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn booking_statistics(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
) -> ApiResult<Json<BookingStatistics>> {
    state
        .service
        .booking_statistics(&ctx)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn find_booking_by_confirmation(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(code): Path<String>,
) -> ApiResult<Json<Booking>> {
    state
        .service
        .find_booking_by_confirmation(&ctx, &code)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn get_booking(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Booking>> {
    state
        .service
        .get_booking(&ctx, &BookingId(booking_id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn cancel_booking(
    State(state): State<ApiState>,
    Caller(ctx): Caller,
    Path(booking_id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> ApiResult<Json<Booking>> {
    state
        .service
        .cancel_booking(&ctx, &BookingId(booking_id), body.reason)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &ctx.correlation_id))
}

async fn complete_booking(
    State(state): State<ApiState>,
    SystemCaller(correlation_id): SystemCaller,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Booking>> {
    state
        .service
        .complete_booking(&BookingId(booking_id), &correlation_id)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn record_payment(
    State(state): State<ApiState>,
    SystemCaller(correlation_id): SystemCaller,
    Path(booking_id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> ApiResult<Json<Booking>> {
    state
        .service
        .record_payment(&BookingId(booking_id), body.status, &correlation_id)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn run_sweeps(
    State(state): State<ApiState>,
    SystemCaller(correlation_id): SystemCaller,
) -> ApiResult<Json<SweepSummary>> {
    let now = state.service.now();
    state
        .service
        .run_sweeps(now)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use voyage_core::clock::ManualClock;
    use voyage_core::confirmation::ScriptedConfirmationCodes;
    use voyage_db::repositories::InMemoryMarketplaceStore;
    use voyage_workflow::MarketplaceService;

    use super::router;

    const DMC: (&str, &str) = ("dmc-api", "dmc_agent");
    const TRAVEL: (&str, &str) = ("ta-api", "travel_agent");
    const SYSTEM_TOKEN: &str = "ops-token-4f9a2c71";

    fn app() -> (Router, ManualClock) {
        let clock =
            ManualClock::new(Utc.with_ymd_and_hms(2027, 2, 1, 12, 0, 0).single().expect("instant"));
        let service = MarketplaceService::in_memory(Arc::new(InMemoryMarketplaceStore::new()))
            .with_clock(Arc::new(clock.clone()))
            .with_confirmation_codes(Arc::new(ScriptedConfirmationCodes::new([
                "VG-2027-HTTP2345",
            ])));
        (router(Arc::new(service), Some(SecretString::from(SYSTEM_TOKEN))), clock)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        actor: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let headers = match actor {
            Some((id, role)) => vec![("x-actor-id", id), ("x-actor-role", role)],
            None => Vec::new(),
        };
        send(app, method, uri, &headers, body).await
    }

    async fn as_system(
        app: &Router,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let headers: Vec<(&str, &str)> =
            token.map(|token| ("x-system-token", token)).into_iter().collect();
        send(app, "POST", uri, &headers, body).await
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-correlation-id", "req-test");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => request.body(Body::empty()).expect("request"),
        };

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    fn hotel_body() -> Value {
        json!({
            "name": "Hotel Avenida",
            "location": { "city": "Lisbon", "country": "Portugal" },
            "star_rating": 4,
            "amenities": ["Pool", "Wifi"],
            "room_types": [{ "name": "Double", "max_occupancy": 2, "base_price": "210.00" }]
        })
    }

    fn offer_body(hotel_id: &str) -> Value {
        json!({
            "hotel_id": hotel_id,
            "check_in": "2027-03-10",
            "check_out": "2027-03-12",
            "guests": { "adults": 2 },
            "room_requirements": [
                { "room_type": "Double", "quantity": 1, "guests_per_room": { "adults": 2 } }
            ],
            "expires_at": "2027-02-03T12:00:00Z"
        })
    }

    fn quote_body(total: &str, valid_until: &str) -> Value {
        json!({
            "room_breakdown": [{
                "room_type": "Double", "quantity": 1, "nights": 2,
                "rate_per_night": "200.00", "subtotal": "400.00"
            }],
            "total_cost": total,
            "currency": "EUR",
            "payment_terms": "Pay on confirmation",
            "cancellation_policy": "Full refund before check-in",
            "valid_until": valid_until
        })
    }

    async fn quoted_offer(app: &Router) -> String {
        let (status, hotel) =
            call(app, "POST", "/api/v1/hotels", Some(DMC), Some(hotel_body())).await;
        assert_eq!(status, StatusCode::CREATED, "{hotel}");
        let hotel_id = hotel["id"].as_str().expect("hotel id");

        let (status, offer) =
            call(app, "POST", "/api/v1/offers", Some(TRAVEL), Some(offer_body(hotel_id))).await;
        assert_eq!(status, StatusCode::CREATED, "{offer}");
        let offer_id = offer["id"].as_str().expect("offer id").to_owned();

        let (status, quoted) = call(
            app,
            "POST",
            &format!("/api/v1/offers/{offer_id}/quote"),
            Some(DMC),
            Some(quote_body("400.00", "2027-02-05T12:00:00Z")),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{quoted}");
        assert_eq!(quoted["status"], "quoted");
        offer_id
    }

    #[tokio::test]
    async fn quote_accept_and_lookup_by_confirmation() {
        let (app, _) = app();
        let offer_id = quoted_offer(&app).await;

        let (status, accepted) = call(
            &app,
            "POST",
            &format!("/api/v1/offers/{offer_id}/accept"),
            Some(TRAVEL),
            Some(json!({
                "guest_details": {
                    "primary_guest": {
                        "name": "Rui Costa", "email": "rui@example.com", "phone": "+351 900 000 000"
                    }
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{accepted}");
        assert_eq!(accepted["offer"]["status"], "accepted");
        assert_eq!(accepted["booking"]["confirmation_number"], "VG-2027-HTTP2345");

        let (status, booking) = call(
            &app,
            "GET",
            "/api/v1/bookings/confirmation/vg-2027-http2345",
            Some(DMC),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booking["total_amount"], "400.00");

        let (status, stats) =
            call(&app, "GET", "/api/v1/offers/statistics", Some(TRAVEL), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["by_status"]["accepted"], 1);
    }

    #[tokio::test]
    async fn missing_identity_is_a_bad_request_with_correlation_id() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/api/v1/offers", None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        assert_eq!(body["correlation_id"], "req-test");
        assert!(body["user_message"].as_str().is_some_and(|message| !message.is_empty()));
    }

    #[tokio::test]
    async fn error_kinds_map_to_status_codes() {
        let (app, clock) = app();
        let offer_id = quoted_offer(&app).await;

        let (status, body) =
            call(&app, "POST", "/api/v1/hotels", Some(TRAVEL), Some(hotel_body())).await;
        assert_eq!((status, body["error"].as_str()), (StatusCode::FORBIDDEN, Some("forbidden")));

        let (status, _) = call(&app, "GET", "/api/v1/offers/OFR-missing", Some(TRAVEL), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/offers/{offer_id}/quote"),
            Some(DMC),
            Some(quote_body("999.00", "2027-02-05T12:00:00Z")),
        )
        .await;
        assert_eq!((status, body["error"].as_str()), (StatusCode::BAD_REQUEST, Some("validation")));

        let (status, body) =
            call(&app, "GET", "/api/v1/bookings?status=lost", Some(TRAVEL), None).await;
        assert_eq!((status, body["error"].as_str()), (StatusCode::BAD_REQUEST, Some("validation")));

        clock.advance(chrono::Duration::days(5));
        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/v1/offers/{offer_id}/accept"),
            Some(TRAVEL),
            Some(json!({
                "guest_details": {
                    "primary_guest": {
                        "name": "Rui",
                        "email": "rui@example.com",
                        "phone": "+351 1"
                    }
                }
            })),
        )
        .await;
        assert_eq!((status, body["error"].as_str()), (StatusCode::GONE, Some("expired")));

        let reject = format!("/api/v1/offers/{offer_id}/reject");
        let (status, _) = call(&app, "POST", &reject, Some(TRAVEL), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, "POST", &reject, Some(TRAVEL), None).await;
        assert_eq!((status, body["error"].as_str()), (StatusCode::CONFLICT, Some("invalid_state")));
    }

    #[tokio::test]
    async fn sweep_endpoint_reports_expired_offers() {
        let (app, clock) = app();
        let offer_id = quoted_offer(&app).await;

        clock.advance(chrono::Duration::days(10));
        let (status, _) = call(&app, "POST", "/api/v1/sweeps", Some(DMC), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, summary) = as_system(&app, "/api/v1/sweeps", Some(SYSTEM_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["offers_expired"]["transitioned"], 1);

        let (_, offer) =
            call(&app, "GET", &format!("/api/v1/offers/{offer_id}"), Some(TRAVEL), None).await;
        assert_eq!(offer["status"], "expired");
    }

    #[tokio::test]
    async fn payment_requires_the_system_token() {
        let (app, _) = app();
        let offer_id = quoted_offer(&app).await;
        let (_, accepted) = call(
            &app,
            "POST",
            &format!("/api/v1/offers/{offer_id}/accept"),
            Some(TRAVEL),
            Some(json!({
                "guest_details": {
                    "primary_guest": {
                        "name": "Rui",
                        "email": "rui@example.com",
                        "phone": "+351 1"
                    }
                }
            })),
        )
        .await;
        let booking_id = accepted["booking"]["id"].as_str().expect("booking id").to_owned();
        let payment_uri = format!("/api/v1/bookings/{booking_id}/payment");
        let paid = || Some(json!({ "status": "paid" }));

        let (status, body) = as_system(&app, &payment_uri, None, paid()).await;
        assert_eq!((status, body["error"].as_str()), (StatusCode::FORBIDDEN, Some("forbidden")));

        let (status, _) = as_system(&app, &payment_uri, Some("guessed-token"), paid()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let complete_uri = format!("/api/v1/bookings/{booking_id}/complete");
        let (status, _) = call(&app, "POST", &complete_uri, Some(TRAVEL), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let booking_uri = format!("/api/v1/bookings/{booking_id}");
        let (_, booking) = call(&app, "GET", &booking_uri, Some(TRAVEL), None).await;
        assert_eq!(booking["payment_status"], "pending");

        let (status, booking) = as_system(&app, &payment_uri, Some(SYSTEM_TOKEN), paid()).await;
        assert_eq!(status, StatusCode::OK, "{booking}");
        assert_eq!(booking["payment_status"], "paid");
    }

    #[tokio::test]
    async fn system_routes_are_closed_without_a_configured_token() {
        let service = MarketplaceService::in_memory(Arc::new(InMemoryMarketplaceStore::new()));
        let app = router(Arc::new(service), None);

        let (status, _) = as_system(&app, "/api/v1/sweeps", Some(SYSTEM_TOKEN), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
