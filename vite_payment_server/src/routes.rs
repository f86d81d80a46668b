//! Request handlers for the merchant-facing API.
//!
//! The contract is deliberately forgiving: malformed input is answered with `200 OK` and a structured
//! `{"err": "..."}` body rather than a 4xx, so that thin storefront integrations only ever have to parse JSON.
use actix_web::{get, web, HttpResponse};
use log::*;
use rust_decimal::Decimal;
use serde_json::json;
use vite_payment_engine::{
    db_types::{NewOrder, PaymentId},
    OrderFlowApi, SqliteDatabase,
};
use vpg_common::{AttoVite, VITE_TOKEN_ID};

use crate::{
    config::GatewayOptions,
    data_objects::{CreatePaymentParams, CreatePaymentResponse, PaymentStatusParams},
    errors::ServerError,
};

fn client_error(code: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "err": code }))
}

/// Route handler for the `createPayment` endpoint.
///
/// The amount is given in decimal VITE and must be strictly positive. The token id defaults to the native coin and
/// the callback address passes through [`GatewayOptions::callback_address`], so an external address only sticks when
/// the operator has allowed it.
#[get("/createPayment")]
pub async fn create_payment(
    params: web::Query<CreatePaymentParams>,
    api: web::Data<OrderFlowApi<SqliteDatabase>>,
    options: web::Data<GatewayOptions>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    let Some(amount) = params.amount.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        debug!("🖥️📦️ createPayment called without an amount");
        return Ok(client_error("INVALID_AMOUNT"));
    };
    let amount = match amount.parse::<Decimal>().map_err(|e| e.to_string()).and_then(|d| {
        AttoVite::from_vite_decimal(d).map_err(|e| e.to_string())
    }) {
        Ok(a) if !a.is_zero() => a,
        Ok(_) => {
            debug!("🖥️📦️ createPayment called with a zero amount");
            return Ok(client_error("INVALID_AMOUNT"));
        },
        Err(e) => {
            debug!("🖥️📦️ createPayment called with an unusable amount. {e}");
            return Ok(client_error("INVALID_AMOUNT"));
        },
    };
    let token_id = params.token_id.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or(VITE_TOKEN_ID);
    let callback_address = options.callback_address(params.callback_address.as_deref());
    let mut order = NewOrder::new(amount, token_id).with_callback_address(callback_address);
    if let Some(data) = params.data.filter(|d| !d.is_empty()) {
        order = order.with_data(data);
    }
    let (order, time_left) =
        api.create_order(order).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    info!("🖥️📦️ New order {} for {:#} of {}", order.payment_id, order.amount, order.token_id);
    let response = CreatePaymentResponse {
        wallet_address: options.wallet_address.clone(),
        payment_id: order.payment_id,
        time_left,
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Route handler for the `getPaymentStatus` endpoint.
#[get("/getPaymentStatus")]
pub async fn get_payment_status(
    params: web::Query<PaymentStatusParams>,
    api: web::Data<OrderFlowApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let Some(payment_id) = params.into_inner().payment_id.filter(|s| !s.trim().is_empty()) else {
        debug!("🖥️❓️ getPaymentStatus called without a paymentId");
        return Ok(client_error("INVALID_PAYMENTID"));
    };
    let payment_id = PaymentId(payment_id.trim().to_string());
    let status = api.payment_status(&payment_id).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    match status {
        Some(status) => Ok(HttpResponse::Ok().json(status)),
        None => {
            debug!("🖥️❓️ getPaymentStatus called for unknown order {payment_id}");
            Ok(client_error("INVALID_PAYMENTID"))
        },
    }
}

/// Catch-all for every path that is not part of the API.
pub async fn invalid_endpoint() -> HttpResponse {
    client_error("INVALID_ENDPOINT")
}
