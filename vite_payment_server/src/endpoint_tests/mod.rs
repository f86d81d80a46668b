use actix_web::{
    test::{call_and_read_body_json, init_service, TestRequest},
    web,
    App,
};
use serde_json::Value;
use vite_payment_engine::{
    events::EventProducers,
    registries::WaitingList,
    traits::PaymentGatewayDatabase,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{config::GatewayOptions, routes};

const PAY_TIMEOUT_MS: i64 = 600_000;

async fn new_api() -> OrderFlowApi<SqliteDatabase> {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Could not open database");
    OrderFlowApi::new(db, WaitingList::new(), EventProducers::default(), PAY_TIMEOUT_MS)
}

fn options() -> GatewayOptions {
    GatewayOptions {
        wallet_address: "vite_0000000000000000000000000000000000000000000000000000".to_string(),
        default_callback_url: "http://shop.local/hook".to_string(),
        allow_external_callbacks: false,
    }
}

macro_rules! gateway_app {
    ($api:expr) => {
        init_service(
            App::new()
                .app_data(web::Data::new($api.clone()))
                .app_data(web::Data::new(options()))
                .service(routes::create_payment)
                .service(routes::get_payment_status)
                .default_service(web::route().to(routes::invalid_endpoint)),
        )
        .await
    };
}

#[actix_web::test]
async fn creating_a_payment_returns_the_offer() {
    let api = new_api().await;
    let app = gateway_app!(api);
    let req = TestRequest::get().uri("/createPayment?amount=1.5&data=invoice-77").to_request();
    let body: Value = call_and_read_body_json(&app, req).await;
    assert_eq!(body["walletAddress"], options().wallet_address);
    assert_eq!(body["timeLeft"], PAY_TIMEOUT_MS);
    let payment_id = body["paymentId"].as_str().expect("paymentId should be a string");
    assert_eq!(payment_id.len(), 7);
    assert!(payment_id.chars().all(|c| c.is_ascii_digit()));
}

#[actix_web::test]
async fn unusable_amounts_are_refused() {
    let api = new_api().await;
    let app = gateway_app!(api);
    for uri in ["/createPayment", "/createPayment?amount=", "/createPayment?amount=0", "/createPayment?amount=-2", "/createPayment?amount=a+lot"] {
        let req = TestRequest::get().uri(uri).to_request();
        let body: Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["err"], "INVALID_AMOUNT", "{uri} should be refused");
    }
}

#[actix_web::test]
async fn status_reads_are_stable() {
    let api = new_api().await;
    let app = gateway_app!(api);
    let req = TestRequest::get().uri("/createPayment?amount=2").to_request();
    let created: Value = call_and_read_body_json(&app, req).await;
    let payment_id = created["paymentId"].as_str().unwrap().to_string();
    for _ in 0..3 {
        let req = TestRequest::get().uri(&format!("/getPaymentStatus?paymentId={payment_id}")).to_request();
        let body: Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["timeLeft"], PAY_TIMEOUT_MS);
    }
}

#[actix_web::test]
async fn unknown_payment_ids_are_refused() {
    let api = new_api().await;
    let app = gateway_app!(api);
    for uri in ["/getPaymentStatus", "/getPaymentStatus?paymentId=", "/getPaymentStatus?paymentId=9999999"] {
        let req = TestRequest::get().uri(uri).to_request();
        let body: Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["err"], "INVALID_PAYMENTID", "{uri} should be refused");
    }
}

#[actix_web::test]
async fn unknown_endpoints_are_refused() {
    let api = new_api().await;
    let app = gateway_app!(api);
    let req = TestRequest::get().uri("/makeMeRich").to_request();
    let body: Value = call_and_read_body_json(&app, req).await;
    assert_eq!(body["err"], "INVALID_ENDPOINT");
}

#[actix_web::test]
async fn the_default_token_is_the_native_coin() {
    let api = new_api().await;
    let app = gateway_app!(api);
    let req = TestRequest::get().uri("/createPayment?amount=1").to_request();
    let body: Value = call_and_read_body_json(&app, req).await;
    let payment_id = body["paymentId"].as_str().unwrap().to_string();
    let order = api
        .db()
        .fetch_order(&vite_payment_engine::db_types::PaymentId(payment_id))
        .await
        .unwrap()
        .expect("the order should be stored");
    assert_eq!(order.token_id, vpg_common::VITE_TOKEN_ID);
    assert_eq!(order.amount.value(), 10u128.pow(18));
    assert_eq!(order.data, "NOT_SET");
    // external callbacks are disallowed in this app, so the default sticks
    assert_eq!(order.callback_address, "http://shop.local/hook");
}
