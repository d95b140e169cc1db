mod common;

use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use common::test_app;
use momo_gateway::ports::PaymentStore;
use serde_json::json;
use uuid::Uuid;

async fn funded_user(app: &common::TestApp, amount: i64) -> Uuid {
    let user = Uuid::new_v4();
    app.store
        .adjust_fiat_balance(user, &BigDecimal::from(amount))
        .await
        .unwrap();
    user
}

async fn refunds(app: &common::TestApp, user: Uuid) -> Vec<BigDecimal> {
    app.store
        .list_transactions(user, 100, 0)
        .await
        .unwrap()
        .into_iter()
        .filter(|entry| entry.transaction_type == "refund")
        .map(|entry| entry.amount)
        .collect()
}

#[tokio::test]
async fn test_provider_rejection_refunds_exactly_once() {
    let app = test_app();
    let user = funded_user(&app, 1000).await;
    app.gateway.fail_initiation(503);

    let (status, body) = app
        .process(&user.to_string(), json!(400), "0712345678", "withdrawal")
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["logs"].is_array());

    let balance = app.store.get_balance(user).await.unwrap().unwrap();
    assert_eq!(balance.fiat_balance, BigDecimal::from(1000));
    assert_eq!(refunds(&app, user).await, vec![BigDecimal::from(400)]);
}

#[tokio::test]
async fn test_failed_callback_refunds_reserved_amount_once() {
    let app = test_app();
    let user = funded_user(&app, 1000).await;

    let (status, body) = app
        .process(&user.to_string(), json!(600), "0712345678", "withdrawal")
        .await;
    assert_eq!(status, StatusCode::OK);
    let reference = body["reference"].as_str().unwrap().to_string();

    let reserved = app.store.get_balance(user).await.unwrap().unwrap();
    assert_eq!(reserved.fiat_balance, BigDecimal::from(400));

    let payload = json!({ "ExternalReference": reference, "Status": "FAILED" });
    app.callback(payload.clone()).await;
    app.callback(payload).await;

    // A poll after the callback must not refund again either.
    app.gateway.set_status("FAILED");
    let (_, polled) = app.status(&reference).await;
    assert_eq!(polled["status"], "failed");

    let balance = app.store.get_balance(user).await.unwrap().unwrap();
    assert_eq!(balance.fiat_balance, BigDecimal::from(1000));
    assert_eq!(refunds(&app, user).await, vec![BigDecimal::from(600)]);
}

#[tokio::test]
async fn test_canceled_withdrawal_via_poll_refunds() {
    let app = test_app();
    let user = funded_user(&app, 500).await;

    let (_, body) = app
        .process(&user.to_string(), json!(500), "0712345678", "withdrawal")
        .await;
    let reference = body["reference"].as_str().unwrap().to_string();

    app.gateway.set_status("REJECTED_BY_USER");
    let (_, polled) = app.status(&reference).await;
    assert_eq!(polled["status"], "canceled");

    let balance = app.store.get_balance(user).await.unwrap().unwrap();
    assert_eq!(balance.fiat_balance, BigDecimal::from(500));
    assert_eq!(refunds(&app, user).await.len(), 1);
}

#[tokio::test]
async fn test_completed_withdrawal_records_debit_only() {
    let app = test_app();
    let user = funded_user(&app, 900).await;

    let (_, body) = app
        .process(&user.to_string(), json!(300), "0712345678", "withdrawal")
        .await;
    let reference = body["reference"].as_str().unwrap().to_string();

    app.callback(json!({ "ExternalReference": reference, "Status": "SUCCESS" }))
        .await;

    let balance = app.store.get_balance(user).await.unwrap().unwrap();
    assert_eq!(balance.fiat_balance, BigDecimal::from(600));

    let ledger = app.store.list_transactions(user, 10, 0).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].transaction_type, "withdrawal");
    assert_eq!(ledger[0].amount, BigDecimal::from(-300));
}

#[tokio::test]
async fn test_insufficient_funds_rejected_without_provider_call() {
    let app = test_app();
    let user = funded_user(&app, 100).await;

    let (status, body) = app
        .process(&user.to_string(), json!(101), "0712345678", "withdrawal")
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Insufficient funds"));
    assert_eq!(app.gateway.initiate_calls(), 0);

    let balance = app.store.get_balance(user).await.unwrap().unwrap();
    assert_eq!(balance.fiat_balance, BigDecimal::from(100));
}
