//! Browser-post callback receiver (spec §4.9, §6): the gateway redirects
//! the cardholder's browser back to this endpoint with a form-encoded
//! body carrying the settled outcome of a hosted-payment transaction
//! started via `begin_browser_post`. The join point back to the
//! originating row is `gateway_tran_nbr`, stamped onto the pending
//! transaction at creation time so this handler can resolve it without
//! any session state of its own.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::Html,
};

use crate::domain::transaction::{CardIndicators, TransactionStatus};

use super::router::AppState;

/// Fixed order the gateway's own callback MAC is computed over. Only
/// fields actually present in the posted form are included — the
/// gateway omits fields that don't apply to a given transaction type
/// (e.g. no `AUTH_CODE` on a decline).
const MAC_FIELD_ORDER: &[&str] = &[
    "TRAN_NBR",
    "RESP_CODE",
    "RESP_TEXT",
    "AUTH_CODE",
    "TOKEN",
    "NETWORK_TRAN_ID",
    "CARD_BRAND",
    "AVS_RESULT",
    "CVV_RESULT",
];

fn ordered_mac_fields<'a>(form: &'a HashMap<String, String>) -> Vec<(&'a str, &'a str)> {
    MAC_FIELD_ORDER
        .iter()
        .filter_map(|name| form.get(*name).map(|value| (*name, value.as_str())))
        .collect()
}

fn error_page(message: &str) -> Html<String> {
    Html(format!(
        "<html><body><h1>Payment could not be completed</h1><p>{message}</p></body></html>"
    ))
}

/// Never distinguishes a MAC failure from an IP failure, and never
/// mutates transaction state, in its error responses (spec §7) — both
/// render the identical generic page below.
fn rejected_page() -> Html<String> {
    error_page("the transaction could not be verified")
}

/// `POST /callback/browser-post`. The source IP is read from the TCP
/// peer address rather than a forwarded-for header, since a header is
/// caller-supplied and exactly what the allowlist exists to not trust.
pub async fn browser_post(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    form: String,
) -> (StatusCode, Html<String>) {
    let fields: HashMap<String, String> = match serde_urlencoded::from_str(&form) {
        Ok(fields) => fields,
        Err(_) => return (StatusCode::BAD_REQUEST, error_page("malformed callback body")),
    };

    let tran_nbr = match fields.get("TRAN_NBR") {
        Some(v) => v.clone(),
        None => return (StatusCode::BAD_REQUEST, error_page("missing TRAN_NBR")),
    };
    let received_mac = match fields.get("MAC") {
        Some(v) => v.clone(),
        None => return (StatusCode::BAD_REQUEST, error_page("missing MAC")),
    };

    let transaction = match state.transactions.find_pending_by_tran_nbr(&tran_nbr).await {
        Ok(t) => t,
        Err(_) => return (StatusCode::BAD_REQUEST, rejected_page()),
    };

    let credentials = match state.credentials.get(transaction.merchant_id).await {
        Ok(c) => c,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, rejected_page()),
    };

    let source_ip = addr.ip().to_string();
    let ordered = ordered_mac_fields(&fields);
    let verified = match state
        .callback_verifier
        .verify(&credentials.mac_secret, &ordered, &received_mac, &source_ip)
        .await
    {
        Ok(ok) => ok,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, rejected_page()),
    };
    if !verified {
        return (StatusCode::FORBIDDEN, rejected_page());
    }

    let response_code = fields.get("RESP_CODE").cloned().unwrap_or_default();
    let status = if response_code == "00" {
        TransactionStatus::Approved
    } else {
        TransactionStatus::Declined
    };
    let card_indicators = CardIndicators {
        card_brand: fields.get("CARD_BRAND").cloned(),
        avs_result: fields.get("AVS_RESULT").cloned(),
        cvv_result: fields.get("CVV_RESULT").cloned(),
    };

    let finalized = state
        .transactions
        .finalize_from_callback(
            &tran_nbr,
            status,
            fields.get("TOKEN").cloned(),
            Some(response_code.clone()),
            fields.get("RESP_TEXT").cloned(),
            card_indicators,
        )
        .await;

    match finalized {
        Ok(transaction) if transaction.status == TransactionStatus::Approved => (
            StatusCode::OK,
            Html("<html><body><h1>Payment approved</h1></body></html>".to_string()),
        ),
        Ok(_) => (
            StatusCode::OK,
            Html("<html><body><h1>Payment declined</h1></body></html>".to_string()),
        ),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, rejected_page()),
    }
}
