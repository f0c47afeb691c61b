//! Server-to-server wire contract (spec §6): field names and type codes
//! are part of the external contract and must be preserved bit-for-bit.
//! Field ORDER here also doubles as the MAC field order (spec §4.5
//! Open Question (b): "the precise MAC algorithm and field ordering...
//! is gateway-defined" — this adapter uses the same ordered
//! concatenation for outbound requests and inbound callback
//! verification, see `infrastructure::trust::callback`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

use crate::domain::gateway::{
    GatewayCredentials, GatewayError, GatewayRequest, GatewayResponse, StoredMethodKind,
    TokenOrAccount,
};
use crate::domain::transaction::CardIndicators;

pub const FIELD_TRAN_TYPE: &str = "TRAN_TYPE";
pub const FIELD_CUST_NBR: &str = "CUST_NBR";
pub const FIELD_MERCH_NBR: &str = "MERCH_NBR";
pub const FIELD_DBA_NBR: &str = "DBA_NBR";
pub const FIELD_TERMINAL_NBR: &str = "TERMINAL_NBR";
pub const FIELD_AMOUNT: &str = "AMOUNT";
pub const FIELD_TRAN_NBR: &str = "TRAN_NBR";
pub const FIELD_BATCH_ID: &str = "BATCH_ID";
pub const FIELD_ORIG_AUTH_GUID: &str = "ORIG_AUTH_GUID";
pub const FIELD_ACCOUNT_NBR: &str = "ACCOUNT_NBR";
pub const FIELD_ROUTING_NBR: &str = "ROUTING_NBR";
pub const FIELD_EXP_DATE: &str = "EXP_DATE";
pub const FIELD_CVV2: &str = "CVV2";
pub const FIELD_ADDRESS: &str = "ADDRESS";
pub const FIELD_ZIP_CODE: &str = "ZIP_CODE";
pub const FIELD_STD_ENTRY_CLASS: &str = "STD_ENTRY_CLASS";
pub const FIELD_ACI_EXT: &str = "ACI_EXT";
pub const FIELD_CARD_ENT_METH: &str = "CARD_ENT_METH";
pub const FIELD_MAC: &str = "MAC";

pub const TYPE_SALE: &str = "CCE1";
pub const TYPE_AUTH: &str = "CCE2";
pub const TYPE_CAPTURE: &str = "CCE4";
pub const TYPE_REFUND: &str = "CCE9";
pub const TYPE_VOID: &str = "CCEX";
pub const TYPE_REVERSAL: &str = "CCE7";
pub const TYPE_CARD_STORAGE: &str = "CCE8";
pub const TYPE_ACH_STORAGE: &str = "CKC8";
pub const TYPE_ACH_PRENOTE_CHECKING: &str = "CKC0";
pub const TYPE_ACH_PRENOTE_SAVINGS: &str = "CKS0";
pub const TYPE_ACH_DEBIT: &str = "CKC1";
pub const TYPE_ACH_CREDIT: &str = "CKC4";

/// ASCII entry-class code for a standard ACH debit/credit (NACHA's
/// "PPD" — prearranged payment and deposit, the consumer-debit class
/// the gateway expects for this flow).
const STD_ENTRY_CLASS_PPD: &str = "PPD";

type HmacSha256 = Hmac<Sha256>;

/// Computes the outbound-request MAC over an ordered field list,
/// keyed by the merchant's MAC secret. Shared with callback
/// verification so both directions use one algorithm.
pub fn compute_mac(secret: &str, ordered_fields: &[(&str, &str)]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts a key of any length");
    for (name, value) in ordered_fields {
        mac.update(name.as_bytes());
        mac.update(b"=");
        mac.update(value.as_bytes());
        mac.update(b"&");
    }
    hex::encode(mac.finalize().into_bytes())
}

fn identity_fields(credentials: &GatewayCredentials) -> Vec<(&'static str, String)> {
    vec![
        (FIELD_CUST_NBR, credentials.customer_number.clone()),
        (FIELD_MERCH_NBR, credentials.merchant_number.clone()),
        (FIELD_DBA_NBR, credentials.dba_number.clone()),
        (FIELD_TERMINAL_NBR, credentials.terminal_number.clone()),
    ]
}

fn type_code_for(request: &GatewayRequest) -> Result<&'static str, GatewayError> {
    Ok(match request {
        GatewayRequest::Authorize { .. } => TYPE_AUTH,
        GatewayRequest::Capture { .. } => TYPE_CAPTURE,
        GatewayRequest::Sale { source, .. } => match source {
            TokenOrAccount::AchAccount { .. } => TYPE_ACH_DEBIT,
            TokenOrAccount::StorageToken {
                kind: StoredMethodKind::Ach,
                ..
            } => TYPE_ACH_DEBIT,
            TokenOrAccount::FinanceToken(_)
            | TokenOrAccount::StorageToken {
                kind: StoredMethodKind::Card,
                ..
            } => TYPE_SALE,
        },
        GatewayRequest::Void { .. } => TYPE_VOID,
        GatewayRequest::Refund { .. } => TYPE_REFUND,
        GatewayRequest::PreNote { account_type, .. } => match account_type {
            crate::domain::payment_method::AchAccountType::Checking => TYPE_ACH_PRENOTE_CHECKING,
            crate::domain::payment_method::AchAccountType::Savings => TYPE_ACH_PRENOTE_SAVINGS,
        },
        GatewayRequest::StorageToken { source, .. } => match source {
            TokenOrAccount::AchAccount { .. } => TYPE_ACH_STORAGE,
            TokenOrAccount::StorageToken { .. } => {
                return Err(GatewayError::InvalidRequest(
                    "cannot mint a storage token from an existing storage token".into(),
                ))
            }
            TokenOrAccount::FinanceToken(_) => TYPE_CARD_STORAGE,
        },
        GatewayRequest::Tokenization { .. } => {
            return Err(GatewayError::InvalidRequest(
                "tokenization requests use build_tokenization_form, not build_server_form".into(),
            ))
        }
    })
}

fn source_fields(source: &TokenOrAccount) -> Vec<(&'static str, String)> {
    match source {
        TokenOrAccount::FinanceToken(token) | TokenOrAccount::StorageToken { token, .. } => {
            vec![(FIELD_ACCOUNT_NBR, token.clone())]
        }
        TokenOrAccount::AchAccount {
            routing_nbr,
            account_nbr,
            ..
        } => vec![
            (FIELD_ROUTING_NBR, routing_nbr.clone()),
            (FIELD_ACCOUNT_NBR, account_nbr.clone()),
            (FIELD_STD_ENTRY_CLASS, STD_ENTRY_CLASS_PPD.to_string()),
        ],
    }
}

/// Assembles the ordered field list for every server-to-server request
/// except tokenization (handled separately: it returns an auth code,
/// not a settled response). Field order is also the MAC order.
pub fn build_server_form(
    credentials: &GatewayCredentials,
    request: &GatewayRequest,
) -> Result<Vec<(String, String)>, GatewayError> {
    let type_code = type_code_for(request)?;
    let mut fields: Vec<(&'static str, String)> =
        vec![(FIELD_TRAN_TYPE, type_code.to_string())];
    fields.extend(identity_fields(credentials));
    fields.push((FIELD_TRAN_NBR, request.tran_nbr().to_string()));

    match request {
        GatewayRequest::Authorize { amount, source, .. }
        | GatewayRequest::Sale { amount, source, .. } => {
            fields.push((FIELD_AMOUNT, amount.minor_units.to_string()));
            fields.extend(source_fields(source));
        }
        GatewayRequest::Capture {
            amount,
            orig_auth_guid,
            ..
        } => {
            fields.push((FIELD_AMOUNT, amount.minor_units.to_string()));
            fields.push((FIELD_ORIG_AUTH_GUID, orig_auth_guid.clone()));
        }
        GatewayRequest::Void { orig_auth_guid, .. } => {
            fields.push((FIELD_ORIG_AUTH_GUID, orig_auth_guid.clone()));
        }
        GatewayRequest::Refund {
            amount,
            orig_auth_guid,
            ..
        } => {
            fields.push((FIELD_AMOUNT, amount.minor_units.to_string()));
            fields.push((FIELD_ORIG_AUTH_GUID, orig_auth_guid.clone()));
        }
        GatewayRequest::PreNote {
            routing_nbr,
            account_nbr,
            ..
        } => {
            fields.push((FIELD_AMOUNT, "0".to_string()));
            fields.push((FIELD_ROUTING_NBR, routing_nbr.clone()));
            fields.push((FIELD_ACCOUNT_NBR, account_nbr.clone()));
            fields.push((FIELD_STD_ENTRY_CLASS, STD_ENTRY_CLASS_PPD.to_string()));
        }
        GatewayRequest::StorageToken { source, .. } => {
            fields.extend(source_fields(source));
        }
        GatewayRequest::Tokenization { .. } => unreachable!("filtered out by type_code_for"),
    }

    let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let mac = compute_mac(&credentials.mac_secret, &borrowed);
    let mut form: Vec<(String, String)> = fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    form.push((FIELD_MAC.to_string(), mac));
    Ok(form)
}

/// Assembles the ordered field list for a tokenization request (spec
/// §4.3: "requires the four merchant identifiers, the MAC secret,
/// amount, transaction number, group id, and return URL(s)").
pub fn build_tokenization_form(
    credentials: &GatewayCredentials,
    tran_nbr: &str,
    amount: &common::Money,
    group_id: &str,
    return_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let mut fields: Vec<(&'static str, String)> = identity_fields(credentials);
    fields.push((FIELD_TRAN_NBR, tran_nbr.to_string()));
    fields.push((FIELD_AMOUNT, amount.minor_units.to_string()));
    fields.push((FIELD_BATCH_ID, group_id.to_string()));
    fields.push(("RETURN_URL", return_url.to_string()));
    fields.push(("CANCEL_URL", cancel_url.to_string()));

    let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let mac = compute_mac(&credentials.mac_secret, &borrowed);
    let mut form: Vec<(String, String)> = fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    form.push((FIELD_MAC.to_string(), mac));
    form
}

/// Parses a settled gateway response body (form-encoded, same field
/// names as the request) into the domain response shape. Declines are
/// surfaced as `Ok` with a non-"00" code, never as `GatewayError`: per
/// spec §7, a decline is a business outcome determined strictly by the
/// response code, not a transport failure.
pub fn parse_server_response(fields: HashMap<String, String>) -> GatewayResponse {
    let response_code = fields.get("RESP_CODE").cloned().unwrap_or_default();
    let response_text = fields.get("RESP_TEXT").cloned().unwrap_or_default();
    let gateway_token = fields.get("TOKEN").cloned();
    let authorization_code = fields.get("AUTH_CODE").cloned();
    let network_transaction_id = fields.get("NETWORK_TRAN_ID").cloned();
    let card_indicators = CardIndicators {
        card_brand: fields.get("CARD_BRAND").cloned(),
        avs_result: fields.get("AVS_RESULT").cloned(),
        cvv_result: fields.get("CVV_RESULT").cloned(),
    };

    GatewayResponse {
        gateway_token,
        response_code,
        response_text,
        authorization_code,
        network_transaction_id,
        card_indicators,
        raw_payload: fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment_method::AchAccountType;
    use common::Money;

    fn credentials() -> GatewayCredentials {
        GatewayCredentials {
            customer_number: "1".into(),
            merchant_number: "2".into(),
            dba_number: "3".into(),
            terminal_number: "4".into(),
            mac_secret: "s3cr3t".into(),
        }
    }

    #[test]
    fn sale_via_finance_token_uses_cce1() {
        let request = GatewayRequest::Sale {
            tran_nbr: "123".into(),
            amount: Money::new(500, "USD").unwrap(),
            source: TokenOrAccount::FinanceToken("tok_abc".into()),
        };
        let form = build_server_form(&credentials(), &request).unwrap();
        let tran_type = form.iter().find(|(k, _)| k == FIELD_TRAN_TYPE).unwrap();
        assert_eq!(tran_type.1, TYPE_SALE);
    }

    #[test]
    fn sale_via_ach_account_uses_ckc1() {
        let request = GatewayRequest::Sale {
            tran_nbr: "123".into(),
            amount: Money::new(500, "USD").unwrap(),
            source: TokenOrAccount::AchAccount {
                routing_nbr: "routing".into(),
                account_nbr: "account".into(),
                account_type: AchAccountType::Checking,
            },
        };
        let form = build_server_form(&credentials(), &request).unwrap();
        let tran_type = form.iter().find(|(k, _)| k == FIELD_TRAN_TYPE).unwrap();
        assert_eq!(tran_type.1, TYPE_ACH_DEBIT);
    }

    #[test]
    fn prenote_savings_uses_cks0() {
        let request = GatewayRequest::PreNote {
            tran_nbr: "123".into(),
            routing_nbr: "routing".into(),
            account_nbr: "account".into(),
            account_type: AchAccountType::Savings,
        };
        let form = build_server_form(&credentials(), &request).unwrap();
        let tran_type = form.iter().find(|(k, _)| k == FIELD_TRAN_TYPE).unwrap();
        assert_eq!(tran_type.1, TYPE_ACH_PRENOTE_SAVINGS);
        let amount = form.iter().find(|(k, _)| k == FIELD_AMOUNT).unwrap();
        assert_eq!(amount.1, "0");
    }

    #[test]
    fn mac_is_deterministic_for_same_fields() {
        let fields = [("A", "1"), ("B", "2")];
        assert_eq!(compute_mac("secret", &fields), compute_mac("secret", &fields));
    }

    #[test]
    fn mac_differs_when_a_field_value_changes() {
        let a = [("A", "1"), ("B", "2")];
        let b = [("A", "1"), ("B", "3")];
        assert_ne!(compute_mac("secret", &a), compute_mac("secret", &b));
    }

    #[test]
    fn parse_server_response_approved() {
        let mut fields = HashMap::new();
        fields.insert("RESP_CODE".to_string(), "00".to_string());
        fields.insert("RESP_TEXT".to_string(), "Approved".to_string());
        fields.insert("TOKEN".to_string(), "tok_1".to_string());
        let response = parse_server_response(fields);
        assert!(response.is_approved());
        assert_eq!(response.gateway_token.as_deref(), Some("tok_1"));
    }
}
