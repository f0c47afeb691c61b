//! RPC surface + callback receiver (C9, spec §4.9, §6). `router`
//! assembles the `axum::Router` and holds `AppState`; each other module
//! is one handler group — one file per RPC aggregate, plus the
//! browser-post callback receiver and the cron/health endpoints that
//! aren't part of the typed RPC surface proper.

pub mod auth;
pub mod callback;
pub mod cron;
pub mod dto;
pub mod error;
pub mod health;
pub mod merchants;
pub mod payment_methods;
pub mod router;
pub mod services;
pub mod subscriptions;
pub mod transactions;
