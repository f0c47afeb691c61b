//! Payment Orchestrator Service Library
//!
//! Fronts the card/ACH acquiring gateway and exposes a typed RPC surface
//! to trusted caller services. Organized as nine cooperating components
//! (storage, secret store, credential cache, gateway adapter, trust
//! layer, transaction engine, payment-method engine, subscription
//! engine, RPC surface) spread across the usual clean-architecture
//! layers below.
//!
//! # Modules
//!
//! * `api` - HTTP RPC surface, callback receiver, cron endpoints.
//! * `config` - environment-driven process configuration.
//! * `domain` - entities, error taxonomy, repository/gateway/secret-store ports.
//! * `infrastructure` - concrete persistence, gateway, trust, and caching adapters.
//! * `jobs` - background sweepers (billing, ACH verification, audit cleanup, JWT blacklist cleanup).
//! * `use_cases` - application business logic.

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod jobs;
pub mod use_cases;
