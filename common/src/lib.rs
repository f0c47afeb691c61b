//! Shared, infrastructure-agnostic primitives used by the orchestrator
//! service: newtype identifiers, a minor-units money type, and the
//! gateway transaction-number derivation that both the gateway adapter
//! and its tests need to agree on.

pub mod ids;
pub mod money;
pub mod tran_nbr;

pub use ids::*;
pub use money::Money;
pub use tran_nbr::tran_nbr_from_uuid;
