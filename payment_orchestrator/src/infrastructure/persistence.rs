//! Concrete Postgres repositories (C1), one module per aggregate,
//! grounded on the teacher's `PostgresTransactionRepository` /
//! `PostgresWalletRepository` pattern: a bare `sqlx::query_as` call per
//! method, a `FromRow` persistence model distinct from the domain
//! entity, and `TryFrom`/`From` conversions between the two.

pub mod models;

pub mod audit_repository;
pub mod merchant_repository;
pub mod payment_method_repository;
pub mod rate_limit_repository;
pub mod service_repository;
pub mod subscription_repository;
pub mod transaction_repository;
pub mod trust_repository;

pub use audit_repository::PostgresAuditRepository;
pub use merchant_repository::PostgresMerchantRepository;
pub use payment_method_repository::PostgresPaymentMethodRepository;
pub use rate_limit_repository::PostgresRateLimitRepository;
pub use service_repository::PostgresServiceRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use transaction_repository::PostgresTransactionRepository;
pub use trust_repository::PostgresTrustRepository;
