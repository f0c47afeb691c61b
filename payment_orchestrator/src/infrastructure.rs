pub mod credential_cache;
pub mod gateway_adapter;
pub mod persistence;
pub mod secret_store;
pub mod storage;
pub mod trust;
