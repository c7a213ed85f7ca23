//! Application layer containing the core business logic orchestration.
//!
//! The [`settlement::SettlementEngine`] owns the race between settlement
//! pathways; [`service::OrderService`], [`registry::MerchantRegistry`] and
//! [`auth::AuthGate`] are the surfaces boundary code drives directly.

pub mod auth;
pub mod registry;
pub mod service;
pub mod settlement;
