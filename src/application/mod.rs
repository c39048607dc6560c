//! Application layer containing the settlement orchestration.
//!
//! [`payments::PaymentProcessor`] is the entry point for every payment. It feeds the
//! cycle [`ledger`], hands whole cycles to the [`settlement`] orchestrator, which in
//! turn issues the device code and records [`commission`]s, all inside one unit of
//! work per payment.

pub mod commission;
pub mod ledger;
pub mod payments;
pub mod schedule;
pub mod settlement;
pub mod webhook;
