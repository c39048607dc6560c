//! Domain layer: the PAYG entities, money value objects and the ports the
//! application layer talks to.

pub mod device;
pub mod loan;
pub mod money;
pub mod party;
pub mod payment;
pub mod ports;
