//! Identity types shared between the gateway and Croft services.
//!
//! The gateway terminates the user session and forwards the authenticated
//! identity as plain headers; services only ever see those headers.

pub mod identity;
