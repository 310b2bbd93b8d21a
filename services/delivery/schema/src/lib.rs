//! sea-orm entities for the delivery service.
//!
//! `tasks` and `sync_accounts` are owned by this service (see the migration
//! crate). `customers`, `hosting_services` and `invoices` are read-only
//! projections of CRM-owned tables — never write through them here.

pub mod customers;
pub mod hosting_services;
pub mod invoices;
pub mod sync_accounts;
pub mod tasks;
