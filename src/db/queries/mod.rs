//! Database queries

pub mod contact;
pub mod delivery_log;
pub mod group;
pub mod participant;
pub mod template;
pub mod ticket;
