//! Business logic services

pub mod delivery_log;
pub mod dispatcher;
pub mod email_sender;
pub mod markup;
pub mod recipients;
pub mod resend_guard;
pub mod variables;
