//! Type definitions

pub mod contact;
pub mod delivery;
pub mod dispatch;
pub mod group;
pub mod messages;
pub mod template;
pub mod ticket;

pub use contact::*;
pub use delivery::*;
pub use dispatch::*;
pub use group::*;
pub use messages::*;
pub use template::*;
pub use ticket::*;
