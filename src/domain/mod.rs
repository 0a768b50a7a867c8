pub mod message;
pub mod notification;
pub mod quote;

pub use message::*;
pub use notification::*;
pub use quote::*;
