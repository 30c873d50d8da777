mod envelope;
mod error;
mod event;
mod message;
mod order;

pub use envelope::*;
pub use error::*;
pub use event::*;
pub use message::*;
pub use order::*;
