mod consumer;
mod store;
mod transport;

pub use consumer::*;
pub use store::*;
pub use transport::*;
