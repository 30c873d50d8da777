mod dispatcher;
mod guard;
mod machine;
mod outbox;
mod scheduler;
mod store;
mod transport;

pub use dispatcher::*;
pub use guard::*;
pub use machine::*;
pub use outbox::*;
pub use scheduler::*;
pub use store::*;
pub use transport::*;
