mod boot;
mod demo;

pub use boot::*;
pub use demo::*;
