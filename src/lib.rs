pub mod adapter;
pub mod domain;
pub mod port;
pub mod service;
