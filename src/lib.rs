#![deny(unsafe_code)]
//#![deny(warnings)]
#![deny(unused_must_use)]
#![deny(unexpected_cfgs)]

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod logging;
pub mod management;
pub mod metrics;
pub mod request_metrics;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;
