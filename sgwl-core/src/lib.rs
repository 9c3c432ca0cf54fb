//! sg-whitelist Core
//!
//! Core library for keeping a security group ingress rule in sync with the
//! caller's public IP address

pub mod config;
pub mod ip;
pub mod provider;
pub mod rule;
pub mod sync;
