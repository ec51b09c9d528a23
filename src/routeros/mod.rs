pub mod client;
pub mod types;

pub use client::{RouterApi, RouterClient, UnreachableRouter};
pub use types::{InterfaceStatus, IpAddressEntry};
