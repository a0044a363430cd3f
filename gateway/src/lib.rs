#![deny(
    clippy::all,
    clippy::missing_const_for_fn,
    clippy::pedantic,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    unsafe_code,
    unused
)]
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]
#![doc = include_str!("../README.md")]

pub mod callback;
pub mod client;
pub mod error;
pub mod intents;
pub mod opcode;
pub mod shard;
pub mod status;

mod close_code;

pub use self::{
    callback::{Direction, DispatchCallback, ShardInfo, StatusCallback},
    client::{GatewayClient, GatewayClientBuilder, SpawnError},
    error::GatewayCriticalError,
    intents::Intents,
    opcode::Opcode,
    shard::Shard,
    status::ShardStatus,
};

pub use corvid_gateway_queue as queue;
