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

pub mod client;
pub mod error;
pub mod file;
pub mod response;
pub mod routing;

mod json;
mod request;

pub use self::{
    client::{Client, ClientBuilder, ResponseCallback, ResponseInfo, API_VERSION},
    error::{Error, Result},
    file::File,
    response::Response,
    routing::Route,
};

pub use corvid_http_ratelimiting as ratelimiting;
