#![deny(
    clippy::all,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    unsafe_code,
    unused
)]
#![doc = include_str!("../README.md")]

pub use corvid_gateway as gateway;
pub use corvid_gateway_queue as gateway_queue;
pub use corvid_http as http;
pub use corvid_http_ratelimiting as http_ratelimiting;
