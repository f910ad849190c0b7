//! OData module
//!
//! Data-retrieval driver that consumes the authenticating client factory

pub mod client;

pub use client::{ODataClient, ODataError, ODataResponse, QueryOptions};
