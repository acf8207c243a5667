//! Integration test utilities for the client
//!
//! This crate provides in-process fakes of the REST API and the WebSocket gateway so the
//! requester, the shards and the client facade can be driven end to end.

pub mod gateway;
pub mod helpers;
pub mod rest;

pub use gateway::{ConnectionPlan, FakeGateway, Received};
pub use helpers::*;
pub use rest::{FakeResponse, FakeRestServer, RecordedRequest};
