//! httpmsg - immutable HTTP message value objects
//!
//! This crate models HTTP requests, responses, URIs, body streams and
//! uploaded files as immutable values, and derives them from CGI-style
//! server environments.

pub mod http;
