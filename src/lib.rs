//! Fetch JSON from an url, look at what came back and keep every response
//! as a timestamped snapshot on disk, organised by host and path.
//!
//! The pieces can be used on their own ([`request_parser`],
//! [`http_request_executor`], [`response_validator`], [`response_store`]) or
//! wired together through [`execute::RequestPipeline`].

pub mod config;
pub mod errors;
pub mod execute;
pub mod highlight;
pub mod http_request;
pub mod http_request_executor;
pub mod logger;
pub mod logging;
pub mod request_parser;
pub mod response_store;
pub mod response_validator;
pub mod url_rewrite;
