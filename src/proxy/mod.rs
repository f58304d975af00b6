//! Proxy module for parsing and validating proxies
//!
//! This module provides functionality for:
//! - Parsing proxy descriptors written in several notations
//! - Probing a proxy with a single test request
//! - Validating whole lists on a bounded worker pool
//! - Writing valid and invalid proxies to separate sinks

pub mod checker;
pub mod engine;
pub mod models;
pub mod parser;
pub mod sink;

pub use checker::{probe, CheckerConfig, ProbeResponse, ProbeTransport, ProxyChecker, ReqwestTransport};
pub use engine::{event_channel, CancelToken, EventReceiver, EventSender, RunEvent, RunState, ValidationEngine};
pub use models::{ProbeOutcome, Proxy, ProxyAuth, ProxyCheckResult, ProxyType};
pub use parser::ProxyParser;
pub use sink::{FileSink, MemorySink, OutputMode, ResultSink};
