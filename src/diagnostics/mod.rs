//! Diagnostics facilities: the bounded, throttled log of failed requests.

pub mod error_log;
