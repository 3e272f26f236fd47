#![warn(missing_docs)]
//! # Structured logging for kitsune promise code
//!
//! ## Usage
//! Filter on what you want through `RUST_LOG`:
//! ```bash
//! RUST_LOG='kitsune_p2p_promise=trace' cargo test
//! ```
//! `CUSTOM_FILTER` replaces the whole filter when set and parseable:
//! ```bash
//! CUSTOM_FILTER='[{handlers}]=debug' cargo test
//! ```
//! The [Output] variant is passed into the [init_fmt] function on start up.
//! Tests call [test_run] first, which does nothing unless `RUST_LOG` is set.

use tracing_subscriber::{
    filter::EnvFilter, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, Layer,
    Registry,
};

use derive_more::Display;
use std::str::FromStr;

pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
/// Sets the kind of structured logging output you want
pub enum Output {
    /// More compact version of Log
    Compact,
    /// Outputs everything as json
    Json,
    /// Regular logging (default)
    Log,
    /// No logging to console
    None,
}

/// ParseError is a String
pub type ParseError = String;

impl FromStr for Output {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Json" => Ok(Output::Json),
            "Log" => Ok(Output::Log),
            "Compact" => Ok(Output::Compact),
            "None" => Ok(Output::None),
            _ => Err("Could not parse log output type".into()),
        }
    }
}

/// Run logging in a unit test.
///
/// RUST_LOG must be set or this is a no-op.
/// Safe to call from every test: only the first call installs a subscriber.
pub fn test_run() -> Result<(), errors::TracingError> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }

    match init_fmt(Output::Log) {
        Err(errors::TracingError::SetGlobal(_)) => Ok(()),
        r => r,
    }
}

/// Build the canonical filter based on env
pub fn standard_filter() -> Result<EnvFilter, errors::TracingError> {
    let mut filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::from_default_env().add_directive("kitsune_p2p_promise=warn".parse()?),
    };
    if std::env::var("CUSTOM_FILTER").is_ok() {
        EnvFilter::try_from_env("CUSTOM_FILTER")
            .map_err(|e| eprintln!("Failed to parse CUSTOM_FILTER {:?}", e))
            .map(|f| {
                filter = f;
            })
            .ok();
    }
    Ok(filter)
}

/// This checks RUST_LOG for a filter but doesn't complain if there is none or it doesn't parse.
/// It then checks for CUSTOM_FILTER which if set will output an error if it doesn't parse.
pub fn init_fmt(output: Output) -> Result<(), errors::TracingError> {
    let filter = standard_filter()?;
    let layer = tracing_subscriber::fmt::Layer::default()
        .with_test_writer()
        .with_file(true)
        .with_line_number(true)
        .with_target(true);

    match output {
        Output::Json => Registry::default()
            .with(
                layer
                    .with_timer(UtcTime::rfc_3339())
                    .json()
                    .with_filter(filter),
            )
            .try_init()?,
        Output::Log => Registry::default().with(layer.with_filter(filter)).try_init()?,
        Output::Compact => Registry::default()
            .with(layer.compact().with_filter(filter))
            .try_init()?,
        Output::None => (),
    };
    Ok(())
}

pub mod errors {
    //! Error in the tracing/logging framework

    use thiserror::Error;

    /// Error in the tracing/logging framework
    #[allow(missing_docs)] // should be self-explanatory
    #[derive(Error, Debug)]
    pub enum TracingError {
        #[error(transparent)]
        SetGlobal(#[from] tracing_subscriber::util::TryInitError),
        #[error(transparent)]
        BadDirective(#[from] tracing_subscriber::filter::ParseError),
    }
}
