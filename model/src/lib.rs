/*!

This library provides the run configuration for a sonobuoy conformance run, the plugin manifest
transforms applied to sonobuoy's generated manifest, and a client that generates, checks and runs
that manifest against a cluster.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use client::{ConformanceClient, Connector, SonobuoyClient, SonobuoyConnector};
pub use config::{
    AggregationConfig, Config, FilterOptions, GenConfig, LimitConfig, PluginSelection,
    PodLogLimits, PreflightConfig, RunConfig, WaitOutput,
};
pub use error::{Error, Result};
pub use manifest::{GeneratedManifest, PluginConfig, PluginManifest};
pub use transform::{configure_docker_library_registry, PluginTransforms, Transform};

pub mod client;
mod config;
pub mod constants;
mod error;
mod manifest;
pub mod transform;
