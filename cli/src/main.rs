/*!

This is the command line interface for generating a sonobuoy conformance manifest and running it
against a Kubernetes cluster.

!*/

mod dispatch;
mod error;

use clap::Parser;
use conformance_model::{SonobuoyConnector, WaitOutput};
use dispatch::{Options, Output};
use env_logger::Builder;
use error::Error;
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Generate or run the sonobuoy Kubernetes conformance tests.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[arg(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    /// Path to the kubeconfig file. If absent, the KUBECONFIG environment variable, the default
    /// kubeconfig and the in-cluster service account are tried in that order.
    #[arg(long = "kubeconfig")]
    kubeconfig: Option<PathBuf>,
    /// A YAML file overriding fields of the default run configuration.
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Path to the sonobuoy executable.
    #[arg(long = "sonobuoy-path", env = "SONOBUOY_PATH", default_value = "sonobuoy")]
    sonobuoy_path: PathBuf,
    /// Do not run the preflight checks before `run`.
    #[arg(long = "skip-preflight")]
    skip_preflight: bool,
    /// Seconds to wait for `run` to complete. 0 returns as soon as sonobuoy has been started.
    #[arg(long = "wait", default_value_t = 0)]
    wait: u64,
    /// How to report progress while waiting [silent|progress].
    #[arg(long = "wait-output", default_value = "silent")]
    wait_output: WaitOutput,
    /// `gen` prints the manifest, `run` starts sonobuoy in the cluster.
    action: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version requests are not errors.
            if !e.use_stderr() {
                e.exit()
            }
            let _ = e.print();
            std::process::exit(1);
        }
    };
    init_logger(args.log_level);
    match run(args).await {
        Ok(Output::Manifest(manifest)) => println!("{}", manifest),
        Ok(Output::Submitted) => {}
        Err(e) => {
            let _ = report(&mut std::io::stderr(), &e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> error::Result<Output> {
    let connector = SonobuoyConnector::new(args.kubeconfig, args.sonobuoy_path);
    let options = Options {
        config_path: args.config,
        skip_preflight: args.skip_preflight,
        wait: (args.wait > 0).then(|| Duration::from_secs(args.wait)),
        wait_output: args.wait_output,
    };
    dispatch::dispatch(args.action.as_deref(), &connector, options).await
}

/// Write the fatal error to `out`. This does not go through the logger so that a `RUST_LOG`
/// filter cannot hide why the process failed.
fn report<W>(out: &mut W, e: &Error) -> std::io::Result<()>
where
    W: Write,
{
    writeln!(out, "{}", e)?;
    if let Error::Preflight { errors } = e {
        for preflight_error in errors {
            writeln!(out, "  {}", preflight_error)?;
        }
    }
    Ok(())
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate and its library.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("conformance_model"), level)
                .init();
        }
    }
}
