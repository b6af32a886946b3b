use snafu::Snafu;

/// The crate-wide result type.
pub(crate) type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type. Every variant ends the process with exit code 1.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("no argument given, try 'gen' or 'run'"))]
    Usage,

    #[snafu(display("argument '{}' is not supported", argument))]
    Unsupported { argument: String },

    #[snafu(display("unable to load configuration: {}", source))]
    Config { source: conformance_model::Error },

    #[snafu(display("Error getting Kubernetes config: \"{}\"", source))]
    Credentials { source: conformance_model::Error },

    #[snafu(display("could not create sonobuoy client: {}", source))]
    ClientCreate { source: conformance_model::Error },

    #[snafu(display("Preflight checks failed"))]
    Preflight {
        errors: Vec<conformance_model::Error>,
    },

    #[snafu(display("error attempting to generate sonobuoy manifest: {}", source))]
    Generate { source: conformance_model::Error },

    #[snafu(display("error attempting to run sonobuoy: {}", source))]
    Run { source: conformance_model::Error },
}
