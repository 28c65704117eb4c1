use stripe_tools::StripeApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not initialize the worker. {0}")]
    InitializeError(String),
    #[error("Could not bring the database schema up to date. {0}")]
    MigrationError(String),
    #[error("Could not set up the payment gateway client. {0}")]
    GatewayError(#[from] StripeApiError),
    #[error("An I/O error happened in the worker. {0}")]
    IOError(#[from] std::io::Error),
}
