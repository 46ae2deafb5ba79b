use thiserror::Error;

/// Errors surfaced by the driver core and its host collaborators.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The host memory budget could not satisfy an allocation.
    #[error("out of memory")]
    OutOfMemory,

    /// The input subsystem rejected device registration.
    #[error("input device registration failed")]
    RegistrationFailed,

    /// The bus subsystem rejected the driver's registration.
    #[error("bus driver registration failed")]
    BusRegistrationFailed,

    /// The operation is not supported on this surface.
    #[error("operation not supported")]
    InvalidOperation,

    /// No device or context exists for the given handle.
    #[error("no such device")]
    NoSuchDevice,

    /// The driver configuration could not be parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] toml::de::Error),
}
