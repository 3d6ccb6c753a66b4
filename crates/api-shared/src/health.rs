use crate::wire::HealthRes;

/// Liveness check shared by the REST server and CLI.
///
/// This only reports that the process is up; repository reachability is reported separately
/// by the data-source health endpoint.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    ///
    /// # Returns
    /// A new `HealthService` instance.
    pub fn new() -> Self {
        Self
    }

    /// Static method to check liveness without creating an instance.
    ///
    /// # Returns
    /// A `HealthRes` with `ok` set and a fixed message.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "clinq is alive".into(),
        }
    }
}
