//! Host port allocation for declared container ports.
//!
//! Both task registration and template compilation need to agree on which
//! host port each container port is published on, so the scheme lives
//! behind a single [`PortAllocator`].

use serde::{Deserialize, Serialize};

use crate::error::{ReleaseError, ReleaseResult};

/// Default first host port handed out by [`FixedBasePorts`].
pub const DEFAULT_BASE_PORT: u16 = 8000;

/// A container port published on a host port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Port the container listens on.
    pub container_port: u16,
    /// Port published on the host.
    pub host_port: u16,
}

/// Strategy for assigning host ports to a process's declared ports.
pub trait PortAllocator: Send + Sync {
    /// Bind each declared port, in order.
    ///
    /// Either every port gets a host port or the call fails.
    fn bind(&self, ports: &[u16]) -> ReleaseResult<Vec<PortBinding>>;
}

/// Assigns host ports sequentially from a fixed base.
///
/// Every process starts again at the base, so two processes placed on the
/// same host that both declare ports will collide. A process declaring more
/// ports than fit between the base and `u16::MAX` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBasePorts {
    base: u16,
}

impl FixedBasePorts {
    /// Create an allocator starting at `base`.
    #[must_use]
    pub const fn new(base: u16) -> Self {
        Self { base }
    }
}

impl Default for FixedBasePorts {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PORT)
    }
}

impl PortAllocator for FixedBasePorts {
    fn bind(&self, ports: &[u16]) -> ReleaseResult<Vec<PortBinding>> {
        let bindings: Vec<_> = ports
            .iter()
            .zip(self.base..=u16::MAX)
            .map(|(&container_port, host_port)| PortBinding {
                container_port,
                host_port,
            })
            .collect();

        if bindings.len() < ports.len() {
            return Err(ReleaseError::validation(format!(
                "{} ports do not fit in the host range starting at {}",
                ports.len(),
                self.base
            )));
        }

        Ok(bindings)
    }
}
