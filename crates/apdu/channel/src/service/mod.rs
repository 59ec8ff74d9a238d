//! Service pipeline
//!
//! Services are cross-cutting stages that see every command before it is
//! sent and every response after it is received. Commands pass through the
//! registered services in reverse registration order, responses in
//! registration order, so the first registered service is the innermost:
//! last to touch a command, first to see its response.

pub mod logging;
pub mod logical_channel;

use std::fmt;
use std::ops::BitOr;

use crate::command::ApduCommand;
use crate::response::ApduResponse;
use crate::Result;

pub use logging::LoggingService;
pub use logical_channel::LogicalChannelService;

/// Bitmask tag identifying the kind of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceType(u32);

impl ServiceType {
    /// Diagnostics only, never changes traffic
    pub const LOGGING: Self = Self(1);
    /// Stamps the logical channel into the class byte
    pub const LOGICAL_CHANNEL: Self = Self(1 << 1);
    /// Wraps and unwraps secure messaging
    pub const SECURE_MESSAGING: Self = Self(1 << 2);
    /// Every service type
    pub const ALL: Self = Self(u32::MAX);
    /// No service type
    pub const NONE: Self = Self(0);

    /// Create a service type from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `self` is present in `mask`
    pub const fn is_included_in(self, mask: Self) -> bool {
        (self.0 | mask.0) == mask.0
    }
}

impl BitOr for ServiceType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Trait for command/response pipeline stages
pub trait ApduService: Send + Sync + fmt::Debug {
    /// Kind of this service, matched against the dispatch mask
    fn service_type(&self) -> ServiceType;

    /// Transform an outgoing command
    fn process_command(&self, command: ApduCommand) -> Result<ApduCommand>;

    /// Transform an incoming response
    fn process_response(&self, response: ApduResponse) -> Result<ApduResponse>;
}

/// Ordered list of services
#[derive(Default)]
pub struct ServicePipeline {
    services: Vec<Box<dyn ApduService>>,
}

impl fmt::Debug for ServicePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePipeline")
            .field("services", &self.services)
            .finish()
    }
}

impl ServicePipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a service
    pub fn add_service(&mut self, service: Box<dyn ApduService>) -> &mut Self {
        self.services.push(service);
        self
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is registered
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Run the command pass, last registered service first
    pub fn process_command(&self, mask: ServiceType, command: ApduCommand) -> Result<ApduCommand> {
        self.services
            .iter()
            .rev()
            .filter(|service| service.service_type().is_included_in(mask))
            .try_fold(command, |command, service| service.process_command(command))
    }

    /// Run the response pass, first registered service first
    pub fn process_response(
        &self,
        mask: ServiceType,
        response: ApduResponse,
    ) -> Result<ApduResponse> {
        self.services
            .iter()
            .filter(|service| service.service_type().is_included_in(mask))
            .try_fold(response, |response, service| {
                service.process_response(response)
            })
    }
}
