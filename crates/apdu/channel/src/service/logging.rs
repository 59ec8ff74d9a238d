//! Diagnostic logging service

use tracing::{Level, debug, info, warn};

use super::{ApduService, ServiceType};
use crate::command::ApduCommand;
use crate::response::ApduResponse;
use crate::Result;

/// Logs every command and response passing through the pipeline
///
/// Responses are logged at the level suggested by their status word.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingService;

impl LoggingService {
    /// Create a new logging service
    pub const fn new() -> Self {
        Self
    }
}

impl ApduService for LoggingService {
    fn service_type(&self) -> ServiceType {
        ServiceType::LOGGING
    }

    fn process_command(&self, command: ApduCommand) -> Result<ApduCommand> {
        debug!(
            command = %command,
            case = %command.case(),
            extended = command.is_extended(),
            channel = command.logical_channel(),
            "Sending APDU"
        );
        Ok(command)
    }

    fn process_response(&self, response: ApduResponse) -> Result<ApduResponse> {
        let status = response.status();
        let execution_ms = response.execution_time().as_millis() as u64;
        let level = status.tracing_level();

        if level == Level::DEBUG {
            debug!(response = %response, sw = %status, execution_ms, "Received APDU response");
        } else if level == Level::INFO {
            info!(
                response = %response,
                sw = %status,
                description = status.description(),
                "Received APDU response with warning"
            );
        } else {
            warn!(
                response = %response,
                sw = %status,
                description = status.description(),
                "Received APDU error response"
            );
        }

        Ok(response)
    }
}
