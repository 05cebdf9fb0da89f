//! Wire types and formatters shared by every stage of the check-execution
//! pipeline: transports, scheduler, executor, worker pool and result
//! formatters all depend on this crate instead of on each other.

pub mod catalog;
pub mod error;
pub mod formats;
pub mod types;

pub use catalog::parse_catalog;
pub use error::ProtocolError;
pub use formats::{build_keepalive, to_client_result, to_smart_gateway_result, SmartGatewayResult};
pub use types::{
    Amqp1Message, CheckCatalogEntry, CheckRequest, CheckResult, ClientResult, Keepalive,
    ResultsFormat, Severity, AGENT_VERSION, EXIT_CODE_FAILURE, EXIT_CODE_SUCCESS,
    EXIT_CODE_WARNING,
};
