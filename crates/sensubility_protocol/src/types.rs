//! Core data model shared by every check-execution stage: ingress (transports,
//! scheduler), execution (executor, worker pool) and egress (formatters,
//! publishers).

use serde::{Deserialize, Serialize};

/// Exit status constants for [`CheckResult::status`]. Any value other than
/// these two is still valid — non-zero exit codes pass through verbatim.
pub const EXIT_CODE_SUCCESS: i32 = 0;
pub const EXIT_CODE_WARNING: i32 = 1;
pub const EXIT_CODE_FAILURE: i32 = 2;

/// A request to run a named command, produced by a transport (decoded from a
/// broker message) or by the [scheduler](crate) (synthesized from the catalog
/// plus the current time). Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub command: String,
    pub name: String,
    pub issued: i64,
}

/// The outcome of executing a [`CheckRequest`]. Owned by the executor; never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub command: String,
    pub name: String,
    pub issued: i64,
    pub executed: i64,
    pub duration: f64,
    pub output: String,
    pub status: i32,
}

impl CheckResult {
    /// Pure function of `status`, used by both the native and Smart-Gateway
    /// formatters (spec.md §8 property 4).
    pub fn severity(&self) -> Severity {
        Severity::from_status(self.status)
    }
}

/// Severity as derived from [`CheckResult::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Okay,
    Warning,
    Failure,
}

impl Severity {
    pub fn from_status(status: i32) -> Self {
        match status {
            EXIT_CODE_SUCCESS => Severity::Okay,
            EXIT_CODE_WARNING => Severity::Warning,
            _ => Severity::Failure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Okay => "OKAY",
            Severity::Warning => "WARNING",
            Severity::Failure => "FAILURE",
        }
    }
}

/// Publish unit on the Sensu transport: pairs a [`CheckResult`] with the
/// configured client name. Serializes as the native Sensu envelope
/// `{"client": ..., "check": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientResult {
    pub client: String,
    pub check: CheckResult,
}

/// A periodic liveness beacon. `version` is a string literal identifying this
/// agent, not a semver of the broker protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keepalive {
    pub name: String,
    pub address: String,
    pub subscriptions: Vec<String>,
    pub version: String,
    pub timestamp: i64,
}

/// The string literal reported as [`Keepalive::version`].
pub const AGENT_VERSION: &str = "collectd-sensubility-rs";

/// One entry of the check catalog, parsed once from the `[sensu] checks` JSON
/// blob at startup. `subscribers` is round-tripped but unused by the core
/// (spec.md §3); `ttl` and `ttl_status` are kept as distinct fields even
/// though the original never enforces either (matches
/// `original_source/sensu/scheduler.go`'s `Check` struct field-for-field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckCatalogEntry {
    pub command: String,
    #[serde(default)]
    pub subscribers: Vec<String>,
    pub interval: i64,
    #[serde(default)]
    pub timeout: i64,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub ttl_status: i32,
    #[serde(default)]
    pub occurrences: i64,
    #[serde(default)]
    pub refresh: i64,
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A message ready to be handed to the AMQP 1.0 transport: an address (so a
/// single link may fan to multiple addresses) plus a serialized body.
#[derive(Debug, Clone, PartialEq)]
pub struct Amqp1Message {
    pub address: String,
    pub body: String,
}

/// Which envelope the AMQP1 transport should serialize results into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultsFormat {
    #[default]
    SmartGateway,
    Sensu,
}

impl ResultsFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "smartgateway" => Some(Self::SmartGateway),
            "sensu" => Some(Self::Sensu),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_pure_function_of_status() {
        assert_eq!(Severity::from_status(0), Severity::Okay);
        assert_eq!(Severity::from_status(1), Severity::Warning);
        assert_eq!(Severity::from_status(2), Severity::Failure);
        assert_eq!(Severity::from_status(127), Severity::Failure);
        assert_eq!(Severity::from_status(-1), Severity::Failure);
    }

    #[test]
    fn client_result_serializes_as_native_envelope() {
        let cr = ClientResult {
            client: "host1".into(),
            check: CheckResult {
                command: "exit 0".into(),
                name: "ok".into(),
                issued: 1,
                executed: 2,
                duration: 0.01,
                output: String::new(),
                status: 0,
            },
        };
        let v = serde_json::to_value(&cr).unwrap();
        assert_eq!(v["client"], "host1");
        assert_eq!(v["check"]["name"], "ok");
    }

    #[test]
    fn check_request_roundtrips_inbound_wire_shape() {
        let body = r#"{"command":"echo hi","name":"hi-check","issued":1700000000}"#;
        let req: CheckRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.name, "hi-check");
        assert_eq!(req.issued, 1700000000);
    }

    #[test]
    fn results_format_parses_known_values_only() {
        assert_eq!(ResultsFormat::parse("sensu"), Some(ResultsFormat::Sensu));
        assert_eq!(
            ResultsFormat::parse("smartgateway"),
            Some(ResultsFormat::SmartGateway)
        );
        assert_eq!(ResultsFormat::parse("bogus"), None);
    }
}
