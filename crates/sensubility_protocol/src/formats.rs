//! Result formatting: the native Sensu envelope and the Smart-Gateway/VES
//! alerting envelope (spec.md §4.6).

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::Value;

use crate::types::{CheckResult, ClientResult, Keepalive, Severity, AGENT_VERSION};

/// Wrap a [`CheckResult`] in the native Sensu envelope.
pub fn to_client_result(client: &str, check: CheckResult) -> ClientResult {
    ClientResult {
        client: client.to_string(),
        check,
    }
}

/// Build a keepalive beacon for this instant.
pub fn build_keepalive(
    client_name: &str,
    client_address: &str,
    subscriptions: &[String],
    timestamp: i64,
) -> Keepalive {
    Keepalive {
        name: client_name.to_string(),
        address: client_address.to_string(),
        subscriptions: subscriptions.to_vec(),
        version: AGENT_VERSION.to_string(),
        timestamp,
    }
}

/// Process-wide identifier used as `reportingEntityId`/`sourceId` in every VES
/// event emitted by this process (spec.md §4.6).
fn host_uuid() -> &'static str {
    static HOST_UUID: OnceLock<String> = OnceLock::new();
    HOST_UUID.get_or_init(|| uuid::Uuid::new_v4().to_string())
}

/// Smart-Gateway alerting envelope: `{labels, annotations, startsAt}`.
#[derive(Debug, Clone, Serialize)]
pub struct SmartGatewayResult {
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, Value>,
    #[serde(rename = "startsAt")]
    pub starts_at: String,
}

#[derive(Debug, Clone, Serialize)]
struct VesEventHeader {
    domain: &'static str,
    #[serde(rename = "eventType")]
    event_type: &'static str,
    #[serde(rename = "eventId")]
    event_id: String,
    priority: &'static str,
    #[serde(rename = "reportingEntityId")]
    reporting_entity_id: String,
    #[serde(rename = "reportingEntityName")]
    reporting_entity_name: String,
    #[serde(rename = "sourceId")]
    source_id: String,
    #[serde(rename = "sourceName")]
    source_name: String,
    #[serde(rename = "startingEpochMicrosec")]
    starting_epoch_microsec: i64,
    #[serde(rename = "lastEpochMicrosec")]
    last_epoch_microsec: i64,
}

#[derive(Debug, Clone, Serialize)]
struct VesHeartbeatFields {
    #[serde(rename = "additionalFields")]
    additional_fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
struct VesEvent {
    #[serde(rename = "commonEventHeader")]
    common_event_header: VesEventHeader,
    #[serde(rename = "heartbeatFields")]
    heartbeat_fields: VesHeartbeatFields,
}

/// Render `result` as the Smart-Gateway envelope described in spec.md §4.6,
/// with the embedded VES heartbeat event JSON-encoded into
/// `annotations.ves`. `now_rfc3339` is injected so callers control the
/// `startsAt` clock read (keeps this function pure/testable).
pub fn to_smart_gateway_result(
    client: &str,
    result: &CheckResult,
    now_rfc3339: String,
) -> Result<SmartGatewayResult, serde_json::Error> {
    let mut labels = HashMap::new();
    labels.insert("client".to_string(), client.to_string());
    labels.insert("check".to_string(), result.name.clone());
    labels.insert(
        "severity".to_string(),
        result.severity().as_str().to_string(),
    );

    let mut annotations = HashMap::new();
    annotations.insert("command".to_string(), Value::String(result.command.clone()));
    annotations.insert("issued".to_string(), Value::from(result.issued));
    annotations.insert("executed".to_string(), Value::from(result.executed));
    annotations.insert("duration".to_string(), Value::from(result.duration));
    annotations.insert("output".to_string(), Value::String(result.output.clone()));
    annotations.insert("status".to_string(), Value::from(result.status));

    let priority = match result.severity() {
        Severity::Okay => "Normal",
        _ => "High",
    };

    let mut additional_fields = HashMap::new();
    additional_fields.insert("check".to_string(), result.name.clone());
    additional_fields.insert("command".to_string(), result.command.clone());
    additional_fields.insert("issued".to_string(), result.issued.to_string());
    additional_fields.insert("executed".to_string(), result.executed.to_string());
    additional_fields.insert("duration".to_string(), format!("{:.6}", result.duration));
    additional_fields.insert("output".to_string(), result.output.clone());
    additional_fields.insert("status".to_string(), result.status.to_string());

    let ves = VesEvent {
        common_event_header: VesEventHeader {
            domain: "heartbeat",
            event_type: "checkResult",
            event_id: format!("{}-{}", client, result.name),
            priority,
            reporting_entity_id: host_uuid().to_string(),
            reporting_entity_name: client.to_string(),
            source_id: host_uuid().to_string(),
            source_name: format!("{}-collectd-sensubility", client),
            starting_epoch_microsec: result.executed,
            last_epoch_microsec: result.executed + result.duration as i64,
        },
        heartbeat_fields: VesHeartbeatFields { additional_fields },
    };
    let ves_json = serde_json::to_string(&ves)?;
    annotations.insert("ves".to_string(), Value::String(ves_json));

    Ok(SmartGatewayResult {
        labels,
        annotations,
        starts_at: now_rfc3339,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: i32) -> CheckResult {
        CheckResult {
            command: "exit 0".into(),
            name: "disk".into(),
            issued: 1000,
            executed: 1001,
            duration: 0.25,
            output: "ok\n".into(),
            status,
        }
    }

    #[test]
    fn failure_status_yields_high_priority_and_failure_severity() {
        let result = sample(2);
        let sg = to_smart_gateway_result("host1", &result, "2026-01-01T00:00:00Z".into()).unwrap();
        assert_eq!(sg.labels["severity"], "FAILURE");
        let ves: Value = serde_json::from_str(sg.annotations["ves"].as_str().unwrap()).unwrap();
        assert_eq!(ves["commonEventHeader"]["priority"], "High");
        assert_eq!(ves["commonEventHeader"]["sourceName"], "host1-collectd-sensubility");
    }

    #[test]
    fn success_status_yields_okay_severity_and_normal_priority() {
        let result = sample(0);
        let sg = to_smart_gateway_result("host1", &result, "2026-01-01T00:00:00Z".into()).unwrap();
        assert_eq!(sg.labels["severity"], "OKAY");
        let ves: Value = serde_json::from_str(sg.annotations["ves"].as_str().unwrap()).unwrap();
        assert_eq!(ves["commonEventHeader"]["priority"], "Normal");
    }

    #[test]
    fn warning_status_maps_to_warning_severity() {
        let result = sample(1);
        let sg = to_smart_gateway_result("host1", &result, "2026-01-01T00:00:00Z".into()).unwrap();
        assert_eq!(sg.labels["severity"], "WARNING");
    }

    #[test]
    fn event_id_combines_client_and_check_name() {
        let result = sample(0);
        let sg = to_smart_gateway_result("my-client", &result, "2026-01-01T00:00:00Z".into()).unwrap();
        let ves: Value = serde_json::from_str(sg.annotations["ves"].as_str().unwrap()).unwrap();
        assert_eq!(ves["commonEventHeader"]["eventId"], "my-client-disk");
    }
}
