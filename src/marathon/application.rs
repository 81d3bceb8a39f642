//! Wire types of the Marathon REST API.
//!
//! Only the fields the resolver reads are strongly typed; everything is
//! defaulted so partial documents from older Marathon versions still
//! deserialize.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A deployed application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_definitions: Option<Vec<PortDefinition>>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Application {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A port that is part of an application's resources when running with
/// host networking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// One running instance of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub service_ports: Vec<u16>,
    #[serde(default)]
    pub slave_id: String,
    #[serde(default)]
    pub staged_at: String,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub ip_addresses: Vec<IpAddress>,
    #[serde(default)]
    pub version: String,
}

impl Task {
    pub fn new(app_id: impl Into<String>, host: impl Into<String>, ports: Vec<u16>) -> Self {
        Self {
            app_id: app_id.into(),
            host: host.into(),
            ports,
            ..Default::default()
        }
    }

    /// Renders the endpoint bound to `port_index`, if the task has bound
    /// that many ports yet.
    ///
    /// IPv6 hosts are bracketed so the result parses as a socket address.
    pub fn endpoint(&self, port_index: usize) -> Option<String> {
        let port = self.ports.get(port_index)?;
        if self.host.contains(':') && !self.host.starts_with('[') {
            Some(format!("[{}]:{}", self.host, port))
        } else {
            Some(format!("{}:{}", self.host, port))
        }
    }
}

/// A task's IP address and protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    pub ip_address: String,
    #[serde(default)]
    pub protocol: String,
}

/// Envelope of `GET /v2/apps`.
#[derive(Debug, Deserialize)]
pub(crate) struct AppsResponse {
    #[serde(default)]
    pub apps: Vec<Application>,
}

/// Envelope of `GET /v2/apps/{id}/tasks`.
#[derive(Debug, Deserialize)]
pub(crate) struct TasksResponse {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_marathon_document() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "test.4a1b",
            "appId": "/test",
            "host": "10.0.0.7",
            "ports": [31001, 31002],
            "servicePorts": [10000, 10001],
            "state": "TASK_RUNNING",
            "ipAddresses": [{ "ipAddress": "172.17.0.2", "protocol": "IPv4" }]
        }))
        .unwrap();

        assert_eq!(task.app_id, "/test");
        assert_eq!(task.ports, vec![31001, 31002]);
        assert_eq!(task.ip_addresses[0].ip_address, "172.17.0.2");
        assert!(task.slave_id.is_empty());
    }

    #[test]
    fn test_task_endpoint_skips_unbound_ports() {
        let task = Task::new("/test", "127.0.0.1", vec![2221, 2222]);

        assert_eq!(task.endpoint(1).as_deref(), Some("127.0.0.1:2222"));
        assert_eq!(task.endpoint(2), None);
    }

    #[test]
    fn test_task_endpoint_brackets_ipv6_hosts() {
        let task = Task::new("/test", "::1", vec![8080]);
        assert_eq!(task.endpoint(0).as_deref(), Some("[::1]:8080"));

        let task = Task::new("/test", "[fd00::7]", vec![8080]);
        assert_eq!(task.endpoint(0).as_deref(), Some("[fd00::7]:8080"));
    }

    #[test]
    fn test_application_without_labels() {
        let app: Application = serde_json::from_str(r#"{"id": "/bare"}"#).unwrap();
        assert!(app.labels.is_empty());
        assert!(app.ports.is_empty());
    }
}
