use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One service entry of the services YAML file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ServiceSettings {
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}
