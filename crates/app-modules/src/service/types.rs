//! Service genesis, records and messages.

use serde::{Deserialize, Serialize};

/// Module parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceParams {
    /// Longest allowed request timeout, in blocks.
    pub max_request_timeout: u64,
    /// Longest allowed request input, in bytes.
    pub max_input_len: u32,
}

impl Default for ServiceParams {
    fn default() -> Self {
        Self {
            max_request_timeout: 100,
            max_input_len: 1024,
        }
    }
}

/// A published service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
}

/// A pending call to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: u64,
    pub service_name: String,
    pub consumer: String,
    pub input: String,
    /// The request is dropped by the end block of this height.
    pub expiration_height: u64,
}

/// Genesis blob of the service module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGenesis {
    pub params: ServiceParams,
    pub definitions: Vec<ServiceDefinition>,
    pub requests: Vec<ServiceRequest>,
    pub next_request_id: u64,
}

impl Default for ServiceGenesis {
    fn default() -> Self {
        Self {
            params: ServiceParams::default(),
            definitions: Vec::new(),
            requests: Vec::new(),
            next_request_id: 1,
        }
    }
}

/// `define_service` payload.
pub type MsgDefineService = ServiceDefinition;

/// `call_service` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCallService {
    pub service_name: String,
    pub consumer: String,
    pub input: String,
    /// Blocks until expiry.
    pub timeout: u64,
}

/// `respond` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRespond {
    pub request_id: u64,
    pub provider: String,
    pub output: String,
}

/// `definition` query argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: String,
}

/// `request` query argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub id: u64,
}
