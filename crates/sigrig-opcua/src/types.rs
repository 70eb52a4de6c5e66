// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA protocol types.
//!
//! This module provides the type vocabulary for the client runtime:
//!
//! - **NodeId**: all four OPC UA node identifier kinds with parsing and formatting
//! - **NodeClass/AttributeId/ReferenceTypeId**: address-space metadata identifiers
//! - **SecurityMode/SecurityPolicy/EndpointInfo**: endpoint discovery and selection
//! - **OpcUaConfig**: client connection configuration with builder
//! - **SubscriptionSettings/MonitoredItemSettings**: change-notification tuning
//!
//! # Examples
//!
//! ```
//! use sigrig_opcua::types::{NodeId, OpcUaConfig};
//!
//! // Parse a node ID from its OPC UA string form
//! let node: NodeId = "ns=2;s=Plant/Analog/Flow".parse().unwrap();
//! assert_eq!(node.namespace_index, 2);
//!
//! // Client configuration with defaults
//! let config = OpcUaConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_retries, 10);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, OpcUaError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier.
///
/// A NodeId uniquely identifies a node within an OPC UA server. It consists
/// of a namespace index and an identifier which can be numeric, string,
/// GUID, or opaque (byte string).
///
/// # Examples
///
/// ```
/// use sigrig_opcua::types::NodeId;
///
/// let numeric = NodeId::numeric(2, 1001);
/// let string = NodeId::string(2, "Plant/Process/State");
///
/// let parsed: NodeId = "ns=2;s=Plant/Process/State".parse().unwrap();
/// assert_eq!(parsed, string);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    // =========================================================================
    // Standard Node IDs
    // =========================================================================

    /// Root folder node (ns=0, i=84).
    pub const ROOT_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(84),
    };

    /// Objects folder node (ns=0, i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(85),
    };

    /// Types folder node (ns=0, i=86).
    pub const TYPES_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(86),
    };

    /// Views folder node (ns=0, i=87).
    pub const VIEWS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(87),
    };

    /// Server node (ns=0, i=2253).
    pub const SERVER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(2253),
    };

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns `true` if this is a numeric identifier.
    #[inline]
    pub const fn is_numeric(&self) -> bool {
        matches!(self.identifier, NodeIdentifier::Numeric(_))
    }

    /// Returns `true` if this is a string identifier.
    #[inline]
    pub const fn is_string(&self) -> bool {
        matches!(self.identifier, NodeIdentifier::String(_))
    }

    /// Returns `true` if this is in the standard namespace (ns=0).
    #[inline]
    pub const fn is_standard(&self) -> bool {
        self.namespace_index == 0
    }

    /// Returns the null node ID (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(0),
        }
    }

    /// Returns `true` if this is the null node ID.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Returns the string value if this is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Converts to the OPC UA string format.
    ///
    /// Format: `ns=<namespace>;{i|s|g|b}=<identifier>`. The `ns=` prefix is
    /// omitted for the standard namespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigrig_opcua::types::NodeId;
    ///
    /// assert_eq!(NodeId::numeric(2, 1001).to_opc_string(), "ns=2;i=1001");
    /// assert_eq!(NodeId::numeric(0, 84).to_opc_string(), "i=84");
    /// ```
    pub fn to_opc_string(&self) -> String {
        let id_str = match &self.identifier {
            NodeIdentifier::Numeric(v) => format!("i={}", v),
            NodeIdentifier::String(v) => format!("s={}", v),
            NodeIdentifier::Guid(v) => format!("g={}", v),
            NodeIdentifier::Opaque(v) => format!("b={}", BASE64.encode(v)),
        };

        if self.namespace_index == 0 {
            id_str
        } else {
            format!("ns={};{}", self.namespace_index, id_str)
        }
    }

    /// Returns the identifier type as a string.
    pub const fn identifier_type(&self) -> &'static str {
        match &self.identifier {
            NodeIdentifier::Numeric(_) => "Numeric",
            NodeIdentifier::String(_) => "String",
            NodeIdentifier::Guid(_) => "Guid",
            NodeIdentifier::Opaque(_) => "Opaque",
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=84` (numeric, namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace_index, identifier_part) = if let Some(rest) = s.strip_prefix("ns=") {
            let Some((ns_str, identifier)) = rest.split_once(';') else {
                return Err(OpcUaError::configuration(
                    ConfigurationError::invalid_node_id(s, "Missing identifier after namespace"),
                ));
            };

            let ns: u16 = ns_str.parse().map_err(|_| {
                OpcUaError::configuration(ConfigurationError::invalid_node_id(
                    s,
                    "Invalid namespace index",
                ))
            })?;

            (ns, identifier)
        } else {
            (0, s)
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value: u32 = id.parse().map_err(|_| {
                OpcUaError::configuration(ConfigurationError::invalid_node_id(
                    s,
                    "Invalid numeric identifier",
                ))
            })?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id).map_err(|e| {
                OpcUaError::configuration(ConfigurationError::invalid_node_id(
                    s,
                    format!("Invalid GUID: {}", e),
                ))
            })?;
            NodeIdentifier::Guid(uuid)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            let bytes = BASE64.decode(id).map_err(|e| {
                OpcUaError::configuration(ConfigurationError::invalid_node_id(
                    s,
                    format!("Invalid base64: {}", e),
                ))
            })?;
            NodeIdentifier::Opaque(bytes)
        } else {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_node_id(
                    s,
                    "Unknown identifier type. Expected i=, s=, g=, or b=",
                ),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// OPC UA node identifier types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier (used for standard nodes).
    Numeric(u32),

    /// String identifier (human-readable, used for custom nodes).
    String(String),

    /// GUID identifier (globally unique).
    Guid(Uuid),

    /// Opaque identifier (application-specific byte array).
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class.
///
/// The values are bit flags as defined by the protocol, so they can be
/// combined into a browse filter mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node (folders and device objects).
    Object,

    /// Variable node (holds a value).
    Variable,

    /// Method node (callable).
    Method,

    /// Object type definition.
    ObjectType,

    /// Variable type definition.
    VariableType,

    /// Reference type definition.
    ReferenceType,

    /// Data type definition.
    DataType,

    /// View node.
    View,
}

impl NodeClass {
    /// Returns the protocol bit value for this node class.
    pub const fn mask(&self) -> u32 {
        match self {
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from a protocol value.
    pub fn from_mask(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }

    /// Browse mask covering objects, variables, and methods.
    pub const HIERARCHY_MASK: u32 = 1 | 2 | 4;

    /// Returns `true` if this class can hold a value.
    #[inline]
    pub const fn is_variable(&self) -> bool {
        matches!(self, Self::Variable)
    }

    /// Returns `true` if this class can be called.
    #[inline]
    pub const fn is_method(&self) -> bool {
        matches!(self, Self::Method)
    }

    /// Returns `true` if this class can contain children.
    #[inline]
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "Object"),
            Self::Variable => write!(f, "Variable"),
            Self::Method => write!(f, "Method"),
            Self::ObjectType => write!(f, "ObjectType"),
            Self::VariableType => write!(f, "VariableType"),
            Self::ReferenceType => write!(f, "ReferenceType"),
            Self::DataType => write!(f, "DataType"),
            Self::View => write!(f, "View"),
        }
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// OPC UA attribute identifiers used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// Node class attribute (id 2).
    NodeClass,

    /// Browse name attribute (id 3).
    BrowseName,

    /// Display name attribute (id 4).
    DisplayName,

    /// Current value attribute (id 13).
    Value,
}

impl AttributeId {
    /// Returns the protocol attribute id.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Value => 13,
        }
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeClass => write!(f, "NodeClass"),
            Self::BrowseName => write!(f, "BrowseName"),
            Self::DisplayName => write!(f, "DisplayName"),
            Self::Value => write!(f, "Value"),
        }
    }
}

// =============================================================================
// ReferenceTypeId
// =============================================================================

/// Reference types used for address-space navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTypeId {
    /// Any hierarchical reference (id 33).
    HierarchicalReferences,

    /// Folder organization reference (id 35).
    Organizes,

    /// Component ownership reference (id 47). Links objects to their
    /// variables and methods.
    HasComponent,
}

impl ReferenceTypeId {
    /// Returns the standard numeric id for this reference type.
    pub const fn value(&self) -> u32 {
        match self {
            Self::HierarchicalReferences => 33,
            Self::Organizes => 35,
            Self::HasComponent => 47,
        }
    }

    /// Returns the node ID of this reference type (ns=0).
    pub fn node_id(&self) -> NodeId {
        NodeId::numeric(0, self.value())
    }
}

impl fmt::Display for ReferenceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HierarchicalReferences => write!(f, "HierarchicalReferences"),
            Self::Organizes => write!(f, "Organizes"),
            Self::HasComponent => write!(f, "HasComponent"),
        }
    }
}

// =============================================================================
// BrowseDirection
// =============================================================================

/// Direction to follow references when browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowseDirection {
    /// Follow references from source to target (children).
    #[default]
    Forward,

    /// Follow references from target to source (parents).
    Inverse,
}

impl fmt::Display for BrowseDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "Forward"),
            Self::Inverse => write!(f, "Inverse"),
        }
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No security (messages are neither signed nor encrypted).
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns `true` if this mode provides no security.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security policy (use with `SecurityMode::None`).
    #[default]
    None,

    /// Basic128Rsa15 (legacy).
    Basic128Rsa15,

    /// Basic256 (legacy).
    Basic256,

    /// Basic256Sha256.
    Basic256Sha256,

    /// Aes128Sha256RsaOaep.
    Aes128Sha256RsaOaep,

    /// Aes256Sha256RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Creates from a policy URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            s if s.ends_with("#None") || s.is_empty() => Some(Self::None),
            s if s.ends_with("#Basic128Rsa15") => Some(Self::Basic128Rsa15),
            s if s.ends_with("#Basic256") => Some(Self::Basic256),
            s if s.ends_with("#Basic256Sha256") => Some(Self::Basic256Sha256),
            s if s.contains("Aes128_Sha256_RsaOaep") => Some(Self::Aes128Sha256RsaOaep),
            s if s.contains("Aes256_Sha256_RsaPss") => Some(Self::Aes256Sha256RsaPss),
            _ => None,
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// EndpointInfo
// =============================================================================

/// Endpoint advertised by a server during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// Endpoint URL.
    pub url: String,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Security policy.
    pub security_policy: SecurityPolicy,

    /// Server-reported security level (higher = more secure).
    pub security_level: u8,
}

impl EndpointInfo {
    /// Creates an unsecured endpoint description.
    pub fn unsecured(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            security_mode: SecurityMode::None,
            security_policy: SecurityPolicy::None,
            security_level: 0,
        }
    }

    /// Returns `true` if this endpoint requires no security.
    pub fn is_unsecured(&self) -> bool {
        self.security_mode.is_none() && self.security_policy == SecurityPolicy::None
    }

    /// Returns the `mode/policy-uri` description used in error messages.
    pub fn describe(&self) -> String {
        format!("{}/{}", self.security_mode, self.security_policy.uri())
    }

    /// Joins endpoint descriptions for diagnostics.
    pub fn describe_all(endpoints: &[EndpointInfo]) -> String {
        endpoints
            .iter()
            .map(EndpointInfo::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.describe())
    }
}

// =============================================================================
// UserTokenType
// =============================================================================

/// OPC UA user authentication token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserTokenType {
    /// Anonymous authentication.
    #[default]
    Anonymous,

    /// Username and password authentication.
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },
}

impl UserTokenType {
    /// Returns `true` if this is anonymous authentication.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the type name.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::UserName { .. } => "UserName",
        }
    }
}

impl fmt::Display for UserTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => write!(f, "UserName({})", username),
        }
    }
}

// =============================================================================
// OpcUaConfig
// =============================================================================

/// OPC UA client configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sigrig_opcua::types::OpcUaConfig;
///
/// let config = OpcUaConfig::builder()
///     .endpoint("opc.tcp://plc.local:4840")
///     .max_retries(5)
///     .retry_delay(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint, "opc.tcp://plc.local:4840");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcUaConfig {
    /// Server endpoint URL (e.g. "opc.tcp://localhost:4840").
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Message security mode.
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Security policy.
    #[serde(default)]
    pub security_policy: SecurityPolicy,

    /// User authentication token.
    #[serde(default)]
    pub user_token: UserTokenType,

    /// Application name presented to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Session name. Defaults to `<application_name>Session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,

    /// Session timeout requested from the server.
    #[serde(default = "default_session_timeout")]
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Timeout applied to individual service requests.
    #[serde(default = "default_operation_timeout")]
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Maximum connection attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between connection attempts.
    #[serde(default = "default_retry_delay")]
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Session keepalive interval.
    #[serde(default = "default_keepalive_interval")]
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,

    /// Default subscription settings.
    #[serde(default)]
    pub subscription: SubscriptionSettings,

    /// Default monitored-item settings.
    #[serde(default)]
    pub monitored_item: MonitoredItemSettings,
}

fn default_endpoint() -> String {
    "opc.tcp://localhost:4840".to_string()
}

fn default_application_name() -> String {
    "SigrigClient".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_keepalive_interval() -> Duration {
    Duration::from_secs(10)
}

impl OpcUaConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OpcUaConfigBuilder {
        OpcUaConfigBuilder::default()
    }

    /// Creates a configuration with the given endpoint and defaults elsewhere.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), OpcUaError> {
        if self.endpoint.is_empty() {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_field("endpoint", "Endpoint must not be empty"),
            ));
        }

        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_endpoint(
                    &self.endpoint,
                    "Endpoint must start with opc.tcp://",
                ),
            ));
        }

        if self.security_mode != SecurityMode::None && self.security_policy == SecurityPolicy::None
        {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_field(
                    "security_policy",
                    "Security mode requires a security policy other than None",
                ),
            ));
        }

        if self.security_mode == SecurityMode::None && self.security_policy != SecurityPolicy::None
        {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_field(
                    "security_mode",
                    "Security policy requires a security mode other than None",
                ),
            ));
        }

        if self.max_retries == 0 {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_field("max_retries", "Must be at least 1"),
            ));
        }

        if self.session_timeout.is_zero() {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_field("session_timeout", "Must be greater than 0"),
            ));
        }

        if self.operation_timeout.is_zero() {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_field("operation_timeout", "Must be greater than 0"),
            ));
        }

        Ok(())
    }

    /// Returns the effective session name.
    pub fn effective_session_name(&self) -> String {
        self.session_name
            .clone()
            .unwrap_or_else(|| format!("{}Session", self.application_name))
    }

    /// Returns `true` if this configuration uses security.
    #[inline]
    pub fn uses_security(&self) -> bool {
        self.security_mode != SecurityMode::None
    }
}

impl Default for OpcUaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            security_mode: SecurityMode::default(),
            security_policy: SecurityPolicy::default(),
            user_token: UserTokenType::default(),
            application_name: default_application_name(),
            session_name: None,
            session_timeout: default_session_timeout(),
            operation_timeout: default_operation_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            keepalive_interval: default_keepalive_interval(),
            subscription: SubscriptionSettings::default(),
            monitored_item: MonitoredItemSettings::default(),
        }
    }
}

// =============================================================================
// OpcUaConfigBuilder
// =============================================================================

/// Builder for [`OpcUaConfig`].
#[derive(Debug, Default)]
pub struct OpcUaConfigBuilder {
    endpoint: Option<String>,
    security_mode: Option<SecurityMode>,
    security_policy: Option<SecurityPolicy>,
    user_token: Option<UserTokenType>,
    application_name: Option<String>,
    session_name: Option<String>,
    session_timeout: Option<Duration>,
    operation_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_delay: Option<Duration>,
    keepalive_interval: Option<Duration>,
    subscription: Option<SubscriptionSettings>,
    monitored_item: Option<MonitoredItemSettings>,
}

impl OpcUaConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the security mode.
    pub fn security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = Some(mode);
        self
    }

    /// Sets the security policy.
    pub fn security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.security_policy = Some(policy);
        self
    }

    /// Sets username/password authentication.
    pub fn username(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_token = Some(UserTokenType::UserName {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Sets anonymous authentication.
    pub fn anonymous(mut self) -> Self {
        self.user_token = Some(UserTokenType::Anonymous);
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the session name.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the per-request operation timeout.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Sets the maximum connection attempts.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the delay between connection attempts.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the keepalive interval.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Sets the subscription settings.
    pub fn subscription(mut self, settings: SubscriptionSettings) -> Self {
        self.subscription = Some(settings);
        self
    }

    /// Sets the monitored-item settings.
    pub fn monitored_item(mut self, settings: MonitoredItemSettings) -> Self {
        self.monitored_item = Some(settings);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<OpcUaConfig, OpcUaError> {
        let config = OpcUaConfig {
            endpoint: self.endpoint.unwrap_or_else(default_endpoint),
            security_mode: self.security_mode.unwrap_or_default(),
            security_policy: self.security_policy.unwrap_or_default(),
            user_token: self.user_token.unwrap_or_default(),
            application_name: self.application_name.unwrap_or_else(default_application_name),
            session_name: self.session_name,
            session_timeout: self.session_timeout.unwrap_or_else(default_session_timeout),
            operation_timeout: self
                .operation_timeout
                .unwrap_or_else(default_operation_timeout),
            max_retries: self.max_retries.unwrap_or_else(default_max_retries),
            retry_delay: self.retry_delay.unwrap_or_else(default_retry_delay),
            keepalive_interval: self
                .keepalive_interval
                .unwrap_or_else(default_keepalive_interval),
            subscription: self.subscription.unwrap_or_default(),
            monitored_item: self.monitored_item.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Subscription-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Interval at which the server publishes accumulated notifications.
    #[serde(default = "default_publishing_interval")]
    #[serde(with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Publishing intervals without client acknowledgement before the
    /// server drops the subscription.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Publishing intervals without data before the server sends an
    /// empty keepalive notification.
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,

    /// Maximum notifications bundled into one publish response.
    #[serde(default = "default_max_notifications")]
    pub max_notifications_per_publish: u32,

    /// Subscription priority relative to others on the same session.
    #[serde(default)]
    pub priority: u8,

    /// Whether publishing is enabled at creation.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_lifetime_count() -> u32 {
    100
}

fn default_keepalive_count() -> u32 {
    10
}

fn default_max_notifications() -> u32 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: default_publishing_interval(),
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
            max_notifications_per_publish: default_max_notifications(),
            priority: 0,
            publishing_enabled: true,
        }
    }
}

// =============================================================================
// MonitoredItemSettings
// =============================================================================

/// Per-item monitoring settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredItemSettings {
    /// Server-side sampling interval.
    #[serde(default = "default_sampling_interval")]
    #[serde(with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue depth between publishes. A depth of 1 keeps
    /// only the latest value.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Whether the oldest queued value is discarded when the queue
    /// overflows.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,
}

fn default_sampling_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_queue_size() -> u32 {
    1
}

impl Default for MonitoredItemSettings {
    fn default() -> Self {
        Self {
            sampling_interval: default_sampling_interval(),
            queue_size: default_queue_size(),
            discard_oldest: true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_to_opc_string() {
        assert_eq!(NodeId::numeric(2, 1001).to_opc_string(), "ns=2;i=1001");
        assert_eq!(
            NodeId::string(2, "Plant/Analog/Flow").to_opc_string(),
            "ns=2;s=Plant/Analog/Flow"
        );
        // Standard namespace omits the ns= prefix
        assert_eq!(NodeId::numeric(0, 84).to_opc_string(), "i=84");
    }

    #[test]
    fn test_node_id_parse_numeric() {
        let node: NodeId = "ns=2;i=1001".parse().unwrap();
        assert_eq!(node.namespace_index, 2);
        assert_eq!(node.as_numeric(), Some(1001));
    }

    #[test]
    fn test_node_id_parse_string() {
        let node: NodeId = "ns=2;s=Plant/Process/State".parse().unwrap();
        assert_eq!(node.namespace_index, 2);
        assert_eq!(node.as_string(), Some("Plant/Process/State"));
    }

    #[test]
    fn test_node_id_parse_default_namespace() {
        let node: NodeId = "i=84".parse().unwrap();
        assert_eq!(node, NodeId::ROOT_FOLDER);
    }

    #[test]
    fn test_node_id_parse_guid() {
        let node: NodeId = "ns=3;g=550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(node.namespace_index, 3);
        assert!(matches!(node.identifier, NodeIdentifier::Guid(_)));
    }

    #[test]
    fn test_node_id_parse_opaque_roundtrip() {
        let original = NodeId::opaque(4, vec![1, 2, 3, 4]);
        let parsed: NodeId = original.to_opc_string().parse().unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_node_id_parse_trims_whitespace() {
        let node: NodeId = "  ns=2;s=Flow  ".parse().unwrap();
        assert_eq!(node.as_string(), Some("Flow"));
    }

    #[test]
    fn test_node_id_parse_errors() {
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("ns=abc;i=1".parse::<NodeId>().is_err());
        assert!("ns=2;x=1".parse::<NodeId>().is_err());
        assert!("ns=2;i=notanumber".parse::<NodeId>().is_err());
        assert!("ns=2;g=not-a-guid".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_well_known_nodes() {
        assert_eq!(NodeId::ROOT_FOLDER.as_numeric(), Some(84));
        assert_eq!(NodeId::OBJECTS_FOLDER.as_numeric(), Some(85));
        assert_eq!(NodeId::TYPES_FOLDER.as_numeric(), Some(86));
        assert_eq!(NodeId::VIEWS_FOLDER.as_numeric(), Some(87));
        assert_eq!(NodeId::SERVER.as_numeric(), Some(2253));
        assert!(NodeId::ROOT_FOLDER.is_standard());
    }

    #[test]
    fn test_node_class_masks() {
        assert_eq!(NodeClass::Object.mask(), 1);
        assert_eq!(NodeClass::Variable.mask(), 2);
        assert_eq!(NodeClass::Method.mask(), 4);
        assert_eq!(NodeClass::HIERARCHY_MASK, 7);
        assert_eq!(NodeClass::from_mask(2), Some(NodeClass::Variable));
        assert_eq!(NodeClass::from_mask(3), None);
    }

    #[test]
    fn test_attribute_ids() {
        assert_eq!(AttributeId::NodeClass.value(), 2);
        assert_eq!(AttributeId::BrowseName.value(), 3);
        assert_eq!(AttributeId::DisplayName.value(), 4);
        assert_eq!(AttributeId::Value.value(), 13);
    }

    #[test]
    fn test_reference_type_ids() {
        assert_eq!(ReferenceTypeId::HierarchicalReferences.value(), 33);
        assert_eq!(ReferenceTypeId::Organizes.value(), 35);
        assert_eq!(ReferenceTypeId::HasComponent.value(), 47);
        assert_eq!(ReferenceTypeId::Organizes.node_id(), NodeId::numeric(0, 35));
    }

    #[test]
    fn test_security_policy_uri_roundtrip() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_uri(policy.uri()), Some(policy));
        }
        // Servers may advertise an empty policy URI for unsecured endpoints
        assert_eq!(SecurityPolicy::from_uri(""), Some(SecurityPolicy::None));
    }

    #[test]
    fn test_endpoint_describe() {
        let unsecured = EndpointInfo::unsecured("opc.tcp://localhost:4840");
        assert!(unsecured.is_unsecured());
        assert_eq!(
            unsecured.describe(),
            "None/http://opcfoundation.org/UA/SecurityPolicy#None"
        );

        let secured = EndpointInfo {
            url: "opc.tcp://localhost:4840".to_string(),
            security_mode: SecurityMode::SignAndEncrypt,
            security_policy: SecurityPolicy::Basic256Sha256,
            security_level: 3,
        };
        assert!(!secured.is_unsecured());

        let joined = EndpointInfo::describe_all(&[unsecured, secured]);
        assert!(joined.contains(", "));
        assert!(joined.contains("SignAndEncrypt/"));
    }

    #[test]
    fn test_config_defaults() {
        let config = OpcUaConfig::default();
        assert_eq!(config.endpoint, "opc.tcp://localhost:4840");
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.retry_delay, Duration::from_secs(3));
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.operation_timeout, Duration::from_secs(15));
        assert!(config.user_token.is_anonymous());
        assert_eq!(config.effective_session_name(), "SigrigClientSession");
    }

    #[test]
    fn test_config_builder() {
        let config = OpcUaConfig::builder()
            .endpoint("opc.tcp://plc.local:4840")
            .application_name("RigClient")
            .max_retries(3)
            .retry_delay(Duration::from_millis(100))
            .build()
            .unwrap();

        assert_eq!(config.endpoint, "opc.tcp://plc.local:4840");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.effective_session_name(), "RigClientSession");
    }

    #[test]
    fn test_config_validation_rejects_bad_endpoint() {
        let result = OpcUaConfig::builder().endpoint("http://localhost:8080").build();
        assert!(result.is_err());

        let result = OpcUaConfig::builder().endpoint("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_rejects_mismatched_security() {
        let result = OpcUaConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .security_mode(SecurityMode::SignAndEncrypt)
            .build();
        assert!(result.is_err());

        let result = OpcUaConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .security_policy(SecurityPolicy::Basic256Sha256)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_rejects_zero_retries() {
        let result = OpcUaConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .max_retries(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_subscription_defaults() {
        let settings = SubscriptionSettings::default();
        assert_eq!(settings.publishing_interval, Duration::from_millis(1000));
        assert_eq!(settings.lifetime_count, 100);
        assert_eq!(settings.keepalive_count, 10);
        assert_eq!(settings.max_notifications_per_publish, 1000);
        assert!(settings.publishing_enabled);
    }

    #[test]
    fn test_monitored_item_defaults() {
        let settings = MonitoredItemSettings::default();
        assert_eq!(settings.sampling_interval, Duration::from_millis(1000));
        assert_eq!(settings.queue_size, 1);
        assert!(settings.discard_oldest);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = OpcUaConfig::new("opc.tcp://localhost:4840");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: OpcUaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.endpoint, config.endpoint);
        assert_eq!(parsed.max_retries, config.max_retries);
    }
}
