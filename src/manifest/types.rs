//! Manifest types
//!
//! Declarative connector definition types. Polymorphic components are
//! tagged by their `type` key so the variant is chosen once, at load time.

use crate::interpolation::InterpolatedBoolean;
use crate::request_option::RequestOption;
use crate::types::{JsonObject, JsonValue, Method};
use serde::{Deserialize, Serialize};

// ============================================================================
// Manifest
// ============================================================================

/// Top-level declarative manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarativeManifest {
    /// Manifest version
    #[serde(default = "default_version")]
    pub version: String,
    /// Stream definitions
    pub streams: Vec<StreamDefinition>,
    /// Connector specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecDefinition>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Connector specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecDefinition {
    /// JSON schema of the user config; `airbyte_secret` marks secret fields
    #[serde(default)]
    pub connection_specification: JsonValue,
}

// ============================================================================
// Stream
// ============================================================================

/// A declarative stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Primary key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    /// How records are fetched
    pub retriever: RetrieverDefinition,
    /// Record transformations, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<TransformationDefinition>,
}

/// A single field, a list of fields, or a list of field paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Field(String),
    Fields(Vec<String>),
    Paths(Vec<Vec<String>>),
}

/// Retriever composition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverDefinition {
    /// HTTP requester
    pub requester: RequesterDefinition,
    /// Record selector
    #[serde(default)]
    pub record_selector: RecordSelectorDefinition,
    /// Paginator; none means one page per partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paginator: Option<PaginatorDefinition>,
    /// Partition router; none means a single partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_router: Option<PartitionRouterDefinition>,
}

// ============================================================================
// Requester
// ============================================================================

/// HTTP requester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequesterDefinition {
    /// Base URL (template)
    pub url_base: String,
    /// Path relative to the base (template)
    #[serde(default)]
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub http_method: Method,
    /// Query parameters (templates)
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub request_parameters: JsonObject,
    /// Headers (templates)
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub request_headers: JsonObject,
    /// Form body (templates)
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub request_body_data: JsonObject,
    /// JSON body (templates)
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub request_body_json: JsonObject,
    /// Authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator: Option<AuthenticatorDefinition>,
    /// Retry policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handler: Option<ErrorHandlerDefinition>,
}

/// Authenticator definition; every string is a template over `config`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthenticatorDefinition {
    /// No authentication
    NoAuth,
    /// API key in a header or query parameter
    ApiKeyAuthenticator {
        /// Key value
        api_token: String,
        /// Where the key goes; defaults to the `X-API-Key` header
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inject_into: Option<RequestOption>,
    },
    /// `Authorization: Bearer <token>`
    BearerAuthenticator {
        /// Token value
        api_token: String,
    },
    /// HTTP basic auth
    BasicHttpAuthenticator {
        /// Username
        username: String,
        /// Password
        #[serde(default)]
        password: String,
    },
    /// OAuth2 token endpoint
    OAuthAuthenticator(OAuthDefinition),
}

/// OAuth2 authenticator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthDefinition {
    /// Token endpoint
    pub token_refresh_endpoint: String,
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Refresh token; required for the `refresh_token` grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `refresh_token` or `client_credentials`
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
    /// Requested scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Extra token request fields
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub refresh_request_body: JsonObject,
    /// Access token field in the token response
    #[serde(default = "default_access_token_name")]
    pub access_token_name: String,
    /// Lifetime field in the token response
    #[serde(default = "default_expires_in_name")]
    pub expires_in_name: String,
    /// Write rotated tokens back into the config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_updater: Option<RefreshTokenUpdaterDefinition>,
}

fn default_grant_type() -> String {
    "refresh_token".to_string()
}

fn default_access_token_name() -> String {
    "access_token".to_string()
}

fn default_expires_in_name() -> String {
    "expires_in".to_string()
}

/// Config paths receiving rotated tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenUpdaterDefinition {
    /// Rotated refresh token field in the token response
    #[serde(default = "default_refresh_token_name")]
    pub refresh_token_name: String,
    /// Config path of the refresh token
    #[serde(default = "default_refresh_token_path")]
    pub refresh_token_config_path: Vec<String>,
    /// Config path of the access token
    #[serde(default = "default_access_token_path")]
    pub access_token_config_path: Vec<String>,
    /// Config path of the expiry date
    #[serde(default = "default_expiry_date_path")]
    pub token_expiry_date_config_path: Vec<String>,
}

fn default_refresh_token_name() -> String {
    "refresh_token".to_string()
}

fn credentials_path(leaf: &str) -> Vec<String> {
    vec!["credentials".to_string(), leaf.to_string()]
}

fn default_refresh_token_path() -> Vec<String> {
    credentials_path("refresh_token")
}

fn default_access_token_path() -> Vec<String> {
    credentials_path("access_token")
}

fn default_expiry_date_path() -> Vec<String> {
    credentials_path("token_expiry_date")
}

/// Retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlerDefinition {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff strategies, first answer wins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backoff_strategies: Vec<BackoffStrategyDefinition>,
}

impl Default for ErrorHandlerDefinition {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_strategies: Vec::new(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

/// Backoff strategy definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackoffStrategyDefinition {
    /// Fixed wait
    ConstantBackoffStrategy {
        /// Seconds, number or template
        backoff_time_in_seconds: JsonValue,
    },
    /// `factor * 2^attempt` seconds
    ExponentialBackoffStrategy {
        /// Seconds, number or template
        #[serde(default = "default_factor")]
        factor: JsonValue,
    },
    /// Wait time read from a response header
    WaitTimeFromHeader {
        /// Header name
        header: String,
        /// Regex extracting the number from the header value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regex: Option<String>,
        /// Give up above this many seconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_waiting_time_in_seconds: Option<f64>,
    },
}

fn default_factor() -> JsonValue {
    JsonValue::from(5)
}

// ============================================================================
// Record Selection
// ============================================================================

/// Record selector definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSelectorDefinition {
    /// Field path extractor
    #[serde(default)]
    pub extractor: ExtractorDefinition,
    /// Record filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_filter: Option<RecordFilterDefinition>,
}

/// Extracts records at a field path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractorDefinition {
    /// Path segments (templates); `*` matches every element
    #[serde(default)]
    pub field_path: Vec<String>,
}

/// Keeps records for which the condition holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFilterDefinition {
    /// Condition with `record` bound
    pub condition: InterpolatedBoolean,
}

/// Record transformation definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransformationDefinition {
    /// Add fields
    AddFields {
        /// Fields to add
        fields: Vec<AddedFieldDefinition>,
    },
    /// Remove fields
    RemoveFields {
        /// Paths of fields to remove
        field_pointers: Vec<Vec<String>>,
    },
}

/// A field added by [`TransformationDefinition::AddFields`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddedFieldDefinition {
    /// Where the value goes
    pub path: Vec<String>,
    /// Value template
    pub value: String,
}

// ============================================================================
// Pagination
// ============================================================================

/// Paginator definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaginatorDefinition {
    /// Strategy plus token and page size injection
    DefaultPaginator {
        /// Pagination strategy
        pagination_strategy: PaginationStrategyDefinition,
        /// Where the page token goes
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_token_option: Option<PageTokenOptionDefinition>,
        /// Where the page size goes
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size_option: Option<RequestOption>,
    },
    /// One page per partition
    NoPagination,
}

/// Pagination strategy definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaginationStrategyDefinition {
    /// Next token read from the response
    CursorPagination {
        /// Cursor template
        cursor_value: String,
        /// Stop when this condition is true
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_condition: Option<InterpolatedBoolean>,
        /// Page size
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size: Option<i64>,
    },
    /// Page number counter
    PageIncrement {
        /// Page size, number or template
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size: Option<JsonValue>,
        /// First page number
        #[serde(default = "default_start_from_page")]
        start_from_page: i64,
        /// Send the first page number with the first request
        #[serde(default)]
        inject_on_first_request: bool,
    },
    /// Record offset counter
    OffsetIncrement {
        /// Page size, number or template
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size: Option<JsonValue>,
        /// Send offset 0 with the first request
        #[serde(default)]
        inject_on_first_request: bool,
    },
}

fn default_start_from_page() -> i64 {
    1
}

/// Where the page token goes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageTokenOptionDefinition {
    /// A parameter, header or body field
    RequestOption(RequestOption),
    /// The token is the next request's path or URL
    RequestPath,
}

// ============================================================================
// Partitioning
// ============================================================================

/// Partition router definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PartitionRouterDefinition {
    /// One empty partition
    SinglePartitionRouter,
    /// One partition per listed value
    ListPartitionRouter {
        /// Values, or a template producing a list
        values: JsonValue,
        /// Partition key (template)
        cursor_field: String,
        /// Where the partition value goes
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_option: Option<RequestOption>,
    },
}
