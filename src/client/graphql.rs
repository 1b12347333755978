//! GraphQL request envelope and response parsing.

use serde::{Deserialize, Serialize};

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::executor::Payload;

/// GraphQL request payload.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GraphQLRequest {
    /// The GraphQL query or mutation string.
    pub query: String,
    /// Optional variables for the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

/// One error item from a GraphQL response.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the field that caused the error.
    pub path: Option<Vec<String>>,
}

/// Error item as the server sends it. Path segments mix field names and
/// list indices, so they arrive as raw values and render to strings.
#[derive(Debug, Deserialize)]
struct GraphQLRawError {
    message: String,
    path: Option<Vec<serde_json::Value>>,
}

impl From<GraphQLRawError> for GraphQLError {
    fn from(raw: GraphQLRawError) -> Self {
        Self {
            message: raw.message,
            path: raw.path.map(|p| {
                p.into_iter()
                    .filter_map(|v| match v {
                        serde_json::Value::String(s) => Some(s),
                        serde_json::Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect()
            }),
        }
    }
}

/// Raw envelope as the server sends it.
#[derive(Debug, Deserialize)]
struct GraphQLRawResponse {
    data: Option<serde_json::Value>,
    errors: Option<Vec<GraphQLRawError>>,
}

/// Typed GraphQL response envelope.
///
/// GraphQL reports field-level failures inside a 200 response, so `data` and
/// `errors` can both be present; callers inspect `errors` or collapse to the
/// data with [`GraphQLResponse::into_data`].
#[derive(Debug, Clone)]
pub struct GraphQLResponse<T> {
    /// Response data, when the server produced any.
    pub data: Option<T>,
    /// GraphQL errors, when the server reported any.
    pub errors: Option<Vec<GraphQLError>>,
}

impl<T: serde::de::DeserializeOwned> GraphQLResponse<T> {
    /// Parse a negotiated payload into the typed envelope.
    pub(crate) fn from_payload(payload: Payload) -> SkillforgeResult<Self> {
        let value = payload.into_typed::<serde_json::Value>()?;
        let raw: GraphQLRawResponse = serde_json::from_value(value)?;
        let data = raw.data.map(serde_json::from_value).transpose()?;
        Ok(Self {
            data,
            errors: raw
                .errors
                .map(|errors| errors.into_iter().map(GraphQLError::from).collect()),
        })
    }
}

impl<T> GraphQLResponse<T> {
    /// Returns true if the response contains errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().map(|e| !e.is_empty()).unwrap_or(false)
    }

    /// Consumes the response and returns the data, or a serialization error
    /// carrying the first GraphQL error message when there is none.
    pub fn into_data(self) -> SkillforgeResult<T> {
        match self.data {
            Some(data) => Ok(data),
            None => {
                let message = self
                    .errors
                    .as_ref()
                    .and_then(|errs| errs.first())
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "GraphQL response contains no data".to_string());
                Err(SkillforgeError::Serialization { message })
            }
        }
    }
}
