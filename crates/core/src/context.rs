//! Request-scoped submission context.
//!
//! Fields like the request ID and API key ID are carried as explicit
//! values from the HTTP layer into the job record's metadata, never as
//! process-wide globals.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::DbId;

/// Values captured at submission time and persisted with the job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionContext {
    pub request_id: Option<String>,
    pub api_key_id: Option<DbId>,
}

impl SubmissionContext {
    /// Merge this context into submission metadata under a `submission`
    /// key. Client-supplied fields are left untouched; an existing
    /// `submission` key is overwritten.
    pub fn apply_to(&self, metadata: &Value) -> Value {
        let mut obj = metadata
            .as_object()
            .cloned()
            .unwrap_or_default();
        obj.insert(
            "submission".to_string(),
            json!({
                "request_id": self.request_id,
                "api_key_id": self.api_key_id,
            }),
        );
        Value::Object(obj)
    }
}
