use serde::{Deserialize, Serialize};

/// Error body returned by the collector on a non-success status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub details: Vec<IssueDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueType {
    NotFound,
    Validation,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDetail {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collector_error_body() {
        let body = r#"{
            "correlationId": "abc",
            "issues": [
                {"type": "validation", "title": "Invalid payload",
                 "details": [{"level": "warning", "key": "path", "value": "required"}]},
                {"type": "throttled"}
            ]
        }"#;

        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.correlation_id.as_deref(), Some("abc"));
        assert_eq!(parsed.issues[0].issue_type, IssueType::Validation);
        assert_eq!(parsed.issues[0].details[0].key, "path");
        assert_eq!(parsed.issues[1].issue_type, IssueType::Unknown);
        assert!(parsed.issues[1].details.is_empty());
    }

    #[test]
    fn body_without_issues_is_not_an_error_response() {
        assert!(serde_json::from_str::<ErrorResponse>(r#"{"message":"db down"}"#).is_err());
    }
}
