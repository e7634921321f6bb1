use rmcp::schemars;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TimeWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationReportRequest {
    #[schemars(description = "Short title of the incident")]
    pub incident_title: String,

    #[schemars(description = "Environment where the incident happened (e.g. production)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,

    #[schemars(description = "Raw log excerpts; each is rendered as a code block")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_snippets: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InvestigationReportResult {
    pub markdown: String,
}
