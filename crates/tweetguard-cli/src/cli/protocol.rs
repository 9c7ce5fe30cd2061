use serde::{Deserialize, Serialize};

/// Request from CLI client to daemon
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response from daemon to CLI client
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl Response {
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, code: &str, message: &str) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Monitor a user's replies page
    AddUser { handle: String, target: Option<u32> },
    RemoveUser { handle: String },
    ListUsers,
    AddKeyword { terms: Vec<String> },
    AddRegex { pattern: String },
    /// Mark a user as a known spammer
    AddSpammer { handle: String },
    ListRules,
    /// Print and clear the oldest staged unreported tweets
    PrintUnreported { count: usize },
    FixUnreported,
    /// Clear the tweet queue
    Clear,
    /// Clear both queues and reload the page
    Reset,
    Stop,
    Pause,
    /// Sweep monitored users and report their reply threads
    Run,
    DumpReplies,
    Status,
    Shutdown,
}

impl CliCommand {
    /// Convert to a Request for sending to daemon
    pub fn to_request(&self, id: u64) -> Request {
        let (method, params) = match self {
            CliCommand::AddUser { handle, target } => (
                "add_user",
                serde_json::json!({ "handle": handle, "target": target }),
            ),
            CliCommand::RemoveUser { handle } => {
                ("remove_user", serde_json::json!({ "handle": handle }))
            }
            CliCommand::ListUsers => ("list_users", serde_json::json!({})),
            CliCommand::AddKeyword { terms } => {
                ("add_keyword", serde_json::json!({ "terms": terms }))
            }
            CliCommand::AddRegex { pattern } => {
                ("add_regex", serde_json::json!({ "pattern": pattern }))
            }
            CliCommand::AddSpammer { handle } => {
                ("add_spammer", serde_json::json!({ "handle": handle }))
            }
            CliCommand::ListRules => ("list_rules", serde_json::json!({})),
            CliCommand::PrintUnreported { count } => {
                ("print_unreported", serde_json::json!({ "count": count }))
            }
            CliCommand::FixUnreported => ("fix_unreported", serde_json::json!({})),
            CliCommand::Clear => ("clear", serde_json::json!({})),
            CliCommand::Reset => ("reset", serde_json::json!({})),
            CliCommand::Stop => ("stop", serde_json::json!({})),
            CliCommand::Pause => ("pause", serde_json::json!({})),
            CliCommand::Run => ("run", serde_json::json!({})),
            CliCommand::DumpReplies => ("dump_replies", serde_json::json!({})),
            CliCommand::Status => ("status", serde_json::json!({})),
            CliCommand::Shutdown => ("shutdown", serde_json::json!({})),
        };

        Request {
            id,
            method: method.to_string(),
            params,
        }
    }
}
