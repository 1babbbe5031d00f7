use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Value, json};
use strum_macros::{AsRefStr, EnumString};
use tracing::{info, instrument};

use crate::chat::llm::FunctionDecl;
use crate::error::AppError;
use crate::knowledge::KnowledgeSearch;
use crate::knowledge::search::ASSISTANT_RESULT_LIMIT;
use crate::leave::LeaveLedger;
use crate::model::knowledge::Category;
use crate::model::leave_request::{LeaveType, parse_date};

/// Operations the assistant may invoke.
#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Function {
    GetLeaveBalance,
    SubmitLeaveRequest,
    SearchKnowledgeBase,
}

static DECLARATIONS: Lazy<Vec<FunctionDecl>> = Lazy::new(|| {
    vec![
        FunctionDecl {
            name: Function::GetLeaveBalance.as_ref().to_string(),
            description:
                "Get the current leave balance for the user (sick leave and vacation days)".into(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        FunctionDecl {
            name: Function::SubmitLeaveRequest.as_ref().to_string(),
            description: "Submit a leave request for the user".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["sick", "vacation", "personal"],
                        "description": "The type of leave"
                    },
                    "start_date": {
                        "type": "string",
                        "description": "Start date in YYYY-MM-DD format"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "End date in YYYY-MM-DD format"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Reason for the leave request"
                    }
                },
                "required": ["type", "start_date", "end_date"]
            }),
        },
        FunctionDecl {
            name: Function::SearchKnowledgeBase.as_ref().to_string(),
            description:
                "Search the company knowledge base for policies, procedures, and information"
                    .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "category": {
                        "type": "string",
                        "enum": ["policies", "benefits", "procedures", "faq"],
                        "description": "Optional category to filter results"
                    }
                },
                "required": ["query"]
            }),
        },
    ]
});

#[derive(Deserialize)]
struct SubmitLeaveArgs {
    #[serde(rename = "type")]
    leave_type: LeaveType,
    start_date: String,
    end_date: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    category: Option<Category>,
}

fn typed_args<T: for<'de> Deserialize<'de>>(
    function: Function,
    arguments: &Value,
) -> Result<T, AppError> {
    serde_json::from_value(arguments.clone()).map_err(|e| {
        AppError::InvalidInput(format!("Invalid arguments for {}: {e}", function.as_ref()))
    })
}

/// Maps function names from the model onto ledger and knowledge operations.
///
/// The acting user is always the caller of the chat turn; identities in the
/// arguments are never consulted.
#[derive(Clone)]
pub struct FunctionRegistry {
    ledger: LeaveLedger,
    knowledge: KnowledgeSearch,
}

impl FunctionRegistry {
    pub fn new(ledger: LeaveLedger, knowledge: KnowledgeSearch) -> Self {
        Self { ledger, knowledge }
    }

    pub fn declarations(&self) -> &'static [FunctionDecl] {
        &DECLARATIONS
    }

    #[instrument(skip(self, arguments))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &Value,
        user_id: u64,
    ) -> Result<Value, AppError> {
        let function: Function = name
            .parse()
            .map_err(|_| AppError::UnknownFunction(name.to_string()))?;

        let result = match function {
            Function::GetLeaveBalance => json!(self.ledger.balance(user_id).await?),
            Function::SubmitLeaveRequest => {
                let args: SubmitLeaveArgs = typed_args(function, arguments)?;
                let start = parse_date("start_date", &args.start_date)?;
                let end = parse_date("end_date", &args.end_date)?;
                let created = self
                    .ledger
                    .submit_without_balance_check(user_id, args.leave_type, start, end, args.reason)
                    .await?;
                json!(created)
            }
            Function::SearchKnowledgeBase => {
                let args: SearchArgs = typed_args(function, arguments)?;
                let articles = self
                    .knowledge
                    .search(&args.query, args.category, ASSISTANT_RESULT_LIMIT)
                    .await?;
                Value::Array(
                    articles
                        .into_iter()
                        .map(|a| {
                            json!({
                                "id": a.id,
                                "title": a.title,
                                "content": a.content,
                                "category": a.category,
                            })
                        })
                        .collect(),
                )
            }
        };

        info!("Function executed");
        Ok(result)
    }
}
