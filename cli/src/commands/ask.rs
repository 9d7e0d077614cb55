use clap::Args;
use serde_json::{Value, json};

use crate::util::{api_request, read_json_from_file, usage_error};

const CONTEXT_FIELDS: &[&str] = &[
    "profile",
    "metrics",
    "symptoms",
    "medicalReports",
    "messageHistory",
];

#[derive(Args)]
pub struct AskArgs {
    /// The health question to ask
    pub query: String,

    /// JSON file with optional context: profile, metrics, symptoms,
    /// medicalReports, messageHistory (use '-' for stdin)
    #[arg(long, short = 'c')]
    pub context_file: Option<String>,
}

/// Combine the question with optional context into a query request body.
/// Unknown keys in the context are ignored.
pub fn build_query_body(query: &str, context: Option<Value>) -> Result<Value, String> {
    let mut body = json!({ "query": query });
    match context {
        None => {}
        Some(Value::Object(fields)) => {
            for (key, value) in fields {
                if CONTEXT_FIELDS.contains(&key.as_str()) {
                    body[key] = value;
                }
            }
        }
        Some(_) => return Err("Context file must contain a JSON object".to_string()),
    }
    Ok(body)
}

/// Read the optional context file and build the request body.
fn load_body(args: &AskArgs) -> Result<Value, (String, &'static str)> {
    let context = args
        .context_file
        .as_deref()
        .map(read_json_from_file)
        .transpose()
        .map_err(|e| (e, "Provide a valid JSON file or use '-' for stdin"))?;

    build_query_body(&args.query, context).map_err(|e| {
        (
            e,
            "Example: {\"symptoms\": [{\"type\": \"headache\", \"severity\": \"mild\"}]}",
        )
    })
}

pub async fn run(api_url: &str, args: AskArgs, raw: bool) -> i32 {
    match load_body(&args) {
        Ok(body) => api_request(api_url, reqwest::Method::POST, "/api/query", Some(body), raw).await,
        Err((message, hint)) => usage_error(&message, Some(hint)),
    }
}
