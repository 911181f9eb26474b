use super::{HandlerContext, WebSearchOp};
use crate::backends::SearchQuery;
use crate::envelope::ActionRequest;
use crate::error::Result;
use crate::spill::Payload;
use tracing::debug;

pub const WEB_SEARCH: &str = "web_search";

pub async fn run(op: WebSearchOp, ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    match op {
        WebSearchOp::Search => search(ctx, request).await,
    }
}

async fn search(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let params = &request.parameters;
    let query = SearchQuery {
        query: params.require("search_query")?.to_string(),
        target_website: params.get("target_website").map(String::from),
        topic: params.get("topic").map(String::from),
        days: params.parse::<u32>("days")?,
    };

    let results = ctx.backends.search.search(&query).await?;
    debug!(bytes = results.len(), "query results");
    Ok(Payload::Text(format!(
        "Here are the top search results for the query '{}': {} ",
        query.query, results
    )))
}
