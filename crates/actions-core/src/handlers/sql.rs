//! SQL handler. Every query goes through submit, poll until terminal, then
//! fetch.

use super::{HandlerContext, SqlOp};
use crate::envelope::ActionRequest;
use crate::error::{ActionError, Result};
use crate::poll::{ExecutionState, Poller};
use crate::spill::Payload;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub const GET_SCHEMA: &str = "/getschema";
pub const QUERY: &str = "/queryathena";

type Rows = Vec<Vec<Option<String>>>;

pub async fn run(op: SqlOp, ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    match op {
        SqlOp::GetSchema => get_schema(ctx, request).await,
        SqlOp::Query => query(ctx, request).await,
    }
}

async fn get_schema(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let database = match request.parameters.get("database") {
        Some(db) => validate_identifier("database", db)?,
        None => configured_database(ctx)?,
    };
    let rows = execute(ctx, &schema_sql(database), database).await?;
    Ok(Payload::Json(group_columns(&rows)))
}

async fn query(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let sql = request.parameters.require("query")?;
    let rows = execute(ctx, sql, configured_database(ctx)?).await?;
    Ok(Payload::Json(rows_to_objects(&rows)))
}

async fn execute(ctx: &HandlerContext<'_>, sql: &str, database: &str) -> Result<Rows> {
    let engine = ctx.backends.sql.as_ref();
    let execution_id = engine.start_query(sql, database).await?;
    info!(execution_id = %execution_id, database, "query submitted");

    let policy = ctx.config.sql.poll.policy();
    let what = format!("query {execution_id}");
    let id = execution_id.as_str();
    let state = Poller::new(&policy, ctx.backends.sleeper.as_ref())
        .until_terminal(&what, move || engine.query_state(id))
        .await?;

    match state {
        ExecutionState::Succeeded => engine.fetch_rows(id).await,
        ExecutionState::Failed { reason } => {
            let reason = reason.unwrap_or_else(|| "Unknown error".to_string());
            warn!(execution_id = %execution_id, reason = %reason, "query failed");
            Err(ActionError::QueryFailed(reason))
        }
        ExecutionState::Cancelled => Err(ActionError::QueryCancelled),
        other => Err(ActionError::backend(
            "sql",
            format!("{what} stopped in non-terminal state {other}"),
        )),
    }
}

fn schema_sql(database: &str) -> String {
    format!(
        "SELECT table_name, column_name, data_type \
         FROM information_schema.columns \
         WHERE table_schema = '{database}' \
         ORDER BY table_name, ordinal_position"
    )
}

/// Letters, digits and underscores only, 1 to 255 characters.
pub(crate) fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 255
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn configured_database<'a>(ctx: &HandlerContext<'a>) -> Result<&'a str> {
    let database = ctx.config.sql.database.as_str();
    if !is_identifier(database) {
        return Err(ActionError::Configuration(format!(
            "sql.database '{database}' is not a valid identifier"
        )));
    }
    Ok(database)
}

fn validate_identifier<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if !is_identifier(value) {
        return Err(ActionError::invalid(
            name,
            "only letters, digits and underscores are allowed",
        ));
    }
    Ok(value)
}

fn cell(row: &[Option<String>], index: usize) -> String {
    row.get(index).cloned().flatten().unwrap_or_default()
}

/// `[{"table_name": .., "columns": [[name, type], ..]}, ..]`, tables in the
/// order the rows list them.
fn group_columns(rows: &Rows) -> Value {
    let mut tables: Vec<(String, Vec<Value>)> = Vec::new();
    for row in rows.iter().skip(1) {
        let table = cell(row, 0);
        let column = json!([cell(row, 1), cell(row, 2)]);
        match tables.iter_mut().find(|(name, _)| *name == table) {
            Some((_, columns)) => columns.push(column),
            None => tables.push((table, vec![column])),
        }
    }
    Value::Array(
        tables
            .into_iter()
            .map(|(table_name, columns)| json!({ "table_name": table_name, "columns": columns }))
            .collect(),
    )
}

/// One header -> value object per data row. Missing values become "".
fn rows_to_objects(rows: &Rows) -> Value {
    let Some((header, data)) = rows.split_first() else {
        return Value::Array(Vec::new());
    };
    let headers: Vec<String> = header.iter().map(|h| h.clone().unwrap_or_default()).collect();
    Value::Array(
        data.iter()
            .map(|row| {
                let object: Map<String, Value> = headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), Value::String(cell(row, i))))
                    .collect();
                Value::Object(object)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[Option<&str>]]) -> Rows {
        raw.iter()
            .map(|r| r.iter().map(|c| c.map(String::from)).collect())
            .collect()
    }

    #[test]
    fn schema_rows_group_by_table_in_order() {
        let value = group_columns(&rows(&[
            &[Some("table_name"), Some("column_name"), Some("data_type")],
            &[Some("frpm"), Some("cdscode"), Some("varchar")],
            &[Some("frpm"), Some("enrollment"), Some("integer")],
            &[Some("schools"), Some("cdscode"), Some("varchar")],
        ]));
        assert_eq!(
            value,
            json!([
                {"table_name":"frpm","columns":[["cdscode","varchar"],["enrollment","integer"]]},
                {"table_name":"schools","columns":[["cdscode","varchar"]]}
            ])
        );
    }

    #[test]
    fn query_rows_become_header_keyed_objects() {
        let value = rows_to_objects(&rows(&[
            &[Some("county"), Some("schools")],
            &[Some("Alameda"), Some("12")],
            &[Some("Alpine"), None],
            &[Some("Amador")],
        ]));
        assert_eq!(
            value,
            json!([
                {"county":"Alameda","schools":"12"},
                {"county":"Alpine","schools":""},
                {"county":"Amador","schools":""}
            ])
        );
    }

    #[test]
    fn empty_result_is_empty_array() {
        assert_eq!(rows_to_objects(&Vec::new()), json!([]));
        assert_eq!(group_columns(&Vec::new()), json!([]));
    }

    #[test]
    fn database_identifier_is_validated() {
        assert_eq!(validate_identifier("database", "california_schools").unwrap(), "california_schools");
        let err = validate_identifier("database", "x'; DROP TABLE y; --").unwrap_err();
        assert!(err.is_reprompt());
    }
}
