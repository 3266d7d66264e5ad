use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool, types::Json};

use crate::quote_qualified_identifier;

/// A row keyed by column name.
pub type JsonRow = Map<String, Value>;

/// Returns the subset of `keys` already present in `table.column`.
///
/// Keys are compared in their text form so the column type does not matter.
pub async fn fetch_existing_keys(
    pool: &PgPool,
    table: &str,
    column: &str,
    keys: &[String],
) -> sqlx::Result<Vec<String>> {
    let table = quote_qualified_identifier(table);
    let column = quote_qualified_identifier(column);
    let query = format!(
        r#"
        select distinct {column}::text
        from {table}
        where {column}::text = any($1)
        "#
    );

    sqlx::query_scalar::<_, String>(&query)
        .bind(keys)
        .fetch_all(pool)
        .await
}

/// Fetches the first row of `table` whose `column` equals `value`, as a JSON object.
pub async fn fetch_row(
    pool: &PgPool,
    table: &str,
    column: &str,
    value: &str,
) -> sqlx::Result<Option<JsonRow>> {
    let table = quote_qualified_identifier(table);
    let column = quote_qualified_identifier(column);
    let query = format!(
        r#"
        select to_jsonb(t)
        from {table} as t
        where t.{column}::text = $1
        limit 1
        "#
    );

    let row = sqlx::query_scalar::<_, Json<JsonRow>>(&query)
        .bind(value)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| row.0))
}

/// Bulk inserts `rows` into `table` with a single statement.
///
/// Rows are shipped as one `jsonb` array and expanded with `jsonb_populate_recordset`, so
/// every cell is converted to the declared column type by Postgres. Columns are the union of
/// the keys of all rows; a key missing from a row is inserted as `null`.
///
/// Runs on the given connection, which is expected to be inside the caller's transaction.
pub async fn insert_json_rows(
    connection: &mut PgConnection,
    table: &str,
    rows: &[JsonRow],
) -> sqlx::Result<u64> {
    let columns = collect_columns(rows);
    if columns.is_empty() {
        return Ok(0);
    }

    let table = quote_qualified_identifier(table);
    let columns = columns
        .iter()
        .map(|column| quote_qualified_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        r#"
        insert into {table} ({columns})
        select {columns}
        from jsonb_populate_recordset(null::{table}, $1)
        "#
    );

    let result = sqlx::query(&query)
        .bind(Json(rows))
        .execute(&mut *connection)
        .await?;

    Ok(result.rows_affected())
}

/// Column names across `rows` in first-seen order.
fn collect_columns(rows: &[JsonRow]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    columns
}
