//! The Postgres connection pool and retrieval queries.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgPool, Row};

use crate::config::{DatabaseConfig, Filter, TableSource};

use super::filter::build_filter_clause;
use super::{quote_identifier, quote_table, DbError, DocumentStore, SearchResult};

/// A pooled Postgres connection for one pipeline.
#[derive(Clone)]
pub struct Pool {
    pool: PgPool,
}

/// Format a query vector as a pgvector literal: `[x1,x2,…]`. The literal
/// is bound as text and cast with `::vector` at the call site.
pub fn format_vector(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| format!("{v}")).collect();
    format!("[{}]", parts.join(","))
}

fn parse_ssl_mode(mode: &str) -> PgSslMode {
    match mode {
        "disable" => PgSslMode::Disable,
        "allow" => PgSslMode::Allow,
        "prefer" => PgSslMode::Prefer,
        "require" => PgSslMode::Require,
        "verify-ca" => PgSslMode::VerifyCa,
        "verify-full" => PgSslMode::VerifyFull,
        _ => PgSslMode::Prefer,
    }
}

/// Username resolution: config > PGUSER > USER.
fn resolve_username(configured: &str) -> Option<String> {
    if !configured.is_empty() {
        return Some(configured.to_string());
    }
    if let Ok(user) = std::env::var("PGUSER") {
        if !user.is_empty() {
            return Some(user);
        }
    }
    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return Some(user);
        }
    }
    None
}

fn connect_options(cfg: &DatabaseConfig) -> PgConnectOptions {
    let mut opts = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .database(&cfg.database)
        .ssl_mode(parse_ssl_mode(&cfg.ssl_mode));

    if let Some(username) = resolve_username(&cfg.username) {
        opts = opts.username(&username);
    }
    if !cfg.password.is_empty() {
        opts = opts.password(&cfg.password);
    }
    if !cfg.ssl_cert.is_empty() {
        opts = opts.ssl_client_cert(&cfg.ssl_cert);
    }
    if !cfg.ssl_key.is_empty() {
        opts = opts.ssl_client_key(&cfg.ssl_key);
    }
    if !cfg.ssl_root_ca.is_empty() {
        opts = opts.ssl_root_cert(&cfg.ssl_root_ca);
    }

    opts
}

/// Bind a JSON filter value onto a query with its natural Postgres type.
fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    value: &'q serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    use serde_json::Value;

    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.clone()),
    }
}

impl Pool {
    /// Open a connection pool and verify connectivity with a ping.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options(cfg))
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Verify the database connection.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Pool {
    async fn vector_search(
        &self,
        embedding: &[f32],
        table: &TableSource,
        top_n: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchResult>, DbError> {
        // $1 is the query vector and $2 the limit, so filters start at $3
        let (filter_clause, filter_args) =
            build_filter_clause(table.filter.as_ref(), filter, 3)?;

        let vec_col = quote_identifier(&table.vector_column);
        // The <=> operator is cosine distance; subtract from 1 for similarity
        let query = format!(
            "SELECT {text_col} AS content, 1 - ({vec_col} <=> $1::vector) AS score \
             FROM {table_name}{filter_clause} \
             ORDER BY {vec_col} <=> $1::vector \
             LIMIT $2",
            text_col = quote_identifier(&table.text_column),
            table_name = quote_table(&table.table),
        );

        let mut q = sqlx::query(&query)
            .bind(format_vector(embedding))
            .bind(top_n as i64);
        for arg in &filter_args {
            q = bind_value(q, arg);
        }

        let rows = q.fetch_all(&self.pool).await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(SearchResult {
                id: None,
                content: row.try_get("content")?,
                score: row.try_get("score")?,
            });
        }
        Ok(results)
    }

    async fn fetch_documents(
        &self,
        table: &TableSource,
        filter: Option<&Filter>,
    ) -> Result<Vec<(String, String)>, DbError> {
        let (filter_clause, filter_args) =
            build_filter_clause(table.filter.as_ref(), filter, 1)?;

        let text_col = quote_identifier(&table.text_column);
        let base_condition = format!("{text_col} IS NOT NULL");

        let where_clause = if filter_clause.is_empty() {
            format!(" WHERE {base_condition}")
        } else {
            format!("{filter_clause} AND {base_condition}")
        };

        // Use the configured id column, or ROW_NUMBER() for views and
        // tables without an explicit id
        let id_expr = if table.id_column.is_empty() {
            "ROW_NUMBER() OVER()::text".to_string()
        } else {
            format!("{}::text", quote_identifier(&table.id_column))
        };

        let query = format!(
            "SELECT {id_expr} AS id, {text_col} AS content FROM {table_name}{where_clause}",
            table_name = quote_table(&table.table),
        );

        let mut q = sqlx::query(&query);
        for arg in &filter_args {
            q = bind_value(q, arg);
        }

        let rows = q.fetch_all(&self.pool).await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push((row.try_get("id")?, row.try_get("content")?));
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_vector() {
        assert_eq!(format_vector(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(format_vector(&[1.0, -2.5]), "[1,-2.5]");
        assert_eq!(format_vector(&[]), "[]");
    }

    #[test]
    fn test_parse_ssl_mode() {
        assert!(matches!(parse_ssl_mode("disable"), PgSslMode::Disable));
        assert!(matches!(parse_ssl_mode("verify-full"), PgSslMode::VerifyFull));
        // Unknown values fall back to prefer; validation rejects them earlier
        assert!(matches!(parse_ssl_mode(""), PgSslMode::Prefer));
    }

    #[test]
    fn test_resolve_username_prefers_config() {
        assert_eq!(resolve_username("alice"), Some("alice".to_string()));
    }
}
