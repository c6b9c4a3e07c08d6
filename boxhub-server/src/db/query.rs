//! List Query
//!
//! Filtered, searched, sorted and paginated reads with a total count.
//! Field names only ever come from caller-supplied whitelists; every value is
//! bound as a parameter.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::repository::RepoResult;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Common `?page=&limit=&sort=&search=` parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub search: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
struct CountResult {
    total: u64,
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    table: &'static str,
    conditions: Vec<String>,
    bindings: Vec<(String, Value)>,
    order_by: String,
    limit: u32,
    start: u64,
}

impl ListQuery {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            bindings: Vec::new(),
            order_by: "created_at DESC".to_string(),
            limit: DEFAULT_LIMIT,
            start: 0,
        }
    }

    fn bind_next(&mut self, value: Value) -> String {
        let name = format!("f{}", self.bindings.len());
        self.bindings.push((name.clone(), value));
        name
    }

    /// `field = value`
    pub fn filter_eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        let param = self.bind_next(value.into());
        self.conditions.push(format!("{field} = ${param}"));
        self
    }

    /// Case-insensitive substring match over any of `fields`; blank terms are ignored
    pub fn search(mut self, fields: &[&'static str], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        if fields.is_empty() {
            return self;
        }
        let param = self.bind_next(Value::String(term.to_lowercase()));
        let clause = fields
            .iter()
            .map(|f| format!("string::contains(string::lowercase({f} ?? ''), ${param})"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.conditions.push(format!("({clause})"));
        self
    }

    /// Apply `sort` (`field` ascending, `-field` descending) when the field is
    /// in `allowed`; otherwise keep `default`.
    pub fn sort(mut self, sort: Option<&str>, allowed: &[&'static str], default: &str) -> Self {
        self.order_by = default.to_string();
        if let Some(raw) = sort.map(str::trim) {
            let (field, direction) = match raw.strip_prefix('-') {
                Some(field) => (field, "DESC"),
                None => (raw, "ASC"),
            };
            if let Some(field) = allowed.iter().find(|a| **a == field) {
                self.order_by = format!("{field} {direction}");
            }
        }
        self
    }

    pub fn page(mut self, page: u32, limit: u32) -> Self {
        let limit = limit.clamp(1, MAX_LIMIT);
        self.limit = limit;
        self.start = u64::from(page.max(1) - 1) * u64::from(limit);
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Rendered `(count, select)` statements
    fn statements(&self) -> (String, String) {
        let where_clause = self.where_clause();
        let count_sql = format!(
            "SELECT count() AS total FROM {}{} GROUP ALL",
            self.table, where_clause
        );
        let select_sql = format!(
            "SELECT * FROM {}{} ORDER BY {} LIMIT {} START {}",
            self.table, where_clause, self.order_by, self.limit, self.start
        );
        (count_sql, select_sql)
    }

    /// Run the query, returning the page and the total match count
    pub async fn execute<T: DeserializeOwned>(self, db: &Surreal<Db>) -> RepoResult<(Vec<T>, u64)> {
        let (count_sql, select_sql) = self.statements();
        let mut qb = db.query(format!("{count_sql}; {select_sql}"));
        for (name, value) in self.bindings {
            qb = qb.bind((name, value));
        }

        let mut result = qb.await?;
        let counts: Vec<CountResult> = result.take(0)?;
        let total = counts.first().map(|c| c.total).unwrap_or(0);
        let rows: Vec<T> = result.take(1)?;
        Ok((rows, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_bind_values() {
        let query = ListQuery::new("product")
            .filter_eq("category", "snacks")
            .filter_eq("is_active", true)
            .search(&["name", "description"], Some("  Tea "))
            .sort(Some("-price"), &["price", "name"], "created_at DESC")
            .page(3, 10);

        let (count_sql, select_sql) = query.statements();
        assert_eq!(
            count_sql,
            "SELECT count() AS total FROM product WHERE category = $f0 AND is_active = $f1 AND \
             (string::contains(string::lowercase(name ?? ''), $f2) OR \
             string::contains(string::lowercase(description ?? ''), $f2)) GROUP ALL"
        );
        assert!(select_sql.ends_with("ORDER BY price DESC LIMIT 10 START 20"));
        assert_eq!(query.bindings[2].1, Value::String("tea".into()));
    }

    #[test]
    fn test_unknown_sort_field_falls_back() {
        let query = ListQuery::new("orders").sort(
            Some("password_hash; DELETE orders"),
            &["created_at"],
            "created_at DESC",
        );
        let (_, select_sql) = query.statements();
        assert!(select_sql.contains("ORDER BY created_at DESC"));
        assert!(!select_sql.contains("DELETE"));
    }

    #[test]
    fn test_params_clamped() {
        let params = ListParams {
            page: Some(0),
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_LIMIT);
    }

    #[derive(Debug, Deserialize)]
    struct Row {
        n: i64,
    }

    #[tokio::test]
    async fn test_execute_paginates() {
        let service = crate::db::DbService::in_memory().await.unwrap();
        for n in 0..7 {
            service
                .db
                .query("CREATE contact_message CONTENT { n: $n, created_at: $n }")
                .bind(("n", n))
                .await
                .unwrap();
        }
        let (rows, total): (Vec<Row>, u64) = ListQuery::new("contact_message")
            .sort(Some("n"), &["n"], "created_at DESC")
            .page(2, 3)
            .execute(&service.db)
            .await
            .unwrap();
        assert_eq!(total, 7);
        assert_eq!(rows.iter().map(|r| r.n).collect::<Vec<_>>(), vec![3, 4, 5]);
    }
}
