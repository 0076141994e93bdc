//! REST クエリ API の絞り込み・並び替えパラメータを組み立てるビルダー。

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::{DatastoreClient, DatastoreError, Result};

/// 1 テーブルに対するクエリ。`col=eq.value` 形式のパラメータとしてエンコードされる。
#[must_use]
pub struct Query<'a> {
    client: &'a DatastoreClient,
    table: String,
    params: Vec<(String, String)>,
}

impl<'a> Query<'a> {
    pub(super) fn new(client: &'a DatastoreClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    /// 取得する列。埋め込みリレーション（`room:rooms(id,name)`）も指定できる。
    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lt(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "lt", value)
    }

    pub fn order(self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.param("order", format!("{column}.{direction}"))
    }

    pub fn limit(self, count: usize) -> Self {
        self.param("limit", count.to_string())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn filter(self, column: &str, operator: &str, value: impl ToString) -> Self {
        self.param(column, format!("{operator}.{}", value.to_string()))
    }

    fn param(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    /// 条件に合う行をすべて取得する。
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        let request = self
            .client
            .http
            .get(self.client.rest_url(&self.table))
            .query(&self.params);
        let rows: Vec<T> = self.client.send_json(request).await?;
        debug!(table = %self.table, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// 最初の 1 行を取得する。該当行がなければ None。
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>> {
        Ok(self.limit(1).fetch().await?.into_iter().next())
    }

    /// 最初の 1 行を取得する。該当行がなければ [`DatastoreError::NotFound`]。
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T> {
        let table = self.table.clone();
        self.fetch_optional()
            .await?
            .ok_or(DatastoreError::NotFound { table })
    }

    /// 条件に合う行を更新する。
    pub async fn update<P: Serialize + ?Sized>(self, payload: &P) -> Result<()> {
        let request = self
            .client
            .http
            .patch(self.client.rest_url(&self.table))
            .query(&self.params)
            .header("Prefer", "return=minimal")
            .json(payload);
        self.client.send(request).await?;
        debug!(table = %self.table, "Updated rows");
        Ok(())
    }

    /// 条件に合う行を削除する。
    pub async fn delete(self) -> Result<()> {
        let request = self
            .client
            .http
            .delete(self.client.rest_url(&self.table))
            .query(&self.params)
            .header("Prefer", "return=minimal");
        self.client.send(request).await?;
        debug!(table = %self.table, "Deleted rows");
        Ok(())
    }
}
