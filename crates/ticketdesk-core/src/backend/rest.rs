use serde_json::{Map, Value};
use std::time::Duration;

use super::{BackendError, DataApi, SelectQuery};
use crate::model::TicketId;

/// [`DataApi`] over HTTP against a PostgREST-style gateway.
///
/// Tables live at `<base>/rest/v1/<table>`, functions at
/// `<base>/rest/v1/rpc/<function>`. Every request carries the project key as
/// both `apikey` and bearer token.
pub struct RestClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl RestClient {
    #[must_use]
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("ticketdesk/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{function}", self.base_url)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Accept", "application/json")
    }
}

fn map_error(err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(status, response) => BackendError::Status {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => BackendError::Transport(transport.to_string()),
    }
}

fn read_rows(response: ureq::Response) -> Result<Vec<Value>, BackendError> {
    response
        .into_json::<Vec<Value>>()
        .map_err(|e| BackendError::Decode(e.to_string()))
}

impl DataApi for RestClient {
    fn select_page(
        &self,
        query: &SelectQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, BackendError> {
        let mut request = self
            .request("GET", &self.table_url(&query.table))
            .query("select", &query.columns)
            .query("offset", &offset.to_string())
            .query("limit", &limit.to_string());
        if let Some((column, ascending)) = &query.order {
            let direction = if *ascending { "asc" } else { "desc" };
            request = request.query("order", &format!("{column}.{direction}"));
        }

        tracing::debug!(table = %query.table, offset, limit, "select page");
        let response = request.call().map_err(map_error)?;
        read_rows(response)
    }

    fn update(
        &self,
        table: &str,
        id: TicketId,
        fields: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        tracing::debug!(table, id, columns = fields.len(), "update row");
        let response = self
            .request("PATCH", &self.table_url(table))
            .query("id", &format!("eq.{id}"))
            .set("Prefer", "return=representation")
            .send_json(fields)
            .map_err(map_error)?;

        read_rows(response)?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound {
                table: table.to_string(),
                id,
            })
    }

    fn insert(&self, table: &str, rows: &[Value]) -> Result<Vec<Value>, BackendError> {
        tracing::debug!(table, rows = rows.len(), "insert rows");
        let response = self
            .request("POST", &self.table_url(table))
            .set("Prefer", "return=representation")
            .send_json(rows)
            .map_err(map_error)?;
        read_rows(response)
    }

    fn rpc(&self, function: &str, args: &Value) -> Result<Value, BackendError> {
        tracing::debug!(function, "rpc call");
        let response = self
            .request("POST", &self.rpc_url(function))
            .send_json(args)
            .map_err(map_error)?;

        let body = response
            .into_string()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}
