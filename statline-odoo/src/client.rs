//! Odoo endpoints and the statement-ledger operations built on them.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::{OdooError, Result};
use crate::xmlrpc::{self, Value};

const STATEMENT_MODEL: &str = "account.bank.statement";
const IMPORT_MODEL: &str = "account.statement.import";

/// Connection parameters for one Odoo instance.
#[derive(Debug, Clone)]
pub struct OdooClient {
    http: reqwest::Client,
    base_url: String,
    db: String,
    username: String,
    password: String,
}

/// An authenticated user id. Created once per run, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OdooSession {
    pub uid: i64,
}

/// A statement file staged for upload: name plus base64-encoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub file_name: String,
    pub payload: String,
}

impl OdooClient {
    pub fn new(base_url: &str, db: &str, username: &str, password: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            db: db.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    async fn call(&self, endpoint: &str, method: &str, params: &[Value]) -> Result<Value> {
        let body = xmlrpc::encode_call(method, params)?;
        debug!(endpoint, method, "XML-RPC call");
        let resp = self
            .http
            .post(format!("{}/xmlrpc/2/{endpoint}", self.base_url))
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(OdooError::Status(status));
        }
        let text = resp.text().await?;
        xmlrpc::decode_response(text.as_bytes())
    }

    /// One authentication round against `/xmlrpc/2/common`.
    ///
    /// Odoo answers the user id on success and boolean false on bad
    /// credentials.
    pub async fn authenticate(&self) -> Result<OdooSession> {
        let params = [
            Value::Str(self.db.clone()),
            Value::Str(self.username.clone()),
            Value::Str(self.password.clone()),
            Value::Struct(Vec::new()),
        ];
        match self.call("common", "authenticate", &params).await? {
            Value::Int(uid) if uid > 0 => {
                debug!(uid, "authenticated");
                Ok(OdooSession { uid })
            }
            Value::Bool(false) => Err(OdooError::AuthRejected(self.username.clone())),
            other => Err(OdooError::Protocol(format!(
                "unexpected authenticate answer: {other:?}"
            ))),
        }
    }

    /// Generic model-method invocation against `/xmlrpc/2/object`.
    pub async fn execute_kw(
        &self,
        session: &OdooSession,
        model: &str,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        let params = [
            Value::Str(self.db.clone()),
            Value::Int(session.uid),
            Value::Str(self.password.clone()),
            Value::Str(model.to_string()),
            Value::Str(method.to_string()),
            args,
        ];
        self.call("object", "execute_kw", &params).await
    }
}

/// The two remote operations the import workflow depends on.
#[async_trait]
pub trait StatementLedger {
    /// Is a bank statement with exactly this name already recorded?
    async fn statement_exists(&self, statement_id: &str) -> Result<bool>;

    /// Stage the file and trigger its import; returns the staging record id.
    async fn upload_and_import(&self, record: &UploadRecord) -> Result<i64>;
}

/// Client plus session, bound together for the duration of one run.
#[derive(Debug, Clone)]
pub struct OdooLedger {
    client: OdooClient,
    session: OdooSession,
}

impl OdooLedger {
    pub fn new(client: OdooClient, session: OdooSession) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &OdooSession {
        &self.session
    }
}

#[async_trait]
impl StatementLedger for OdooLedger {
    async fn statement_exists(&self, statement_id: &str) -> Result<bool> {
        let domain = Value::Array(vec![Value::Array(vec![Value::Array(vec![
            Value::Str("name".to_string()),
            Value::Str("=".to_string()),
            Value::Str(statement_id.to_string()),
        ])])]);
        let found = self
            .client
            .execute_kw(&self.session, STATEMENT_MODEL, "search", domain)
            .await?;
        match found {
            Value::Array(ids) => Ok(!ids.is_empty()),
            other => Err(OdooError::Protocol(format!(
                "unexpected search answer: {other:?}"
            ))),
        }
    }

    async fn upload_and_import(&self, record: &UploadRecord) -> Result<i64> {
        let fields = Value::Struct(vec![
            (
                "statement_filename".to_string(),
                Value::Str(record.file_name.clone()),
            ),
            (
                "statement_file".to_string(),
                Value::Str(record.payload.clone()),
            ),
        ]);
        let created = self
            .client
            .execute_kw(&self.session, IMPORT_MODEL, "create", Value::Array(vec![fields]))
            .await?;
        let record_id = created
            .as_i64()
            .ok_or_else(|| OdooError::Protocol("create returned no record id".to_string()))?;

        // Second call is not atomic with the first; a failure here leaves a
        // staged record behind for Odoo-side cleanup.
        self.client
            .execute_kw(
                &self.session,
                IMPORT_MODEL,
                "import_file_button",
                Value::Array(vec![Value::Array(vec![Value::Int(record_id)])]),
            )
            .await?;
        Ok(record_id)
    }
}
