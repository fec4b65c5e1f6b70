//! Remote authorization delegate.
//!
//! Questions that depend on store-held state (facility grants, conditional
//! permissions) are forwarded to the store's procedures. A call that cannot
//! be completed resolves to [`Outcome::Unknown`], which callers must treat
//! as "deny" when gating and as "show nothing" when displaying.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::rpc::{
    CheckMethod, ConditionalPermissionRequest, EffectiveRoleRequest, FacilityRoleRecord,
    FacilityRoleRequest, PermissionUsage, Procedure, RpcErrorBody, RpcResponse,
};
use crate::{AccessContext, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DelegateError {
    #[error("{procedure} timed out after {elapsed_ms}ms")]
    Timeout {
        procedure: &'static str,
        elapsed_ms: u64,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request rejected with {status} ({code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
    #[error("malformed payload: {0}")]
    Decode(String),
}

impl DelegateError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DelegateError::Timeout { .. }
                | DelegateError::Transport(_)
                | DelegateError::Server { .. }
        )
    }
}

/// Result of a remote check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Resolved(T),
    /// The store could not be asked. Neither an allow nor a deny.
    Unknown(DelegateError),
}

pub type Decision = Outcome<bool>;

impl<T> Outcome<T> {
    /// The value to render, or `None` while access cannot be verified.
    pub fn displayable(&self) -> Option<&T> {
        match self {
            Outcome::Resolved(value) => Some(value),
            Outcome::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Outcome::Unknown(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Resolved(value) => Outcome::Resolved(f(value)),
            Outcome::Unknown(err) => Outcome::Unknown(err),
        }
    }

    pub fn into_result(self) -> Result<T, DelegateError> {
        match self {
            Outcome::Resolved(value) => Ok(value),
            Outcome::Unknown(err) => Err(err),
        }
    }
}

impl Decision {
    /// Gate form of the decision: anything other than a resolved allow is a deny.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Resolved(true))
    }
}

/// Lifecycle of a single remote check as tracked by a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState<T> {
    #[default]
    Idle,
    InFlight,
    Resolved(T),
    Failed(DelegateError),
}

impl<T> From<Outcome<T>> for RequestState<T> {
    fn from(value: Outcome<T>) -> Self {
        match value {
            Outcome::Resolved(value) => RequestState::Resolved(value),
            Outcome::Unknown(err) => RequestState::Failed(err),
        }
    }
}

/// Audit writes get a single retry regardless of `max_retries`.
const AUDIT_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct DelegateConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// Per-attempt deadline.
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further attempt.
    pub backoff: Duration,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            token: None,
            timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff: Duration::from_millis(200),
        }
    }
}

impl DelegateConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };
        Self {
            base_url: lookup("AUTHZ_BASE_URL").unwrap_or(defaults.base_url),
            token: lookup("AUTHZ_TOKEN"),
            timeout: millis("AUTHZ_TIMEOUT_MS").unwrap_or(defaults.timeout),
            max_retries: lookup("AUTHZ_MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_retries),
            backoff: millis("AUTHZ_BACKOFF_MS").unwrap_or(defaults.backoff),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn call(&self, procedure: Procedure, payload: Value) -> Result<Value, DelegateError>;
}

/// Posts JSON to `{base_url}/rpc/{procedure}`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &DelegateConfig) -> Result<Self, DelegateError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| DelegateError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, procedure: Procedure, payload: Value) -> Result<Value, DelegateError> {
        let url = format!("{}/rpc/{}", self.base_url, procedure.name());
        let mut request = self.client.post(url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                DelegateError::Timeout {
                    procedure: procedure.name(),
                    elapsed_ms: 0,
                }
            } else {
                DelegateError::Transport(err.to_string())
            }
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DelegateError::Transport(err.to_string()))?;
        if status.is_success() {
            let parsed: RpcResponse<Value> = serde_json::from_str(&body)
                .map_err(|err| DelegateError::Decode(err.to_string()))?;
            return Ok(parsed.result);
        }
        let (code, message) = match serde_json::from_str::<RpcErrorBody>(&body) {
            Ok(body) => (body.error.code, body.error.message),
            Err(_) => ("UNKNOWN".to_string(), body),
        };
        if status.is_server_error() {
            Err(DelegateError::Server {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(DelegateError::Rejected {
                status: status.as_u16(),
                code,
                message,
            })
        }
    }
}

pub struct AuthorizationDelegate<T: RpcTransport> {
    transport: Arc<T>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
    degraded_audits: Arc<AtomicU64>,
}

impl<T: RpcTransport> Clone for AuthorizationDelegate<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            timeout: self.timeout,
            max_retries: self.max_retries,
            backoff: self.backoff,
            degraded_audits: self.degraded_audits.clone(),
        }
    }
}

impl AuthorizationDelegate<HttpTransport> {
    pub fn http(config: &DelegateConfig) -> Result<Self, DelegateError> {
        Ok(Self::new(HttpTransport::new(config)?, config))
    }
}

impl<T: RpcTransport> AuthorizationDelegate<T> {
    pub fn new(transport: T, config: &DelegateConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            timeout: config.timeout,
            max_retries: config.max_retries,
            backoff: config.backoff,
            degraded_audits: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of audit writes that were given up on.
    pub fn degraded_audit_count(&self) -> u64 {
        self.degraded_audits.load(Ordering::Relaxed)
    }

    /// Bootstrap check: is there already a national administrator?
    pub async fn check_has_elevated_users(&self) -> Decision {
        self.invoke(Procedure::HasNationalUsers, &serde_json::Map::new())
            .await
    }

    pub async fn get_effective_role_for_facility(
        &self,
        user_id: Uuid,
        facility_id: Uuid,
    ) -> Outcome<Option<Role>> {
        let request = EffectiveRoleRequest {
            user_id,
            facility_id,
        };
        self.invoke::<_, Option<String>>(Procedure::GetEffectiveRoleForFacility, &request)
            .await
            .map(|code| code.as_deref().map(Role::from_external))
    }

    /// Evaluate a time- or location-gated grant. A resolved decision is
    /// recorded in the audit trail without waiting for the write.
    pub async fn check_conditional_permission(
        &self,
        user_id: Uuid,
        facility_id: Uuid,
        permission_name: &str,
        context: AccessContext,
    ) -> Decision {
        let request = ConditionalPermissionRequest {
            user_id,
            facility_id,
            permission_name: permission_name.to_string(),
            context,
        };
        let decision = self
            .invoke(Procedure::CheckConditionalPermissions, &request)
            .await;
        if let Outcome::Resolved(granted) = &decision {
            self.spawn_audit(PermissionUsage {
                id: None,
                user_id,
                permission_name: request.permission_name,
                resource_type: "facility".into(),
                resource_id: Some(facility_id.to_string()),
                facility_id: Some(facility_id),
                granted: *granted,
                method: CheckMethod::Conditional,
            });
        }
        decision
    }

    /// Records one usage row. The write is retried once under a fixed id, so
    /// a resend after a lost reply does not duplicate the row.
    pub async fn log_permission_usage(&self, usage: &PermissionUsage) -> Outcome<()> {
        let keyed = PermissionUsage {
            id: Some(usage.id.unwrap_or_else(Uuid::new_v4)),
            ..usage.clone()
        };
        self.invoke(Procedure::LogPermissionUsage, &keyed).await
    }

    pub async fn assign_facility_role(
        &self,
        user_id: Uuid,
        facility_id: Uuid,
        role: Role,
    ) -> Outcome<FacilityRoleRecord> {
        let request = FacilityRoleRequest {
            user_id,
            facility_id,
            role,
        };
        self.invoke(Procedure::AssignFacilityRole, &request).await
    }

    pub async fn revoke_facility_role(
        &self,
        user_id: Uuid,
        facility_id: Uuid,
        role: Role,
    ) -> Outcome<FacilityRoleRecord> {
        let request = FacilityRoleRequest {
            user_id,
            facility_id,
            role,
        };
        self.invoke(Procedure::RevokeFacilityRole, &request).await
    }

    fn spawn_audit(&self, usage: PermissionUsage) {
        let delegate = self.clone();
        tokio::spawn(async move {
            if let Outcome::Unknown(err) = delegate.log_permission_usage(&usage).await {
                delegate.degraded_audits.fetch_add(1, Ordering::Relaxed);
                warn!(
                    user_id = %usage.user_id,
                    permission = %usage.permission_name,
                    error = %err,
                    "permission audit write failed; audit trail degraded"
                );
            }
        });
    }

    #[instrument(name = "authz.delegate", skip_all, fields(procedure = %procedure))]
    async fn invoke<Req, Res>(&self, procedure: Procedure, request: &Req) -> Outcome<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(err) => return Outcome::Unknown(DelegateError::Decode(err.to_string())),
        };
        let attempts = match procedure {
            Procedure::LogPermissionUsage => AUDIT_ATTEMPTS,
            procedure if procedure.is_idempotent() => self.max_retries + 1,
            _ => 1,
        };
        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff.saturating_mul(1 << (attempt - 1).min(10));
                debug!(attempt, ?delay, "retrying remote authorization call");
                tokio::time::sleep(delay).await;
            }
            match self.attempt(procedure, payload.clone()).await {
                Ok(value) => {
                    return match serde_json::from_value(value) {
                        Ok(result) => Outcome::Resolved(result),
                        Err(err) => Outcome::Unknown(DelegateError::Decode(err.to_string())),
                    };
                }
                Err(err) if err.is_retryable() => {
                    debug!(attempt, error = %err, "remote authorization attempt failed");
                    last_error = Some(err);
                }
                Err(err) => return Outcome::Unknown(err),
            }
        }
        let err = last_error
            .unwrap_or_else(|| DelegateError::Transport("no attempt was made".to_string()));
        warn!(error = %err, "remote authorization unavailable");
        Outcome::Unknown(err)
    }

    async fn attempt(&self, procedure: Procedure, payload: Value) -> Result<Value, DelegateError> {
        match tokio::time::timeout(self.timeout, self.transport.call(procedure, payload)).await {
            Ok(result) => result,
            Err(_) => Err(DelegateError::Timeout {
                procedure: procedure.name(),
                elapsed_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
