//! `/rpc/{procedure}` endpoints answering the authorization delegate.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use platform_authz::rpc::{
    ConditionalPermissionRequest, EffectiveRoleRequest, FacilityRoleRequest, PermissionUsage,
    Procedure, RpcResponse,
};
use platform_authz::{Role, Subject, base_permissions, has_higher_or_equal_rank};
use platform_db::procedures;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::http::{AppState, HttpError, HttpResult, authenticate};

pub async fn rpc_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<RpcResponse<Value>>> {
    let procedure = Procedure::from_name(&name).ok_or_else(|| {
        HttpError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("unknown procedure {name}"),
        )
    })?;
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| HttpError::validation(format!("request body is not JSON: {err}")))?
    };
    let caller = match procedure {
        // Bootstrap screens ask this before anyone can sign in.
        Procedure::HasNationalUsers => None,
        _ => Some(authenticate(&state, &headers).await?),
    };
    let result = dispatch(&state, procedure, caller, payload).await?;
    Ok(Json(RpcResponse { result }))
}

async fn dispatch(
    state: &AppState,
    procedure: Procedure,
    caller: Option<Subject>,
    payload: Value,
) -> HttpResult<Value> {
    let db = state.db.as_ref();
    match (procedure, caller) {
        (Procedure::HasNationalUsers, _) => encode(procedures::has_national_users(db).await?),
        (_, None) => Err(HttpError::unauthenticated()),
        (Procedure::GetEffectiveRoleForFacility, Some(caller)) => {
            let request: EffectiveRoleRequest = decode(procedure, payload)?;
            ensure_may_act_for(db, &caller, request.user_id, Some(request.facility_id)).await?;
            let role = procedures::get_effective_role_for_facility(
                db,
                request.user_id,
                request.facility_id,
            )
            .await?;
            encode(role.map(|role| role.to_external().as_str()))
        }
        (Procedure::CheckConditionalPermissions, Some(caller)) => {
            let request: ConditionalPermissionRequest = decode(procedure, payload)?;
            ensure_may_act_for(db, &caller, request.user_id, Some(request.facility_id)).await?;
            let allowed = procedures::check_conditional_permissions(db, &request).await?;
            encode(allowed)
        }
        (Procedure::LogPermissionUsage, Some(caller)) => {
            let usage: PermissionUsage = decode(procedure, payload)?;
            ensure_may_act_for(db, &caller, usage.user_id, usage.facility_id).await?;
            procedures::log_permission_usage(db, &usage).await?;
            Ok(Value::Null)
        }
        (Procedure::AssignFacilityRole, Some(caller)) => {
            let request: FacilityRoleRequest = decode(procedure, payload)?;
            let record = procedures::assign_facility_role(db, caller.user_id, &request).await?;
            encode(record)
        }
        (Procedure::RevokeFacilityRole, Some(caller)) => {
            let request: FacilityRoleRequest = decode(procedure, payload)?;
            let record = procedures::revoke_facility_role(db, caller.user_id, &request).await?;
            encode(record)
        }
    }
}

/// Callers may always ask about themselves. Asking about someone else needs
/// a user-managing or auditing role, held at the facility in question or at
/// zonal level and above when no facility is named.
async fn ensure_may_act_for(
    db: &DatabaseConnection,
    caller: &Subject,
    target: Uuid,
    facility_id: Option<Uuid>,
) -> HttpResult<()> {
    if caller.user_id == target {
        return Ok(());
    }
    let acting_role = match facility_id {
        Some(facility_id) => {
            procedures::get_effective_role_for_facility(db, caller.user_id, facility_id).await?
        }
        None => Some(caller.role).filter(|role| has_higher_or_equal_rank(*role, Role::Zonal)),
    };
    if acting_role.is_some_and(may_inspect_others) {
        Ok(())
    } else {
        Err(HttpError::forbidden("may not query another user's permissions"))
    }
}

fn may_inspect_others(role: Role) -> bool {
    let perms = base_permissions(role);
    perms.can_manage_users || perms.can_view_audit_logs
}

fn decode<T: DeserializeOwned>(procedure: Procedure, payload: Value) -> HttpResult<T> {
    serde_json::from_value(payload)
        .map_err(|err| HttpError::validation(format!("invalid {procedure} payload: {err}")))
}

fn encode<T: Serialize>(value: T) -> HttpResult<Value> {
    serde_json::to_value(value).map_err(|err| {
        tracing::error!(error = %err, "failed to encode rpc result");
        HttpError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "internal server error",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspecting_others_needs_user_or_audit_authority() {
        assert!(may_inspect_others(Role::National));
        assert!(may_inspect_others(Role::FacilityManager));
        assert!(!may_inspect_others(Role::Finance));
        assert!(!may_inspect_others(Role::Viewer));
    }
}
