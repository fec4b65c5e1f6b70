use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AuthzError;

/// Application-facing role names.
///
/// The set is closed: every role that appears in a token, a database row or
/// an RPC payload is mapped onto one of these variants, and anything that
/// does not match becomes [`Role::Viewer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    National,
    Regional,
    Zonal,
    FacilityManager,
    FacilityOfficer,
    Procurement,
    Finance,
    ProgramManager,
    Qa,
    DataAnalyst,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::National,
        Role::Regional,
        Role::Zonal,
        Role::FacilityManager,
        Role::FacilityOfficer,
        Role::Procurement,
        Role::Finance,
        Role::ProgramManager,
        Role::Qa,
        Role::DataAnalyst,
        Role::Viewer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::National => "national",
            Role::Regional => "regional",
            Role::Zonal => "zonal",
            Role::FacilityManager => "facility_manager",
            Role::FacilityOfficer => "facility_officer",
            Role::Procurement => "procurement",
            Role::Finance => "finance",
            Role::ProgramManager => "program_manager",
            Role::Qa => "qa",
            Role::DataAnalyst => "data_analyst",
            Role::Viewer => "viewer",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::National => "National Administrator",
            Role::Regional => "Regional Manager",
            Role::Zonal => "Zonal Manager",
            Role::FacilityManager => "Facility Manager",
            Role::FacilityOfficer => "Facility Officer",
            Role::Procurement => "Procurement Officer",
            Role::Finance => "Finance Officer",
            Role::ProgramManager => "Program Manager",
            Role::Qa => "Quality Assurance",
            Role::DataAnalyst => "Data Analyst",
            Role::Viewer => "Viewer",
        }
    }

    /// Strict parse of an application role name.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
    }

    /// Parse an application role name, falling back to [`Role::Viewer`].
    pub fn parse_or_default(value: &str) -> Self {
        Self::parse(value).unwrap_or(Role::Viewer)
    }

    pub fn to_external(self) -> RoleCode {
        let code = match self {
            Role::National => "NATIONAL_ADMIN",
            Role::Regional => "REGIONAL_MANAGER",
            Role::Zonal => "ZONAL_MANAGER",
            Role::FacilityManager => "FACILITY_MANAGER",
            Role::FacilityOfficer => "FACILITY_OFFICER",
            Role::Procurement => "PROCUREMENT_OFFICER",
            Role::Finance => "FINANCE_OFFICER",
            Role::ProgramManager => "PROGRAM_MANAGER",
            Role::Qa => "QA_OFFICER",
            Role::DataAnalyst => "DATA_ANALYST",
            Role::Viewer => "VIEWER",
        };
        RoleCode(code)
    }

    /// Map a storage code onto a role. Accepts untrusted input and never
    /// fails; unrecognised codes become [`Role::Viewer`].
    ///
    /// Rows written before the code column existed hold application names,
    /// so those are accepted as well.
    pub fn from_external(code: &str) -> Self {
        let trimmed = code.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.to_external().as_str().eq_ignore_ascii_case(trimmed))
            .or_else(|| Self::parse(trimmed))
            .unwrap_or(Role::Viewer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| AuthzError::UnknownRole(value.to_string()))
    }
}

/// Role identifier in the storage vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleCode(&'static str);

impl RoleCode {
    pub fn as_str(self) -> &'static str {
        self.0
    }

    /// All codes accepted by the store, in hierarchy order.
    pub fn all() -> impl Iterator<Item = RoleCode> {
        Role::ALL.into_iter().map(Role::to_external)
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for RoleCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl From<RoleCode> for String {
    fn from(value: RoleCode) -> Self {
        value.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_external(role.to_external().as_str()), role);
        }
    }

    #[test]
    fn unknown_codes_become_viewer() {
        for code in ["", "ADMIN", "superuser", "NATIONAL_ADMIN_X", "🙂", "  "] {
            assert_eq!(Role::from_external(code), Role::Viewer, "code {code:?}");
        }
    }

    #[test]
    fn legacy_application_names_are_accepted() {
        assert_eq!(
            Role::from_external("facility_manager"),
            Role::FacilityManager
        );
        assert_eq!(Role::from_external(" national_admin "), Role::National);
    }

    #[test]
    fn codes_are_distinct() {
        let codes: std::collections::HashSet<_> = RoleCode::all().map(RoleCode::as_str).collect();
        assert_eq!(codes.len(), Role::ALL.len());
    }

    #[test]
    fn strict_parse_rejects_unknown_names() {
        assert_eq!("qa".parse::<Role>(), Ok(Role::Qa));
        assert_eq!(
            "owner".parse::<Role>(),
            Err(AuthzError::UnknownRole("owner".into()))
        );
        assert_eq!(Role::parse_or_default("owner"), Role::Viewer);
    }

    #[test]
    fn serde_uses_application_names() {
        let json = serde_json::to_string(&Role::ProgramManager).unwrap();
        assert_eq!(json, "\"program_manager\"");
        let back: Role = serde_json::from_str("\"data_analyst\"").unwrap();
        assert_eq!(back, Role::DataAnalyst);
    }
}
