use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::tenant::TenantId;

/// Roles defined by the notification service itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceRole {
    #[serde(rename = "subscription-admin")]
    SubscriptionAdmin,
    #[serde(rename = "subscription-app")]
    SubscriptionApp,
}

impl ServiceRole {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceRole::SubscriptionAdmin => "subscription-admin",
            ServiceRole::SubscriptionApp => "subscription-app",
        }
    }
}

impl AsRef<str> for ServiceRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub tenant_id: Option<TenantId>,

    /// Platform (core) users are not bound to a single tenant.
    #[serde(default)]
    pub is_core: bool,

    #[serde(default)]
    pub roles: HashSet<String>,
}

impl User {
    pub fn new(id: impl Into<String>, tenant_id: Option<TenantId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            tenant_id,
            is_core: false,
            roles: HashSet::new(),
        }
    }

    pub fn core(id: impl Into<String>) -> Self {
        Self {
            is_core: true,
            ..Self::new(id, None)
        }
    }

    pub fn with_role(mut self, role: impl AsRef<str>) -> Self {
        self.roles.insert(role.as_ref().to_string());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// True when `user` belongs to `tenant_id` (or is a core user and
/// `match_any_tenant` is set) and holds at least one of `required_roles`.
pub fn has_any_role<R: AsRef<str>>(
    user: Option<&User>,
    tenant_id: Option<&TenantId>,
    required_roles: &[R],
    match_any_tenant: bool,
) -> bool {
    let Some(user) = user else {
        return false;
    };

    let in_tenant = match (&user.tenant_id, tenant_id) {
        (Some(user_tenant), Some(tenant_id)) => user_tenant == tenant_id,
        _ => false,
    };

    if !in_tenant && !(match_any_tenant && user.is_core) {
        return false;
    }

    required_roles
        .iter()
        .any(|role| user.has_role(role.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("urn:ads:platform:tenant-service:v2:/tenants/T1")
    }

    #[test]
    fn anonymous_user_has_no_roles() {
        assert!(!has_any_role(
            None,
            Some(&tenant()),
            &[ServiceRole::SubscriptionAdmin],
            true
        ));
    }

    #[test]
    fn tenant_user_with_role_matches() {
        let user = User::new("u1", Some(tenant())).with_role(ServiceRole::SubscriptionAdmin);
        assert!(has_any_role(
            Some(&user),
            Some(&tenant()),
            &[ServiceRole::SubscriptionAdmin, ServiceRole::SubscriptionApp],
            false
        ));
    }

    #[test]
    fn user_from_other_tenant_is_rejected() {
        let user = User::new("u1", Some(TenantId::new("T2"))).with_role(ServiceRole::SubscriptionAdmin);
        assert!(!has_any_role(
            Some(&user),
            Some(&tenant()),
            &[ServiceRole::SubscriptionAdmin],
            true
        ));
    }

    #[test]
    fn core_user_only_matches_when_any_tenant_allowed() {
        let user = User::core("ops").with_role(ServiceRole::SubscriptionApp);
        assert!(has_any_role(
            Some(&user),
            Some(&tenant()),
            &[ServiceRole::SubscriptionApp],
            true
        ));
        assert!(!has_any_role(
            Some(&user),
            Some(&tenant()),
            &[ServiceRole::SubscriptionApp],
            false
        ));
    }

    #[test]
    fn empty_role_list_never_matches() {
        let user = User::new("u1", Some(tenant())).with_role("anything");
        let roles: [&str; 0] = [];
        assert!(!has_any_role(Some(&user), Some(&tenant()), &roles, false));
    }
}
