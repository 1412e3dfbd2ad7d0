use crate::providers::auth_provider::AuthProvider;

pub const DEVELOPER_ROLE: &str = "ROLE_INT_DEVELOPER";

const DEVELOPER_RESOURCES: [&str; 2] = ["module_configs", "topics"];

#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    pub can: bool,
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allowed() -> Self {
        AccessDecision {
            can: true,
            reason: None,
        }
    }
}

/// Role check for a resource. Only developer resources are restricted.
pub fn can(resource: &str, roles: &[String]) -> AccessDecision {
    if !DEVELOPER_RESOURCES.contains(&resource) {
        return AccessDecision::allowed();
    }
    if roles.iter().any(|role| role == DEVELOPER_ROLE) {
        return AccessDecision::allowed();
    }
    AccessDecision {
        can: false,
        reason: Some(format!("You need {DEVELOPER_ROLE} to access this resource")),
    }
}

/// Same as [`can`], using the roles of the current session.
pub fn can_access(auth: &AuthProvider, resource: &str) -> AccessDecision {
    can(resource, &auth.get_permissions())
}
