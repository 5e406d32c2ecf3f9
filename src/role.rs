use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account privilege level. Directors see and manage everything; teachers are
/// scoped to classes assigned to them.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Director,
}

impl Role {
    /// Role assigned at sign-up time. The very first account in an empty
    /// academy (no users, no classes) becomes the director; everyone after
    /// that is a teacher. The emptiness check is not transactional, so two
    /// simultaneous first sign-ups can both end up directors.
    pub fn for_signup(academy_is_empty: bool) -> Role {
        if academy_is_empty {
            Role::Director
        } else {
            Role::Teacher
        }
    }

    pub fn can_manage_users(self) -> bool {
        self >= Role::Director
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Teacher
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Teacher => write!(f, "teacher"),
            Role::Director => write!(f, "director"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_signup_in_empty_academy_is_director() {
        assert_eq!(Role::for_signup(true), Role::Director);
        assert_eq!(Role::for_signup(false), Role::Teacher);
    }

    #[test]
    fn director_outranks_teacher() {
        assert!(Role::Director > Role::Teacher);
        assert!(Role::Director.can_manage_users());
        assert!(!Role::Teacher.can_manage_users());
    }
}
