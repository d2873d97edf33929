use twolane_auth::Principal;
use twolane_contracts::MutationScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotLoggedIn,
    NotAdmin,
    NotTargetUserOrAdmin,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::NotLoggedIn => "must be logged in",
            DenyReason::NotAdmin => "must be an admin",
            DenyReason::NotTargetUserOrAdmin => "must be the target user or an admin",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny(DenyReason),
}

impl GuardDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Deny(reason) => Err(reason),
        }
    }
}

pub fn ensure_logged_in(principal: Option<&Principal>) -> GuardDecision {
    match principal {
        Some(_) => GuardDecision::Allow,
        None => GuardDecision::Deny(DenyReason::NotLoggedIn),
    }
}

pub fn ensure_admin(principal: Option<&Principal>) -> GuardDecision {
    match principal {
        Some(p) if p.is_admin => GuardDecision::Allow,
        _ => GuardDecision::Deny(DenyReason::NotAdmin),
    }
}

pub fn ensure_correct_user_or_admin(
    principal: Option<&Principal>,
    target_username: &str,
) -> GuardDecision {
    match principal {
        Some(p) if p.is_admin || p.username == target_username => GuardDecision::Allow,
        _ => GuardDecision::Deny(DenyReason::NotTargetUserOrAdmin),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard<'a> {
    LoggedIn,
    Admin,
    CorrectUserOrAdmin { target: &'a str },
}

impl Guard<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Guard::LoggedIn => "logged_in",
            Guard::Admin => "admin",
            Guard::CorrectUserOrAdmin { .. } => "correct_user_or_admin",
        }
    }

    pub fn evaluate(&self, principal: Option<&Principal>) -> GuardDecision {
        match self {
            Guard::LoggedIn => ensure_logged_in(principal),
            Guard::Admin => ensure_admin(principal),
            Guard::CorrectUserOrAdmin { target } => ensure_correct_user_or_admin(principal, target),
        }
    }
}

pub fn author_scope(principal: &Principal) -> MutationScope {
    if principal.is_admin {
        MutationScope::Any
    } else {
        MutationScope::AuthoredBy(principal.username.clone())
    }
}
