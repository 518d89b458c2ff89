use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account type carried in the access token. Admins manage an organisation
/// and are never paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    User,
    Admin,
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::User => write!(f, "user"),
            AccountType::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(AccountType::User),
            "admin" => Ok(AccountType::Admin),
            _ => Err(format!("unknown account type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub account_type: AccountType,
    #[serde(default)]
    pub organisation_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        account_type: AccountType,
        organisation_id: Option<Uuid>,
        duration_secs: i64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            account_type,
            organisation_id,
            iat: now,
            exp: now + duration_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn is_admin(&self) -> bool {
        self.account_type == AccountType::Admin
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub account_type: AccountType,
    pub organisation_id: Option<Uuid>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.account_type == AccountType::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            account_type: claims.account_type,
            organisation_id: claims.organisation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_parses_case_insensitively() {
        assert_eq!("Admin".parse::<AccountType>().unwrap(), AccountType::Admin);
        assert_eq!("user".parse::<AccountType>().unwrap(), AccountType::User);
        assert!("moderator".parse::<AccountType>().is_err());
    }

    #[test]
    fn claims_expiry() {
        let live = Claims::new(Uuid::new_v4(), AccountType::User, None, 60);
        assert!(!live.is_expired());

        let mut stale = live.clone();
        stale.exp = stale.iat - 1;
        assert!(stale.is_expired());
    }
}
