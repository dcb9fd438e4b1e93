//! Flat claims model handed to sign-in.

use serde::{Deserialize, Serialize};

use super::User;

/// Scheme under which application sessions are issued.
pub const APPLICATION_SCHEME: &str = "Identity.Application";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    NameIdentifier,
    Name,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub kind: ClaimType,
    pub value: String,
}

impl Claim {
    #[must_use]
    pub fn new(kind: ClaimType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    pub scheme: String,
    pub claims: Vec<Claim>,
}

impl ClaimsPrincipal {
    #[must_use]
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            claims: Vec::new(),
        }
    }

    /// Principal for an application session: user id and user name, nothing else.
    #[must_use]
    pub fn for_user(user: &User) -> Self {
        Self::new(APPLICATION_SCHEME)
            .with_claim(Claim::new(ClaimType::NameIdentifier, user.id.to_string()))
            .with_claim(Claim::new(ClaimType::Name, user.user_name.clone()))
    }

    #[must_use]
    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }

    #[must_use]
    pub fn find(&self, kind: ClaimType) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.kind == kind)
            .map(|claim| claim.value.as_str())
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.find(ClaimType::Name)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<uuid::Uuid> {
        self.find(ClaimType::NameIdentifier)
            .and_then(|value| uuid::Uuid::parse_str(value).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_for_user_has_exactly_id_and_name() {
        let user = User::new("carol@example.com", "carol@example.com")
            .with_names(Some("Carol".to_string()), Some("Jones".to_string()));
        let principal = ClaimsPrincipal::for_user(&user);

        assert_eq!(principal.scheme, APPLICATION_SCHEME);
        assert_eq!(
            principal.claims,
            vec![
                Claim::new(ClaimType::NameIdentifier, user.id.to_string()),
                Claim::new(ClaimType::Name, "carol@example.com"),
            ]
        );
        assert_eq!(principal.user_id(), Some(user.id));
        assert_eq!(principal.name(), Some("carol@example.com"));
    }

    #[test]
    fn claims_serialize_as_type_value_pairs() {
        let principal = ClaimsPrincipal::new(APPLICATION_SCHEME)
            .with_claim(Claim::new(ClaimType::Name, "dave"));
        let json = serde_json::to_value(&principal.claims).ok();
        assert_eq!(
            json,
            Some(serde_json::json!([{ "type": "name", "value": "dave" }]))
        );
    }
}
