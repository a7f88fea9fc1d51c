//! Authenticated identity returned by the session endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// The user a connection was authenticated as. Owned by that connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(default, deserialize_with = "role_list")]
    pub roles: Vec<String>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub customer_id: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            roles: Vec::new(),
            customer_id: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.user_name.trim().is_empty()
    }
}

/// Body of the session-verification response: `{ "user": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub user: Option<Identity>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRoles {
    One(String),
    Many(Vec<String>),
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

fn role_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<RawRoles>::deserialize(deserializer)? {
        Some(RawRoles::One(role)) => vec![role],
        Some(RawRoles::Many(roles)) => roles,
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_user() {
        let body = json!({
            "user": { "user_id": 42, "userName": "alice", "roles": ["admin"], "customer_id": "c-7", "email": "a@x" }
        });
        let parsed: SessionResponse = serde_json::from_value(body).unwrap();
        let user = parsed.user.unwrap();
        assert_eq!(user.user_id, "42");
        assert_eq!(user.user_name, "alice");
        assert_eq!(user.roles, vec!["admin".to_string()]);
        assert_eq!(user.customer_id.as_deref(), Some("c-7"));
    }

    #[test]
    fn single_role_and_missing_customer() {
        let body = json!({ "user": { "user_id": "u1", "userName": "bob", "roles": "agent", "customer_id": null } });
        let user = serde_json::from_value::<SessionResponse>(body).unwrap().user.unwrap();
        assert_eq!(user.roles, vec!["agent".to_string()]);
        assert_eq!(user.customer_id, None);
    }

    #[test]
    fn body_without_user() {
        let parsed: SessionResponse = serde_json::from_value(json!({ "expires": "x" })).unwrap();
        assert!(parsed.user.is_none());
    }

    #[test]
    fn incomplete_identity() {
        assert!(!Identity::new("", "alice").is_complete());
        assert!(!Identity::new("1", " ").is_complete());
        assert!(Identity::new("1", "alice").is_complete());
    }
}
