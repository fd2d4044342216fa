use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque bearer credential issued by the auth endpoints.
///
/// The value is never printed by `Debug`; use [`AccessToken::as_str`] when
/// the raw string is genuinely needed (headers, storage).
///
/// # Examples
///
/// ```
/// use core_auth::AccessToken;
///
/// let token = AccessToken::new("eyJhbGciOiJIUzI1NiJ9.e30.sig");
/// assert_eq!(token.bearer_value(), "Bearer eyJhbGciOiJIUzI1NiJ9.e30.sig");
/// assert!(!format!("{:?}", token).contains("eyJ"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value for this token.
    pub fn bearer_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Expiry (Unix seconds) carried in the token payload, if any.
    pub fn expires_at(&self) -> Option<i64> {
        crate::token_clock::expiry_of(&self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// Lifecycle position of the session.
///
/// `Hydrating` is only ever the initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Hydrating,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Hydrating => "hydrating",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard role. The set is closed; anything unrecognized is treated as
/// the least privileged role.
///
/// # Examples
///
/// ```
/// use core_auth::Role;
///
/// assert_eq!(Role::from_wire("Super_Admin"), Role::Admin);
/// assert_eq!(Role::from_wire("brand-manager"), Role::BrandManager);
/// assert_eq!(Role::from_wire("intern"), Role::Staff);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    BrandManager,
    Staff,
}

impl Role {
    /// Normalizes a role string as sent by the server.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" | "super_admin" | "superadmin" => Role::Admin,
            "brand_manager" | "manager" | "brand_admin" | "brand-manager" | "brandmanager" => {
                Role::BrandManager
            }
            _ => Role::Staff,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::BrandManager => "brand_manager",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::from_wire(&raw))
    }
}

/// Identifier that may arrive as a JSON string or number.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(serde_json::Number),
}

impl From<WireId> for String {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Text(text) => text,
            WireId::Number(number) => number.to_string(),
        }
    }
}

fn id_from_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireId::deserialize(deserializer).map(String::from)
}

fn optional_id_from_wire<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<WireId>::deserialize(deserializer).map(|id| id.map(String::from))
}

/// The signed-in staff member.
///
/// # Examples
///
/// ```
/// use core_auth::{Role, User};
///
/// let user: User = serde_json::from_str(
///     r#"{"id": 7, "email": "ana@brand.example", "role": "manager", "brandId": 3}"#,
/// ).unwrap();
///
/// assert_eq!(user.id, "7");
/// assert_eq!(user.role, Role::BrandManager);
/// assert_eq!(user.brand_id.as_deref(), Some("3"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id_from_wire")]
    pub id: String,
    pub email: String,
    #[serde(default = "least_privileged")]
    pub role: Role,
    #[serde(
        default,
        alias = "brandId",
        deserialize_with = "optional_id_from_wire",
        skip_serializing_if = "Option::is_none"
    )]
    pub brand_id: Option<String>,
}

fn least_privileged() -> Role {
    Role::Staff
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Result of a successful credential exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: AccessToken,
    pub user: User,
}
