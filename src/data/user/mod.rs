use rocket::http::ContentType;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::role::Role;
use crate::security::Salt;

pub mod db;

pub static USER_COLLECTION_NAME: &str = "users";

/// Salted SHA-256 digest of the account password. The salt is process-wide
/// secret material (see [`crate::security::Security`]), so hashes are only
/// comparable against hashes produced by the same deployment.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PasswordHash([u8; 32]);

impl PasswordHash {
    pub fn new(password: impl AsRef<str>, salt: &Salt) -> PasswordHash {
        let mut sha = Sha256::new();
        Digest::update(&mut sha, salt);
        Digest::update(&mut sha, password.as_ref().as_bytes());

        PasswordHash(sha.finalize().into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub login_id: String,
    pub name: String,
    pub role: Role,
    pub pw_hash: PasswordHash,
}

impl User {
    pub fn new(
        login_id: impl ToString,
        name: impl ToString,
        password: impl AsRef<str>,
        salt: &Salt,
    ) -> User {
        let pw_hash = PasswordHash::new(password, salt);

        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, login_id.to_string().as_bytes());
        tracing::info!("Creating a new user with UUID: {}", id);

        User {
            id,
            login_id: login_id.to_string(),
            name: name.to_string(),
            role: Role::Teacher,
            pw_hash,
        }
    }
}

/// Public view of a [`User`]; everything except the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub login_id: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            login_id: user.login_id.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}

impl<'r> Responder<'r, 'static> for User {
    fn respond_to(self, _: &Request) -> response::Result<'static> {
        let body = serde_json::to_string(&UserResponse::from(&self))
            .expect("UserResponse must be JSON serializable");

        Response::build()
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

pub(crate) mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": bson::Uuid::from_uuid_1(id) }
    }

    pub fn by_login_id(login_id: impl AsRef<str>) -> Document {
        doc! { "loginId": login_id.as_ref() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_same_salt_hashes_equal() {
        let salt: Salt = [7u8; 16];
        assert_eq!(
            PasswordHash::new("secret-pw", &salt),
            PasswordHash::new("secret-pw", &salt)
        );
        assert_ne!(
            PasswordHash::new("secret-pw", &salt),
            PasswordHash::new("other-pw", &salt)
        );
    }

    #[test]
    fn salt_changes_hash() {
        assert_ne!(
            PasswordHash::new("secret-pw", &[1u8; 16]),
            PasswordHash::new("secret-pw", &[2u8; 16])
        );
    }

    #[test]
    fn user_response_hides_credential() {
        let user = User::new("t@academy.example", "Teacher Kim", "secret-pw", &[0u8; 16]);
        let json = serde_json::to_value(UserResponse::from(&user)).unwrap();
        assert!(json.get("pwHash").is_none());
        assert_eq!(json["loginId"], "t@academy.example");
        assert_eq!(json["role"], "teacher");
    }
}
