use bson::doc;
use mongodb::Database;
use rocket::futures::StreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::class::CLASS_COLLECTION_NAME;
use crate::data::todo::TODO_COLLECTION_NAME;
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Salt;

use super::filter;
use super::{User, UserResponse, USER_COLLECTION_NAME};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn bad_login_id(login_id: impl ToString, detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad login id.")
            .insert_str("loginId", login_id)
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> Problem {
        Problem::new_untyped(Status::BadRequest, "Bad password.")
            .detail(detail)
            .to_owned()
    }

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "User doesn't exist.")
            .insert("id", id.to_string())
            .clone()
    }

    #[inline]
    pub fn bad_login() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Bad login id or password.")
    }
}

#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSignupData {
    pub name: String,
    pub login_id: String,
    #[schema(format = Password)]
    pub password: String,
}

// Credentials stay out of logs.
impl std::fmt::Debug for UserSignupData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignupData:{}", self.login_id)
    }
}

impl UserSignupData {
    pub fn id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.login_id.as_bytes())
    }

    pub fn validate(&self) -> Result<(), Problem> {
        if !self.login_id.contains('@') {
            return Err(problem::bad_login_id(
                &self.login_id,
                "Not a valid email-form login id.",
            ));
        }

        if self.name.trim().is_empty() {
            return Err(Problem::new_untyped(
                rocket::http::Status::BadRequest,
                "Display name is required.",
            ));
        }

        if self.password.len() < 6 {
            return Err(problem::bad_password(
                "Password must be at least 6 characters long.",
            ));
        }

        if self.password.len() > 1024 {
            return Err(problem::bad_password(
                "Passwords longer than 1024 characters aren't supported.",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserLoginData {
    pub login_id: String,
    #[schema(format = Password)]
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginData:{}", self.login_id)
    }
}

impl UserLoginData {
    pub fn validate(&self) -> Result<(), Problem> {
        if self.login_id.is_empty() || self.password.is_empty() || self.password.len() > 1024 {
            return Err(problem::bad_login());
        }

        Ok(())
    }
}

/// Director-initiated account creation; unlike sign-up, the role is chosen by
/// the caller and the acting session is untouched.
#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateData {
    pub name: String,
    pub login_id: String,
    #[schema(format = Password)]
    pub password: String,
    pub role: Role,
}

impl std::fmt::Debug for UserCreateData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserCreateData:{}:{}", self.login_id, self.role)
    }
}

#[derive(Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateData {
    pub name: Option<String>,
    pub login_id: Option<String>,
    pub role: Option<Role>,
    /// Always refused; password changes must go through the owning user.
    pub password: Option<String>,
}

impl std::fmt::Debug for UserUpdateData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserUpdateData")
            .field("name", &self.name)
            .field("login_id", &self.login_id)
            .field("role", &self.role)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCreatedResponse {
    pub id: Uuid,
    pub role: Role,
}

impl From<&User> for UserCreatedResponse {
    fn from(user: &User) -> Self {
        UserCreatedResponse {
            id: user.id,
            role: user.role,
        }
    }
}

pub(crate) mod cascade {
    use bson::{doc, Document};
    use uuid::Uuid;

    /// Matches every class whose stored teacher assignment is `id`. Classes
    /// persist `teacherId` as a uuid string, so the filter compares one.
    pub fn classes_referencing(id: Uuid) -> Document {
        doc! { "teacherId": id.to_string() }
    }

    /// Clears the assignment and leaves the rest of the class untouched.
    pub fn clear_teacher_assignment() -> Document {
        doc! { "$set": { "teacherId": bson::Bson::Null } }
    }
}

pub trait AcademyUserDbExt {
    /// True when no user and no class document exists; drives the
    /// first-sign-up-becomes-director rule.
    async fn academy_is_empty(&self) -> Result<bool, Problem>;

    async fn signup_user(
        &self,
        signup: UserSignupData,
        salt: &Salt,
    ) -> Result<(UserRoleToken, User), Problem>;

    async fn create_user(&self, create: UserCreateData, salt: &Salt) -> Result<User, Problem>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem>;
    async fn find_user_by_login_id(&self, login_id: impl AsRef<str>)
        -> Result<Option<User>, Problem>;
    async fn list_users(&self) -> Result<Vec<UserResponse>, Problem>;

    async fn update_user(&self, id: Uuid, update: UserUpdateData) -> Result<User, Problem>;

    /// Removes the user document, that user's to-do sheet, and clears the
    /// teacher assignment on every class that referenced them. No other
    /// resource is cascaded.
    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, Problem>;
}

impl AcademyUserDbExt for Database {
    async fn academy_is_empty(&self) -> Result<bool, Problem> {
        let any_user = self
            .collection::<bson::Document>(USER_COLLECTION_NAME)
            .find_one(None, None)
            .await
            .map_err(Problem::from)?;
        if any_user.is_some() {
            return Ok(false);
        }

        let any_class = self
            .collection::<bson::Document>(CLASS_COLLECTION_NAME)
            .find_one(None, None)
            .await
            .map_err(Problem::from)?;

        Ok(any_class.is_none())
    }

    async fn signup_user(
        &self,
        signup: UserSignupData,
        salt: &Salt,
    ) -> Result<(UserRoleToken, User), Problem> {
        signup.validate()?;

        if self
            .find_user_by_login_id(&signup.login_id)
            .await?
            .is_some()
        {
            return Err(problem::bad_login_id(
                &signup.login_id,
                "Login id already registered.",
            ));
        }

        // Race window: two concurrent first sign-ups can both observe an
        // empty academy and both become directors. Accepted behavior.
        let first_user = self.academy_is_empty().await?;

        let mut user = User::new(&signup.login_id, &signup.name, &signup.password, salt);
        user.role = Role::for_signup(first_user);

        let urt = UserRoleToken::new(&user);

        self.collection::<User>(USER_COLLECTION_NAME)
            .insert_one(&user, None)
            .await
            .map_err(Problem::from)?;

        if first_user {
            crate::data::seed::install_sample_data(self, user.id).await?;
        }

        Ok((urt, user))
    }

    async fn create_user(&self, create: UserCreateData, salt: &Salt) -> Result<User, Problem> {
        let signup_shape = UserSignupData {
            name: create.name.clone(),
            login_id: create.login_id.clone(),
            password: create.password.clone(),
        };
        signup_shape.validate()?;

        if self
            .find_user_by_login_id(&create.login_id)
            .await?
            .is_some()
        {
            return Err(problem::bad_login_id(
                &create.login_id,
                "Login id already registered.",
            ));
        }

        let mut user = User::new(&create.login_id, &create.name, &create.password, salt);
        user.role = create.role;

        self.collection::<User>(USER_COLLECTION_NAME)
            .insert_one(&user, None)
            .await
            .map_err(Problem::from)?;

        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn find_user_by_login_id(
        &self,
        login_id: impl AsRef<str>,
    ) -> Result<Option<User>, Problem> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_login_id(login_id), None)
            .await
            .map_err(Problem::from)
    }

    async fn list_users(&self) -> Result<Vec<UserResponse>, Problem> {
        let mut cursor = self
            .collection::<User>(USER_COLLECTION_NAME)
            .find(None, None)
            .await
            .map_err(Problem::from)?;

        let mut users = vec![];
        while let Some(result) = cursor.next().await {
            match result {
                Ok(user) => users.push(UserResponse::from(user)),
                Err(_) => {
                    tracing::warn!("Unable to deserialize User document.")
                }
            }
        }

        Ok(users)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdateData) -> Result<User, Problem> {
        if update.password.is_some() {
            return Err(problem::bad_password(
                "Password changes must be made by the account owner.",
            ));
        }

        let mut set = bson::Document::new();
        if let Some(name) = update.name {
            set.insert("name", name);
        }
        if let Some(login_id) = update.login_id {
            set.insert("loginId", login_id);
        }
        if let Some(role) = update.role {
            set.insert("role", role.to_string());
        }

        if !set.is_empty() {
            self.collection::<User>(USER_COLLECTION_NAME)
                .update_one(filter::by_id(id), doc! { "$set": set }, None)
                .await
                .map_err(Problem::from)?;
        }

        self.get_user(id).await?.ok_or_else(|| problem::not_found(id))
    }

    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, Problem> {
        let removed = self
            .collection::<User>(USER_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)?;

        if removed.is_some() {
            self.collection::<bson::Document>(CLASS_COLLECTION_NAME)
                .update_many(
                    cascade::classes_referencing(id),
                    cascade::clear_teacher_assignment(),
                    None,
                )
                .await
                .map_err(Problem::from)?;

            self.collection::<bson::Document>(TODO_COLLECTION_NAME)
                .delete_one(filter::by_id(id), None)
                .await
                .map_err(Problem::from)?;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(login_id: &str, password: &str) -> UserSignupData {
        UserSignupData {
            name: "Teacher Kim".to_string(),
            login_id: login_id.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn signup_requires_email_form_login_id() {
        assert!(signup("not-an-email", "secret-pw").validate().is_err());
        assert!(signup("kim@academy.example", "secret-pw").validate().is_ok());
    }

    #[test]
    fn signup_rejects_short_password() {
        assert!(signup("kim@academy.example", "five5").validate().is_err());
        assert!(signup("kim@academy.example", "six666").validate().is_ok());
    }

    #[test]
    fn signup_requires_display_name() {
        let mut data = signup("kim@academy.example", "secret-pw");
        data.name = "  ".to_string();
        assert!(data.validate().is_err());
    }

    #[test]
    fn login_rejects_empty_fields() {
        let login = UserLoginData {
            login_id: "".to_string(),
            password: "secret-pw".to_string(),
        };
        assert!(login.validate().is_err());
    }

    #[test]
    fn signup_id_is_stable_per_login_id() {
        let a = signup("kim@academy.example", "secret-pw");
        let b = signup("kim@academy.example", "other-pw");
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn delete_cascade_matches_every_referencing_class() {
        use crate::data::class::Class;

        let user = User::new("kim@academy.example", "Teacher Kim", "secret-pw", &[0u8; 16]);
        let filter = cascade::classes_referencing(user.id);
        let expected = filter.get_str("teacherId").expect("filter holds a uuid string");

        // Both classes referencing the user store the assignment in the shape
        // the filter compares against.
        for class in [
            Class::new("초6_심화반", "2:50", Some(user.id)),
            Class::new("중2_A반", "4:30", Some(user.id)),
        ] {
            let stored = bson::to_document(&class).expect("class serializes to BSON");
            assert_eq!(stored.get_str("teacherId").unwrap(), expected);
        }

        let unrelated = Class::new("중3_B반", "6:10", Some(Uuid::new_v4()));
        let stored = bson::to_document(&unrelated).expect("class serializes to BSON");
        assert_ne!(stored.get_str("teacherId").unwrap(), expected);
    }

    #[test]
    fn delete_cascade_only_clears_the_assignment() {
        assert_eq!(
            cascade::clear_teacher_assignment(),
            doc! { "$set": { "teacherId": bson::Bson::Null } }
        );
    }
}
