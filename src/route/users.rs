use mongodb::Database;
use rocket::http::{Cookie, CookieJar};
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::user::db::problem as user_problem;
use crate::data::user::db::{
    AcademyUserDbExt, UserCreateData, UserCreatedResponse, UserLoginData, UserSignupData,
    UserUpdateData,
};
use crate::data::user::{PasswordHash, User, UserResponse};
use crate::resp::jwt::{auth_problem, UserRoleToken, AUTH_COOKIE_NAME};
use crate::resp::problem::Problem;
use crate::security::Security;

/// Open sign-up. The first account in an empty academy becomes the director
/// and receives sample data; everyone else becomes a teacher.
#[utoipa::path(
    request_body = UserSignupData,
    responses(
        (status = 200, description = "Account created and session opened", body = UserCreatedResponse),
        (status = 400, description = "Rejected sign-up data", body = Problem),
    )
)]
#[post("/signup", format = "application/json", data = "<signup>")]
#[tracing::instrument(skip(cookies, security))]
pub async fn signup<'a>(
    signup: Json<UserSignupData>,
    cookies: &'a CookieJar<'_>,
    db: &State<Database>,
    security: &State<Security>,
) -> Result<Json<UserCreatedResponse>, Problem> {
    let (token, user) = db.signup_user(signup.into_inner(), &security.salt).await?;
    cookies.add(token.cookie(&security.jwt_secret)?);

    Ok(Json(UserCreatedResponse::from(&user)))
}

#[utoipa::path(
    request_body = UserLoginData,
    responses(
        (status = 200, description = "Session opened", body = UserResponse),
        (status = 401, description = "Bad login id or password", body = Problem),
    )
)]
#[post("/login", format = "application/json", data = "<login>")]
#[tracing::instrument(skip(cookies, security))]
pub async fn login_submit<'a>(
    login: Json<UserLoginData>,
    cookies: &'a CookieJar<'_>,
    db: &State<Database>,
    security: &State<Security>,
) -> Result<User, Problem> {
    let login = login.into_inner();
    login.validate()?;

    let user = db
        .find_user_by_login_id(&login.login_id)
        .await?
        .ok_or_else(user_problem::bad_login)?;

    if user.pw_hash != PasswordHash::new(&login.password, &security.salt) {
        return Err(user_problem::bad_login());
    }

    let urt = UserRoleToken::new(&user);
    cookies.add(urt.cookie(&security.jwt_secret)?);

    Ok(user)
}

#[utoipa::path(
    responses((status = 200, description = "Session closed")),
    security(("jwt" = []))
)]
#[post("/logout")]
#[tracing::instrument(skip(cookies))]
pub async fn logout(cookies: &CookieJar<'_>) {
    cookies.remove(Cookie::from(AUTH_COOKIE_NAME));
}

/// Directors see every account; teachers only their own.
#[utoipa::path(
    responses(
        (status = 200, description = "Visible users", body = Vec<UserResponse>),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/user")]
#[tracing::instrument]
pub async fn user_list(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<UserResponse>>, Problem> {
    if auth.role.can_manage_users() {
        return Ok(Json(db.list_users().await?));
    }

    let own = db
        .get_user(auth.user)
        .await?
        .map(|user| UserResponse::from(&user));

    Ok(Json(own.into_iter().collect()))
}

#[utoipa::path(
    params(("id", description = "user ID")),
    responses(
        (status = 200, description = "Information about existing user", body = UserResponse),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried user doesn't exist"),
    ),
    security(("jwt" = []))
)]
#[get("/user/<id>")]
#[tracing::instrument]
pub async fn user_get(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Option<User>, Problem> {
    if auth.user != id && !auth.role.can_manage_users() {
        return Err(auth_problem("Only directors can view other users."));
    }

    db.get_user(id).await
}

/// Director-initiated account creation. The acting director's own session is
/// left untouched.
#[utoipa::path(
    request_body = UserCreateData,
    responses(
        (status = 200, description = "Account created", body = UserResponse),
        (status = 400, description = "Rejected account data", body = Problem),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/user", format = "application/json", data = "<create>")]
#[tracing::instrument(skip(security))]
pub async fn user_create(
    create: Json<UserCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
    security: &State<Security>,
) -> Result<Json<UserResponse>, Problem> {
    if !auth.role.can_manage_users() {
        return Err(auth_problem("Only directors can create accounts."));
    }

    let user = db.create_user(create.into_inner(), &security.salt).await?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    request_body = UserUpdateData,
    params(("id", description = "user ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Rejected update", body = Problem),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried user doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/user/<id>", format = "application/json", data = "<update>")]
#[tracing::instrument]
pub async fn user_update(
    id: Uuid,
    update: Json<UserUpdateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<UserResponse>, Problem> {
    let update = update.into_inner();

    if auth.user != id && !auth.role.can_manage_users() {
        return Err(auth_problem("Only directors can edit other users."));
    }
    if update.role.is_some() && !auth.role.can_manage_users() {
        return Err(auth_problem("Only directors can change roles."));
    }

    let user = db.update_user(id, update).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Deletes the account and clears the teacher assignment on any class that
/// referenced it; nothing else is cascaded.
#[utoipa::path(
    params(("id", description = "user ID")),
    responses(
        (status = 200, description = "Deleted user id"),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried user doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/user/<id>")]
#[tracing::instrument(skip(cookies))]
pub async fn user_delete<'a>(
    id: Uuid,
    auth: UserRoleToken,
    cookies: &'a CookieJar<'_>,
    db: &State<Database>,
) -> Result<String, Problem> {
    if auth.user != id && !auth.role.can_manage_users() {
        return Err(auth_problem("Only directors can delete other users."));
    }

    let removed = db.delete_user(id).await?;

    if let Some(removed) = removed {
        if auth.user == id {
            cookies.remove(Cookie::from(AUTH_COOKIE_NAME));
        }
        Ok(removed.id.to_string())
    } else {
        Err(user_problem::not_found(id))
    }
}
