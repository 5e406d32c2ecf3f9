use chrono::NaiveDate;
use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;

use crate::data::todo::db::TodoDbExt;
use crate::data::todo::TodoSheet;
use crate::resp::jwt::UserRoleToken;
use crate::resp::problem::Problem;

fn parse_date(text: &str) -> Result<NaiveDate, Problem> {
    text.parse().map_err(|_| {
        Problem::new_untyped(Status::BadRequest, "Bad date; expected YYYY-MM-DD.")
            .insert_str("date", text)
            .clone()
    })
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TodoText {
    pub text: String,
}

/// The viewer's own to-do sheet; an account with no sheet yet gets an empty
/// one.
#[utoipa::path(
    responses(
        (status = 200, description = "The viewer's to-do sheet", body = TodoSheet),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/todo")]
#[tracing::instrument]
pub async fn todo_get(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<TodoSheet>, Problem> {
    Ok(Json(db.get_todo_sheet(auth.user).await?))
}

#[utoipa::path(
    request_body = TodoText,
    params(("date", description = "day the item belongs to, YYYY-MM-DD")),
    responses(
        (status = 200, description = "Updated to-do sheet", body = TodoSheet),
        (status = 400, description = "Empty item or bad date", body = Problem),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/todo/<date>", format = "application/json", data = "<item>")]
#[tracing::instrument]
pub async fn todo_add(
    date: &str,
    item: Json<TodoText>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<TodoSheet>, Problem> {
    let date = parse_date(date)?;
    Ok(Json(db.add_todo(auth.user, date, &item.text).await?))
}

#[utoipa::path(
    params(
        ("date", description = "day the item belongs to, YYYY-MM-DD"),
        ("index", description = "position of the item within the day"),
    ),
    responses(
        (status = 200, description = "Updated to-do sheet", body = TodoSheet),
        (status = 401, description = "Missing/expired token", body = Problem),
        (status = 404, description = "No such item", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/todo/<date>/<index>")]
#[tracing::instrument]
pub async fn todo_remove(
    date: &str,
    index: usize,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<TodoSheet>, Problem> {
    let date = parse_date(date)?;
    Ok(Json(db.remove_todo(auth.user, date, index).await?))
}
