use chrono::NaiveDate;
use mongodb::Database;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::data::class::db::ClassDbExt;
use crate::data::class::{
    attendance_history, AttendanceStatus, AttendanceSummary, Class, ClassCreateData,
    ClassRecord, ClassRecordPatch, ClassUpdateData, Student, StudentCreateData, StudentUpdateData,
};
use crate::resp::jwt::{auth_problem, UserRoleToken};
use crate::resp::problem::Problem;

fn ensure_visible(class: &Class, auth: &UserRoleToken) -> Result<(), Problem> {
    if !class.visible_to(auth.user, auth.role) {
        return Err(auth_problem("Class not assigned to user."));
    }
    Ok(())
}

fn parse_date(text: &str) -> Result<NaiveDate, Problem> {
    text.parse().map_err(|_| {
        Problem::new_untyped(Status::BadRequest, "Bad date; expected YYYY-MM-DD.")
            .insert_str("date", text)
            .clone()
    })
}

/// Role-filtered class list: directors get every class, teachers only the
/// classes assigned to them.
#[utoipa::path(
    responses(
        (status = 200, description = "Visible classes", body = Vec<Class>),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/class")]
#[tracing::instrument]
pub async fn class_list(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<Class>>, Problem> {
    let classes = db
        .list_classes()
        .await?
        .into_iter()
        .filter(|c| c.visible_to(auth.user, auth.role))
        .collect();

    Ok(Json(classes))
}

#[utoipa::path(
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Information about the class", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/class/<id>")]
#[tracing::instrument]
pub async fn class_get(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;
    Ok(Json(class))
}

/// Any authenticated account can open a class; teachers typically create
/// classes already assigned to themselves.
#[utoipa::path(
    request_body = ClassCreateData,
    responses(
        (status = 200, description = "Created class", body = Class),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/class", format = "application/json", data = "<create>")]
#[tracing::instrument]
pub async fn class_create(
    create: Json<ClassCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    Ok(Json(db.create_class(create.into_inner()).await?))
}

/// Updates name/time/teacher assignment; directors and the owning teacher
/// may edit. Embedded students and records have their own operations.
#[utoipa::path(
    request_body = ClassUpdateData,
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Updated class", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/class/<id>", format = "application/json", data = "<update>")]
#[tracing::instrument]
pub async fn class_update(
    id: Uuid,
    update: Json<ClassUpdateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.update_class_info(id, update.into_inner()).await?))
}

#[utoipa::path(
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Deleted class id"),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/class/<id>")]
#[tracing::instrument]
pub async fn class_delete(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<String, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    match db.delete_class(id).await? {
        Some(class) => Ok(class.id.to_string()),
        None => Err(crate::data::class::db::problem::not_found(id)),
    }
}

#[utoipa::path(
    request_body = StudentCreateData,
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Class with the new student", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/class/<id>/student", format = "application/json", data = "<create>")]
#[tracing::instrument]
pub async fn student_add(
    id: Uuid,
    create: Json<StudentCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.add_student(id, create.into_inner()).await?))
}

#[utoipa::path(
    request_body = StudentUpdateData,
    params(
        ("id", description = "class ID"),
        ("student_id", description = "student ID"),
    ),
    responses(
        (status = 200, description = "Class with the student updated", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Class or student doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put(
    "/class/<id>/student/<student_id>",
    format = "application/json",
    data = "<update>"
)]
#[tracing::instrument]
pub async fn student_update(
    id: Uuid,
    student_id: Uuid,
    update: Json<StudentUpdateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.update_student(id, student_id, update.into_inner()).await?))
}

#[utoipa::path(
    params(
        ("id", description = "class ID"),
        ("student_id", description = "student ID"),
    ),
    responses(
        (status = 200, description = "Class without the student", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Class or student doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/class/<id>/student/<student_id>")]
#[tracing::instrument]
pub async fn student_delete(
    id: Uuid,
    student_id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.remove_student(id, student_id).await?))
}

/// Bulk attendance-sheet save: replaces the embedded student list wholesale,
/// the way the check-off flow writes a finished sheet back.
#[utoipa::path(
    request_body = Vec<Student>,
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Class with the new sheet", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/class/<id>/students", format = "application/json", data = "<students>")]
#[tracing::instrument]
pub async fn students_replace(
    id: Uuid,
    students: Json<Vec<Student>>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.set_students(id, students.into_inner()).await?))
}

/// Advances one student's attendance one step along the fixed cycle
/// unchecked → present → late → absent → unchecked.
#[utoipa::path(
    params(
        ("id", description = "class ID"),
        ("student_id", description = "student ID"),
    ),
    responses(
        (status = 200, description = "The student's new status", body = AttendanceStatus),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Class or student doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/class/<id>/student/<student_id>/attendance")]
#[tracing::instrument]
pub async fn attendance_advance(
    id: Uuid,
    student_id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<AttendanceStatus>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.advance_attendance(id, student_id).await?))
}

/// Inserts a dated record. Rejected with 409 when the class already holds a
/// record for that date.
#[utoipa::path(
    request_body = ClassRecord,
    params(("id", description = "class ID")),
    responses(
        (status = 200, description = "Class with the new record", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
        (status = 409, description = "A record for this date already exists", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/class/<id>/record", format = "application/json", data = "<record>")]
#[tracing::instrument]
pub async fn record_add(
    id: Uuid,
    record: Json<ClassRecord>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.add_record(id, record.into_inner()).await?))
}

#[utoipa::path(
    request_body = ClassRecordPatch,
    params(
        ("id", description = "class ID"),
        ("date", description = "record date, YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Class with the record updated", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Class or record doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/class/<id>/record/<date>", format = "application/json", data = "<patch>")]
#[tracing::instrument]
pub async fn record_update(
    id: Uuid,
    date: &str,
    patch: Json<ClassRecordPatch>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let date = parse_date(date)?;
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.update_record(id, date, patch.into_inner()).await?))
}

#[utoipa::path(
    params(
        ("id", description = "class ID"),
        ("date", description = "record date, YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Class without the record", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Class or record doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/class/<id>/record/<date>")]
#[tracing::instrument]
pub async fn record_delete(
    id: Uuid,
    date: &str,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let date = parse_date(date)?;
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.remove_record(id, date).await?))
}

#[utoipa::path(
    params(
        ("id", description = "class ID"),
        ("name", description = "textbook name to drop from the progress catalog"),
    ),
    responses(
        (status = 200, description = "Class with the catalog updated", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/class/<id>/textbook/progress/<name>")]
#[tracing::instrument]
pub async fn progress_textbook_delete(
    id: Uuid,
    name: &str,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.remove_progress_textbook(id, name).await?))
}

#[utoipa::path(
    params(
        ("id", description = "class ID"),
        ("name", description = "textbook name to drop from the homework catalog"),
    ),
    responses(
        (status = 200, description = "Class with the catalog updated", body = Class),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 404, description = "Queried class doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[delete("/class/<id>/textbook/homework/<name>")]
#[tracing::instrument]
pub async fn homework_textbook_delete(
    id: Uuid,
    name: &str,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Class>, Problem> {
    let class = db.load_class(id).await?;
    ensure_visible(&class, &auth)?;

    Ok(Json(db.remove_homework_textbook(id, name).await?))
}

/// Derived attendance history over the viewer's visible classes: for every
/// recorded date, one summary per class folding current student statuses.
#[utoipa::path(
    responses(
        (status = 200, description = "Summaries keyed by record date"),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/attendance/history")]
#[tracing::instrument]
pub async fn attendance_history_get(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<BTreeMap<NaiveDate, Vec<AttendanceSummary>>>, Problem> {
    let visible: Vec<Class> = db
        .list_classes()
        .await?
        .into_iter()
        .filter(|c| c.visible_to(auth.user, auth.role))
        .collect();

    Ok(Json(attendance_history(&visible)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::user::User;
    use crate::role::Role;

    #[test]
    fn owning_teacher_may_manage_their_class() {
        let teacher = User::new("kim@academy.example", "Teacher Kim", "secret-pw", &[0u8; 16]);
        let auth = UserRoleToken::new(&teacher);

        let owned = Class::new("초6_심화반", "2:50", Some(teacher.id));
        let theirs = Class::new("중2_A반", "4:30", Some(Uuid::new_v4()));
        let unassigned = Class::new("중3_B반", "6:10", None);

        assert!(ensure_visible(&owned, &auth).is_ok());
        assert!(ensure_visible(&theirs, &auth).is_err());
        assert!(ensure_visible(&unassigned, &auth).is_err());
    }

    #[test]
    fn director_may_manage_every_class() {
        let mut director =
            User::new("director@academy.example", "Director", "secret-pw", &[0u8; 16]);
        director.role = Role::Director;
        let auth = UserRoleToken::new(&director);

        for class in [
            Class::new("초6_심화반", "2:50", Some(Uuid::new_v4())),
            Class::new("중3_B반", "6:10", None),
        ] {
            assert!(ensure_visible(&class, &auth).is_ok());
        }
    }

    #[test]
    fn bad_dates_are_rejected_up_front() {
        assert!(parse_date("2025-09-01").is_ok());
        assert!(parse_date("september first").is_err());
    }
}
