use std::collections::BTreeMap;

use rocket::serde::json::Json;
use rocket::{Build, Rocket, Route};

pub mod class;
pub mod todo;
pub mod users;

use class::*;
use todo::*;
use users::*;

use utoipa::OpenApi;

use crate::{
    data::{class as cd, todo as td, user as ud, user::db as udb},
    resp::{jwt::doc::JWTAuth, problem::Problem},
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        signup,
        login_submit,
        logout,
        user_list,
        user_get,
        user_create,
        user_update,
        user_delete,
        class_list,
        class_get,
        class_create,
        class_update,
        class_delete,
        student_add,
        student_update,
        student_delete,
        students_replace,
        attendance_advance,
        record_add,
        record_update,
        record_delete,
        progress_textbook_delete,
        homework_textbook_delete,
        attendance_history_get,
        todo_get,
        todo_add,
        todo_remove
    ),
    components(schemas(
        Role,
        cd::Class,
        cd::Student,
        cd::ClassRecord,
        cd::ClassRecordPatch,
        cd::ClassCreateData,
        cd::ClassUpdateData,
        cd::StudentCreateData,
        cd::StudentUpdateData,
        cd::AttendanceStatus,
        cd::AttendanceSummary,
        td::TodoSheet,
        todo::TodoText,
        ud::UserResponse,
        udb::UserSignupData,
        udb::UserLoginData,
        udb::UserCreateData,
        udb::UserUpdateData,
        udb::UserCreatedResponse,
        Problem
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

#[get("/openapi.json")]
pub fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

pub fn api_v1() -> Vec<Route> {
    routes![
        signup,
        login_submit,
        logout,
        user_list,
        user_get,
        user_create,
        user_update,
        user_delete,
        class_list,
        class_get,
        class_create,
        class_update,
        class_delete,
        student_add,
        student_update,
        student_delete,
        students_replace,
        attendance_advance,
        record_add,
        record_update,
        record_delete,
        progress_textbook_delete,
        homework_textbook_delete,
        attendance_history_get,
        todo_get,
        todo_add,
        todo_remove,
        openapi_json
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/api/v1", api_v1())
}
