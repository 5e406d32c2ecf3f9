use chrono::NaiveDate;
use mongodb::options::ReplaceOptions;
use mongodb::Database;
use rocket::http::Status;
use uuid::Uuid;

use crate::data::user::filter;
use crate::resp::problem::Problem;

use super::{TodoSheet, TODO_COLLECTION_NAME};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn no_such_item() -> Problem {
        Problem::new_untyped(Status::NotFound, "No such to-do item.")
    }
}

/// To-do sheets are tiny per-user documents; every edit rereads and upserts
/// the whole sheet.
pub trait TodoDbExt {
    async fn get_todo_sheet(&self, user_id: Uuid) -> Result<TodoSheet, Problem>;
    async fn put_todo_sheet(&self, sheet: &TodoSheet) -> Result<(), Problem>;

    async fn add_todo(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        text: &str,
    ) -> Result<TodoSheet, Problem>;
    async fn remove_todo(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        index: usize,
    ) -> Result<TodoSheet, Problem>;
}

impl TodoDbExt for Database {
    async fn get_todo_sheet(&self, user_id: Uuid) -> Result<TodoSheet, Problem> {
        let sheet = self
            .collection(TODO_COLLECTION_NAME)
            .find_one(filter::by_id(user_id), None)
            .await
            .map_err(Problem::from)?;

        Ok(sheet.unwrap_or_else(|| TodoSheet::empty(user_id)))
    }

    async fn put_todo_sheet(&self, sheet: &TodoSheet) -> Result<(), Problem> {
        self.collection::<TodoSheet>(TODO_COLLECTION_NAME)
            .replace_one(
                filter::by_id(sheet.user_id),
                sheet,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(Problem::from)?;
        Ok(())
    }

    async fn add_todo(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        text: &str,
    ) -> Result<TodoSheet, Problem> {
        let mut sheet = self.get_todo_sheet(user_id).await?;
        if !sheet.add(date, text) {
            return Err(Problem::new_untyped(
                Status::BadRequest,
                "To-do text must not be empty.",
            ));
        }
        self.put_todo_sheet(&sheet).await?;
        Ok(sheet)
    }

    async fn remove_todo(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        index: usize,
    ) -> Result<TodoSheet, Problem> {
        let mut sheet = self.get_todo_sheet(user_id).await?;
        if !sheet.remove(date, index) {
            return Err(problem::no_such_item());
        }
        self.put_todo_sheet(&sheet).await?;
        Ok(sheet)
    }
}
