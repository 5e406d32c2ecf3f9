use bson::doc;
use chrono::NaiveDate;
use mongodb::Database;
use rocket::futures::StreamExt;
use rocket::http::Status;
use uuid::Uuid;

use crate::resp::problem::Problem;

use super::{
    AttendanceStatus, Class, ClassCreateData, ClassDataError, ClassRecord, ClassRecordPatch,
    ClassUpdateData, Student, StudentCreateData, StudentUpdateData, CLASS_COLLECTION_NAME,
};

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;
    use uuid::Uuid;

    #[inline]
    pub fn not_found(id: Uuid) -> Problem {
        Problem::new_untyped(Status::NotFound, "Class doesn't exist.")
            .insert("id", id.to_string())
            .clone()
    }
}

impl From<ClassDataError> for Problem {
    fn from(e: ClassDataError) -> Self {
        let status = match e {
            ClassDataError::DuplicateRecordDate(_) => Status::Conflict,
            ClassDataError::UnknownRecordDate(_) => Status::NotFound,
            ClassDataError::UnknownStudent(_) => Status::NotFound,
        };
        let title = match e {
            ClassDataError::DuplicateRecordDate(_) => "A record for this date already exists.",
            ClassDataError::UnknownRecordDate(_) => "No record exists for this date.",
            ClassDataError::UnknownStudent(_) => "Student doesn't exist in this class.",
        };
        Problem::new_untyped(status, title).detail(e).clone()
    }
}

pub(crate) mod filter {
    use bson::{doc, Document};
    use uuid::Uuid;

    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": bson::Uuid::from_uuid_1(id) }
    }
}

/// Class mutations are read-modify-write: load the document, apply the pure
/// edit on [`Class`], then `$set` only the mutated fields back. Concurrent
/// writers race at that granularity; the last write wins.
pub trait ClassDbExt {
    async fn list_classes(&self) -> Result<Vec<Class>, Problem>;
    async fn get_class(&self, id: Uuid) -> Result<Option<Class>, Problem>;
    async fn load_class(&self, id: Uuid) -> Result<Class, Problem>;

    async fn create_class(&self, data: ClassCreateData) -> Result<Class, Problem>;
    async fn update_class_info(&self, id: Uuid, update: ClassUpdateData) -> Result<Class, Problem>;
    async fn delete_class(&self, id: Uuid) -> Result<Option<Class>, Problem>;

    async fn add_student(&self, class_id: Uuid, data: StudentCreateData) -> Result<Class, Problem>;
    async fn update_student(
        &self,
        class_id: Uuid,
        student_id: Uuid,
        update: StudentUpdateData,
    ) -> Result<Class, Problem>;
    async fn remove_student(&self, class_id: Uuid, student_id: Uuid) -> Result<Class, Problem>;

    /// Replaces the whole attendance sheet, the bulk save path used after
    /// checking off a session.
    async fn set_students(&self, class_id: Uuid, students: Vec<Student>) -> Result<Class, Problem>;
    async fn advance_attendance(
        &self,
        class_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttendanceStatus, Problem>;

    async fn add_record(&self, class_id: Uuid, record: ClassRecord) -> Result<Class, Problem>;
    async fn update_record(
        &self,
        class_id: Uuid,
        date: NaiveDate,
        patch: ClassRecordPatch,
    ) -> Result<Class, Problem>;
    async fn remove_record(&self, class_id: Uuid, date: NaiveDate) -> Result<Class, Problem>;

    async fn remove_progress_textbook(&self, class_id: Uuid, name: &str)
        -> Result<Class, Problem>;
    async fn remove_homework_textbook(&self, class_id: Uuid, name: &str)
        -> Result<Class, Problem>;
}

async fn store_students(db: &Database, class: &Class) -> Result<(), Problem> {
    let students = bson::to_bson(&class.students).map_err(|_| bson_encode_problem())?;
    db.collection::<Class>(CLASS_COLLECTION_NAME)
        .update_one(
            filter::by_id(class.id),
            doc! { "$set": { "students": students } },
            None,
        )
        .await
        .map_err(Problem::from)?;
    Ok(())
}

async fn store_records_and_textbooks(db: &Database, class: &Class) -> Result<(), Problem> {
    let records = bson::to_bson(&class.records).map_err(|_| bson_encode_problem())?;
    let progress = bson::to_bson(&class.progress_textbooks).map_err(|_| bson_encode_problem())?;
    let homework = bson::to_bson(&class.homework_textbooks).map_err(|_| bson_encode_problem())?;

    db.collection::<Class>(CLASS_COLLECTION_NAME)
        .update_one(
            filter::by_id(class.id),
            doc! { "$set": {
                "records": records,
                "progressTextbooks": progress,
                "homeworkTextbooks": homework,
            } },
            None,
        )
        .await
        .map_err(Problem::from)?;
    Ok(())
}

fn bson_encode_problem() -> Problem {
    Problem::new_untyped(
        Status::InternalServerError,
        "Unable to serialize class data into BSON.",
    )
}

impl ClassDbExt for Database {
    async fn list_classes(&self) -> Result<Vec<Class>, Problem> {
        let mut cursor = self
            .collection::<Class>(CLASS_COLLECTION_NAME)
            .find(None, None)
            .await
            .map_err(Problem::from)?;

        let mut classes = vec![];
        while let Some(result) = cursor.next().await {
            match result {
                Ok(class) => classes.push(class),
                Err(_) => {
                    tracing::warn!("Unable to deserialize Class document.")
                }
            }
        }

        Ok(classes)
    }

    async fn get_class(&self, id: Uuid) -> Result<Option<Class>, Problem> {
        self.collection(CLASS_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn load_class(&self, id: Uuid) -> Result<Class, Problem> {
        self.get_class(id).await?.ok_or_else(|| problem::not_found(id))
    }

    async fn create_class(&self, data: ClassCreateData) -> Result<Class, Problem> {
        let class = Class::new(data.name, data.time, data.teacher_id);

        self.collection::<Class>(CLASS_COLLECTION_NAME)
            .insert_one(&class, None)
            .await
            .map_err(Problem::from)?;

        Ok(class)
    }

    async fn update_class_info(&self, id: Uuid, update: ClassUpdateData) -> Result<Class, Problem> {
        let mut set = bson::Document::new();
        if let Some(name) = update.name {
            set.insert("name", name);
        }
        if let Some(time) = update.time {
            set.insert("time", time);
        }
        if let Some(teacher_id) = update.teacher_id {
            match teacher_id {
                Some(teacher_id) => set.insert("teacherId", teacher_id.to_string()),
                None => set.insert("teacherId", bson::Bson::Null),
            };
        }

        if !set.is_empty() {
            self.collection::<Class>(CLASS_COLLECTION_NAME)
                .update_one(filter::by_id(id), doc! { "$set": set }, None)
                .await
                .map_err(Problem::from)?;
        }

        self.load_class(id).await
    }

    async fn delete_class(&self, id: Uuid) -> Result<Option<Class>, Problem> {
        self.collection(CLASS_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(Problem::from)
    }

    async fn add_student(&self, class_id: Uuid, data: StudentCreateData) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.add_student(data);
        store_students(self, &class).await?;
        Ok(class)
    }

    async fn update_student(
        &self,
        class_id: Uuid,
        student_id: Uuid,
        update: StudentUpdateData,
    ) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.update_student(student_id, update)?;
        store_students(self, &class).await?;
        Ok(class)
    }

    async fn remove_student(&self, class_id: Uuid, student_id: Uuid) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.remove_student(student_id)?;
        store_students(self, &class).await?;
        Ok(class)
    }

    async fn set_students(&self, class_id: Uuid, students: Vec<Student>) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.students = students;
        store_students(self, &class).await?;
        Ok(class)
    }

    async fn advance_attendance(
        &self,
        class_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttendanceStatus, Problem> {
        let mut class = self.load_class(class_id).await?;
        let status = class.advance_attendance(student_id)?;
        store_students(self, &class).await?;
        Ok(status)
    }

    async fn add_record(&self, class_id: Uuid, record: ClassRecord) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.add_record(record)?;
        store_records_and_textbooks(self, &class).await?;
        Ok(class)
    }

    async fn update_record(
        &self,
        class_id: Uuid,
        date: NaiveDate,
        patch: ClassRecordPatch,
    ) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.update_record(date, patch)?;
        store_records_and_textbooks(self, &class).await?;
        Ok(class)
    }

    async fn remove_record(&self, class_id: Uuid, date: NaiveDate) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.remove_record(date)?;
        store_records_and_textbooks(self, &class).await?;
        Ok(class)
    }

    async fn remove_progress_textbook(
        &self,
        class_id: Uuid,
        name: &str,
    ) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.remove_progress_textbook(name);
        store_records_and_textbooks(self, &class).await?;
        Ok(class)
    }

    async fn remove_homework_textbook(
        &self,
        class_id: Uuid,
        name: &str,
    ) -> Result<Class, Problem> {
        let mut class = self.load_class(class_id).await?;
        class.remove_homework_textbook(name);
        store_records_and_textbooks(self, &class).await?;
        Ok(class)
    }
}
