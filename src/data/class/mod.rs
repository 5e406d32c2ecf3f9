use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::role::Role;

pub mod db;

pub static CLASS_COLLECTION_NAME: &str = "classes";

/// Per-student attendance state for the current session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Unchecked,
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    /// Advances one step along the fixed check-off cycle:
    /// unchecked → present → late → absent → unchecked.
    pub fn advance(self) -> AttendanceStatus {
        match self {
            AttendanceStatus::Unchecked => AttendanceStatus::Present,
            AttendanceStatus::Present => AttendanceStatus::Late,
            AttendanceStatus::Late => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Unchecked,
        }
    }
}

impl Default for AttendanceStatus {
    fn default() -> Self {
        AttendanceStatus::Unchecked
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub attendance: AttendanceStatus,
    #[serde(default)]
    pub last_attended: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentCreateData {
    pub name: String,
    #[serde(default)]
    pub last_attended: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdateData {
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<String>, format = Date)]
    pub last_attended: Option<Option<NaiveDate>>,
}

/// Page coverage is stored as a display string ("12-15", "7"). This is the
/// structured form it round-trips through while being edited.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PageRange {
    pub start: u32,
    pub end: Option<u32>,
}

lazy_static! {
    static ref PAGE_RANGE_PATTERN: Regex =
        Regex::new(r"(\d+)\s*-?\s*(\d*)").expect("page range pattern must be valid");
}

impl PageRange {
    pub fn parse(text: &str) -> Option<PageRange> {
        let captures = PAGE_RANGE_PATTERN.captures(text)?;

        let start: u32 = captures.get(1)?.as_str().parse().ok()?;
        let end: Option<u32> = captures
            .get(2)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok());

        Some(PageRange { start, end })
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) if end != self.start => write!(f, "{}-{}", self.start, end),
            _ => write!(f, "{}", self.start),
        }
    }
}

/// Page strings are stored in their compact rendering ("12-15", "7") when
/// parseable; free-form text is kept as typed, trimmed.
fn normalize_range(range: &str) -> String {
    match PageRange::parse(range) {
        Some(pages) => pages.to_string(),
        None => range.trim().to_string(),
    }
}

/// One dated entry capturing progress/homework coverage and notes for a class
/// session. `date` is the natural key within a class.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub progress_textbook: String,
    #[serde(default)]
    pub progress_range: String,
    #[serde(default)]
    pub homework_textbook: String,
    #[serde(default)]
    pub homework_range: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub is_completed: bool,
}

/// Partial update of an existing record; the date itself is immutable.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecordPatch {
    pub progress_textbook: Option<String>,
    pub progress_range: Option<String>,
    pub homework_textbook: Option<String>,
    pub homework_range: Option<String>,
    pub memo: Option<String>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ClassDataError {
    #[error("a record dated {0} already exists")]
    DuplicateRecordDate(NaiveDate),
    #[error("no record dated {0}")]
    UnknownRecordDate(NaiveDate),
    #[error("no student {0} in class")]
    UnknownStudent(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub name: String,
    /// Display label for the session time slot, e.g. "2:50".
    pub time: String,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,

    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub records: Vec<ClassRecord>,
    #[serde(default)]
    pub progress_textbooks: Vec<String>,
    #[serde(default)]
    pub homework_textbooks: Vec<String>,
}

impl Class {
    pub fn new(name: impl ToString, time: impl ToString, teacher_id: Option<Uuid>) -> Class {
        Class {
            id: Uuid::new_v4(),
            name: name.to_string(),
            time: time.to_string(),
            teacher_id,
            students: vec![],
            records: vec![],
            progress_textbooks: vec![],
            homework_textbooks: vec![],
        }
    }

    /// Directors see every class; teachers only classes assigned to them.
    pub fn visible_to(&self, viewer: Uuid, role: Role) -> bool {
        role >= Role::Director || self.teacher_id == Some(viewer)
    }

    pub fn student(&self, id: Uuid) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn add_student(&mut self, data: StudentCreateData) -> &Student {
        let student = Student {
            id: Uuid::new_v4(),
            name: data.name,
            attendance: AttendanceStatus::Unchecked,
            last_attended: data.last_attended,
        };
        self.students.push(student);
        self.students.last().expect("student was just pushed")
    }

    pub fn update_student(
        &mut self,
        id: Uuid,
        update: StudentUpdateData,
    ) -> Result<&Student, ClassDataError> {
        let student = self
            .students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ClassDataError::UnknownStudent(id))?;

        if let Some(name) = update.name {
            student.name = name;
        }
        if let Some(last_attended) = update.last_attended {
            student.last_attended = last_attended;
        }

        Ok(student)
    }

    pub fn remove_student(&mut self, id: Uuid) -> Result<(), ClassDataError> {
        let before = self.students.len();
        self.students.retain(|s| s.id != id);
        if self.students.len() == before {
            return Err(ClassDataError::UnknownStudent(id));
        }
        Ok(())
    }

    /// Advances one student's attendance one step along the cycle, returning
    /// the new status.
    pub fn advance_attendance(&mut self, id: Uuid) -> Result<AttendanceStatus, ClassDataError> {
        let student = self
            .students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ClassDataError::UnknownStudent(id))?;

        student.attendance = student.attendance.advance();
        Ok(student.attendance)
    }

    pub fn record(&self, date: NaiveDate) -> Option<&ClassRecord> {
        self.records.iter().find(|r| r.date == date)
    }

    /// Inserts a new dated record. A record whose date collides with an
    /// existing one is rejected and the class is left unchanged.
    pub fn add_record(&mut self, mut record: ClassRecord) -> Result<(), ClassDataError> {
        if self.records.iter().any(|r| r.date == record.date) {
            return Err(ClassDataError::DuplicateRecordDate(record.date));
        }

        record.progress_range = normalize_range(&record.progress_range);
        record.homework_range = normalize_range(&record.homework_range);

        self.absorb_textbooks(&record.progress_textbook, &record.homework_textbook);
        self.records.push(record);
        Ok(())
    }

    /// Merges a partial update into the record for `date`.
    pub fn update_record(
        &mut self,
        date: NaiveDate,
        patch: ClassRecordPatch,
    ) -> Result<(), ClassDataError> {
        let position = self
            .records
            .iter()
            .position(|r| r.date == date)
            .ok_or(ClassDataError::UnknownRecordDate(date))?;

        self.absorb_textbooks(
            patch.progress_textbook.as_deref().unwrap_or(""),
            patch.homework_textbook.as_deref().unwrap_or(""),
        );

        let record = &mut self.records[position];
        if let Some(progress_textbook) = patch.progress_textbook {
            record.progress_textbook = progress_textbook;
        }
        if let Some(progress_range) = patch.progress_range {
            record.progress_range = normalize_range(&progress_range);
        }
        if let Some(homework_textbook) = patch.homework_textbook {
            record.homework_textbook = homework_textbook;
        }
        if let Some(homework_range) = patch.homework_range {
            record.homework_range = normalize_range(&homework_range);
        }
        if let Some(memo) = patch.memo {
            record.memo = memo;
        }
        if let Some(is_completed) = patch.is_completed {
            record.is_completed = is_completed;
        }

        Ok(())
    }

    pub fn remove_record(&mut self, date: NaiveDate) -> Result<(), ClassDataError> {
        let before = self.records.len();
        self.records.retain(|r| r.date != date);
        if self.records.len() == before {
            return Err(ClassDataError::UnknownRecordDate(date));
        }
        Ok(())
    }

    /// Records any textbook name a record mentions into the per-class
    /// catalogs, keeping each catalog duplicate-free and sorted ascending.
    fn absorb_textbooks(&mut self, progress: &str, homework: &str) {
        merge_textbook(&mut self.progress_textbooks, progress);
        merge_textbook(&mut self.homework_textbooks, homework);
    }

    pub fn remove_progress_textbook(&mut self, name: &str) {
        self.progress_textbooks.retain(|t| t != name);
    }

    pub fn remove_homework_textbook(&mut self, name: &str) {
        self.homework_textbooks.retain(|t| t != name);
    }

    /// Folds the class's current student statuses into per-status counts.
    pub fn attendance_summary(&self) -> AttendanceSummary {
        let mut summary = AttendanceSummary {
            class_id: self.id,
            class_name: self.name.clone(),
            time: self.time.clone(),
            present: 0,
            absent: 0,
            late: 0,
        };

        for student in &self.students {
            match student.attendance {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Absent => summary.absent += 1,
                AttendanceStatus::Late => summary.late += 1,
                AttendanceStatus::Unchecked => {}
            }
        }

        summary
    }
}

fn merge_textbook(catalog: &mut Vec<String>, name: &str) {
    if name.is_empty() || catalog.iter().any(|t| t == name) {
        return;
    }
    catalog.push(name.to_string());
    catalog.sort();
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassCreateData {
    pub name: String,
    pub time: String,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
}

/// Partial update of class info; embedded collections have their own
/// operations. `teacherId: null` clears the assignment, an absent field
/// leaves it alone.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassUpdateData {
    pub name: Option<String>,
    pub time: Option<String>,
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub teacher_id: Option<Option<Uuid>>,
}

/// Derived attendance counts for one class on one recorded date.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub class_id: Uuid,
    pub class_name: String,
    pub time: String,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

/// Derived view: for every date any class holds a record for, one summary per
/// such class. Recomputed on demand from current student statuses.
pub fn attendance_history(classes: &[Class]) -> BTreeMap<NaiveDate, Vec<AttendanceSummary>> {
    let mut history: BTreeMap<NaiveDate, Vec<AttendanceSummary>> = BTreeMap::new();

    for class in classes {
        for record in &class.records {
            history
                .entry(record.date)
                .or_default()
                .push(class.attendance_summary());
        }
    }

    history
}

/// Serde adapter distinguishing an absent field (outer `None`) from an
/// explicit `null` (inner `None`) in partial updates.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("valid test date")
    }

    fn record(day: &str, progress: &str, homework: &str) -> ClassRecord {
        ClassRecord {
            date: date(day),
            progress_textbook: progress.to_string(),
            progress_range: "12-15".to_string(),
            homework_textbook: homework.to_string(),
            homework_range: "10-11".to_string(),
            memo: String::new(),
            is_completed: false,
        }
    }

    #[test]
    fn attendance_cycle_is_fixed_order() {
        use AttendanceStatus::*;
        assert_eq!(Unchecked.advance(), Present);
        assert_eq!(Present.advance(), Late);
        assert_eq!(Late.advance(), Absent);
        assert_eq!(Absent.advance(), Unchecked);
    }

    #[test]
    fn four_advances_return_to_start() {
        use AttendanceStatus::*;
        for start in [Unchecked, Present, Late, Absent] {
            assert_eq!(start.advance().advance().advance().advance(), start);
        }
    }

    #[test]
    fn duplicate_record_date_is_rejected_without_changes() {
        let mut class = Class::new("초6_심화반", "2:50", None);
        class.add_record(record("2025-09-01", "쎈수학", "쎈수학")).unwrap();

        let before_records = class.records.len();
        let before_catalog = class.progress_textbooks.clone();

        let result = class.add_record(record("2025-09-01", "개념원리", "개념원리"));
        assert_eq!(
            result,
            Err(ClassDataError::DuplicateRecordDate(date("2025-09-01")))
        );
        assert_eq!(class.records.len(), before_records);
        assert_eq!(class.progress_textbooks, before_catalog);
    }

    #[test]
    fn new_textbook_names_are_added_once_and_sorted() {
        let mut class = Class::new("초6_심화반", "2:50", None);
        class.add_record(record("2025-09-01", "쎈수학", "쎈수학")).unwrap();
        class.add_record(record("2025-09-03", "개념원리", "쎈수학")).unwrap();

        assert_eq!(class.progress_textbooks, vec!["개념원리", "쎈수학"]);
        assert_eq!(class.homework_textbooks, vec!["쎈수학"]);

        // Re-mentioning an existing name changes nothing.
        class.add_record(record("2025-09-05", "쎈수학", "쎈수학")).unwrap();
        assert_eq!(class.progress_textbooks, vec!["개념원리", "쎈수학"]);
    }

    #[test]
    fn record_update_merges_partial_fields_and_absorbs_textbooks() {
        let mut class = Class::new("초6_심화반", "2:50", None);
        class.add_record(record("2025-09-01", "쎈수학", "쎈수학")).unwrap();

        class
            .update_record(
                date("2025-09-01"),
                ClassRecordPatch {
                    memo: Some("개념 보충 필요.".to_string()),
                    is_completed: Some(true),
                    progress_textbook: Some("블랙라벨".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = class.record(date("2025-09-01")).unwrap();
        assert_eq!(updated.memo, "개념 보충 필요.");
        assert!(updated.is_completed);
        assert_eq!(updated.progress_textbook, "블랙라벨");
        // Untouched fields survive the merge.
        assert_eq!(updated.homework_range, "10-11");
        assert_eq!(class.progress_textbooks, vec!["블랙라벨", "쎈수학"]);
    }

    #[test]
    fn updating_unknown_record_date_fails() {
        let mut class = Class::new("초6_심화반", "2:50", None);
        let result = class.update_record(date("2025-09-01"), ClassRecordPatch::default());
        assert_eq!(
            result,
            Err(ClassDataError::UnknownRecordDate(date("2025-09-01")))
        );
    }

    #[test]
    fn teacher_sees_only_assigned_classes() {
        let teacher = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mine = Class::new("초6_심화반", "2:50", Some(teacher));
        let theirs = Class::new("중2_A반", "4:30", Some(other));
        let unassigned = Class::new("중3_B반", "6:10", None);

        assert!(mine.visible_to(teacher, Role::Teacher));
        assert!(!theirs.visible_to(teacher, Role::Teacher));
        assert!(!unassigned.visible_to(teacher, Role::Teacher));

        let director = Uuid::new_v4();
        for class in [&mine, &theirs, &unassigned] {
            assert!(class.visible_to(director, Role::Director));
        }
    }

    #[test]
    fn attendance_history_counts_current_statuses() {
        let mut class = Class::new("초6_심화반", "2:50", None);
        class.students = vec![
            Student {
                id: Uuid::new_v4(),
                name: "김민준".to_string(),
                attendance: AttendanceStatus::Present,
                last_attended: Some(date("2025-09-01")),
            },
            Student {
                id: Uuid::new_v4(),
                name: "박서연".to_string(),
                attendance: AttendanceStatus::Absent,
                last_attended: Some(date("2025-08-29")),
            },
            Student {
                id: Uuid::new_v4(),
                name: "이도윤".to_string(),
                attendance: AttendanceStatus::Late,
                last_attended: Some(date("2025-09-01")),
            },
        ];
        class.add_record(record("2025-09-01", "쎈수학", "쎈수학")).unwrap();

        let history = attendance_history(&[class]);
        let summaries = &history[&date("2025-09-01")];
        assert_eq!(summaries.len(), 1);

        let summary = &summaries[0];
        assert_eq!(summary.class_name, "초6_심화반");
        assert_eq!(summary.time, "2:50");
        assert_eq!((summary.present, summary.absent, summary.late), (1, 1, 1));
    }

    #[test]
    fn unchecked_students_count_toward_no_bucket() {
        let mut class = Class::new("중2_A반", "4:30", None);
        class.add_student(StudentCreateData {
            name: "최지우".to_string(),
            last_attended: None,
        });

        let summary = class.attendance_summary();
        assert_eq!((summary.present, summary.absent, summary.late), (0, 0, 0));
    }

    #[test]
    fn student_lifecycle_within_class() {
        let mut class = Class::new("중2_A반", "4:30", None);
        let id = class
            .add_student(StudentCreateData {
                name: "한강민".to_string(),
                last_attended: None,
            })
            .id;

        assert_eq!(class.student(id).unwrap().attendance, AttendanceStatus::Unchecked);

        assert_eq!(class.advance_attendance(id).unwrap(), AttendanceStatus::Present);

        class
            .update_student(
                id,
                StudentUpdateData {
                    name: None,
                    last_attended: Some(Some(date("2025-09-01"))),
                },
            )
            .unwrap();
        assert_eq!(
            class.student(id).unwrap().last_attended,
            Some(date("2025-09-01"))
        );

        class.remove_student(id).unwrap();
        assert_eq!(
            class.remove_student(id),
            Err(ClassDataError::UnknownStudent(id))
        );
    }

    #[test]
    fn page_range_parses_stored_display_strings() {
        assert_eq!(
            PageRange::parse("12-15"),
            Some(PageRange {
                start: 12,
                end: Some(15)
            })
        );
        assert_eq!(PageRange::parse("7"), Some(PageRange { start: 7, end: None }));
        assert_eq!(
            PageRange::parse("P. 12 - 15"),
            Some(PageRange {
                start: 12,
                end: Some(15)
            })
        );
        assert_eq!(PageRange::parse("none"), None);
    }

    #[test]
    fn record_writes_normalize_page_ranges() {
        let mut class = Class::new("초6_심화반", "2:50", None);
        let mut loose = record("2025-09-01", "쎈수학", "쎈수학");
        loose.progress_range = "P. 12 - 15".to_string();
        loose.homework_range = " 복습 프린트 ".to_string();
        class.add_record(loose).unwrap();

        let stored = class.record(date("2025-09-01")).unwrap();
        assert_eq!(stored.progress_range, "12-15");
        // Free-form text survives, trimmed.
        assert_eq!(stored.homework_range, "복습 프린트");

        class
            .update_record(
                date("2025-09-01"),
                ClassRecordPatch {
                    homework_range: Some("16 - 16".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            class.record(date("2025-09-01")).unwrap().homework_range,
            "16"
        );
    }

    #[test]
    fn page_range_renders_compactly() {
        assert_eq!(
            PageRange {
                start: 12,
                end: Some(15)
            }
            .to_string(),
            "12-15"
        );
        assert_eq!(
            PageRange {
                start: 12,
                end: Some(12)
            }
            .to_string(),
            "12"
        );
        assert_eq!(PageRange { start: 7, end: None }.to_string(), "7");
    }

    #[test]
    fn removing_textbooks_leaves_records_alone() {
        let mut class = Class::new("초6_심화반", "2:50", None);
        class.add_record(record("2025-09-01", "쎈수학", "쎈수학")).unwrap();

        class.remove_progress_textbook("쎈수학");
        assert!(class.progress_textbooks.is_empty());
        assert_eq!(class.record(date("2025-09-01")).unwrap().progress_textbook, "쎈수학");
    }
}
