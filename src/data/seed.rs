use chrono::{NaiveDate, Utc};
use mongodb::Database;
use uuid::Uuid;

use crate::data::class::{
    AttendanceStatus, Class, ClassRecord, Student, CLASS_COLLECTION_NAME,
};
use crate::data::todo::db::TodoDbExt;
use crate::data::todo::TodoSheet;
use crate::resp::problem::Problem;

fn d(text: &str) -> NaiveDate {
    text.parse().expect("seed dates must be valid")
}

fn student(name: &str, attendance: AttendanceStatus, last_attended: &str) -> Student {
    Student {
        id: Uuid::new_v4(),
        name: name.to_string(),
        attendance,
        last_attended: Some(d(last_attended)),
    }
}

fn record(
    date: &str,
    progress: (&str, &str),
    homework: (&str, &str),
    memo: &str,
    is_completed: bool,
) -> ClassRecord {
    ClassRecord {
        date: d(date),
        progress_textbook: progress.0.to_string(),
        progress_range: progress.1.to_string(),
        homework_textbook: homework.0.to_string(),
        homework_range: homework.1.to_string(),
        memo: memo.to_string(),
        is_completed,
    }
}

fn sample_classes() -> Vec<Class> {
    let mut advanced = Class::new("초6_심화반", "2:50", None);
    advanced.students = vec![
        student("김민준", AttendanceStatus::Present, "2025-09-01"),
        student("박서연", AttendanceStatus::Absent, "2025-08-29"),
        student("이도윤", AttendanceStatus::Late, "2025-09-01"),
    ];
    advanced.records = vec![
        record(
            "2025-09-01",
            ("쎈수학", "12-15"),
            ("쎈수학", "10-11"),
            "민준이 질문 많았음. 개념 보충 필요.",
            true,
        ),
        record("2025-09-03", ("쎈수학", "16-18"), ("쎈수학", "12-15"), "", false),
    ];
    advanced.progress_textbooks = vec!["개념원리".to_string(), "쎈수학".to_string()];
    advanced.homework_textbooks = vec!["쎈수학".to_string()];

    let mut middle = Class::new("중2_A반", "4:30", None);
    middle.students = vec![
        student("최지우", AttendanceStatus::Unchecked, "2025-08-30"),
        student("한강민", AttendanceStatus::Unchecked, "2025-08-30"),
        student("윤아인", AttendanceStatus::Unchecked, "2025-08-30"),
    ];
    middle.records = vec![
        record(
            "2025-09-01",
            ("일품 중2", "22-25"),
            ("일품 중2", "20-21"),
            "다음 주 단원평가 예정.",
            true,
        ),
        record(
            "2025-09-02",
            ("블랙라벨", "5-8"),
            ("일품 중2", "22-24"),
            "",
            false,
        ),
    ];
    middle.progress_textbooks = vec!["블랙라벨".to_string(), "일품 중2".to_string()];
    middle.homework_textbooks = vec!["일품 중2".to_string()];

    vec![advanced, middle]
}

/// Populates an empty academy with example classes and a starter to-do sheet
/// so the first director has something to look at. Runs once, right after the
/// bootstrap sign-up.
pub async fn install_sample_data(db: &Database, director_id: Uuid) -> Result<(), Problem> {
    db.collection::<Class>(CLASS_COLLECTION_NAME)
        .insert_many(sample_classes(), None)
        .await
        .map_err(Problem::from)?;

    let mut sheet = TodoSheet::empty(director_id);
    let today = Utc::now().date_naive();
    sheet.add(today, "샘플 데이터 확인하기");
    sheet.add(today, "설정 탭에서 강사 계정 추가하기");
    db.put_todo_sheet(&sheet).await?;

    tracing::info!("Installed sample data for first director {}", director_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::class::attendance_history;

    #[test]
    fn sample_catalogs_are_sorted_and_unique() {
        for class in sample_classes() {
            let mut sorted = class.progress_textbooks.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(class.progress_textbooks, sorted);
        }
    }

    #[test]
    fn sample_history_matches_expected_counts() {
        let classes = sample_classes();
        let history = attendance_history(&classes);

        let sept_first = &history[&d("2025-09-01")];
        assert_eq!(sept_first.len(), 2, "both sample classes record 2025-09-01");

        let advanced = sept_first
            .iter()
            .find(|s| s.class_name == "초6_심화반")
            .unwrap();
        assert_eq!(
            (advanced.present, advanced.absent, advanced.late),
            (1, 1, 1)
        );
    }

    #[test]
    fn sample_record_dates_are_unique_per_class() {
        for class in sample_classes() {
            let mut rebuilt = Class::new(&class.name, &class.time, None);
            for record in class.records.clone() {
                rebuilt.add_record(record).expect("sample dates must not collide");
            }
        }
    }
}
