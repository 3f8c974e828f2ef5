//! Derived metrics over already-fetched records.
//!
//! Everything here is a pure function of its inputs. None of these reads
//! the cache, and none of them fails: missing max scores and empty lists
//! fall back to the defaults documented on each function.

use chrono::{DateTime, Utc};

use crate::models::{Attendance, Fee, FeeStatus, Grade};

/// Percentage points per GPA point (100% maps to 4.0).
pub const GPA_SCALE_DIVISOR: f64 = 25.0;

/// Score as a percentage of the grade's max score.
///
/// A missing max score counts as the schema default; a max score of exactly
/// zero yields 0 rather than dividing by zero.
pub fn grade_percentage(grade: &Grade) -> f64 {
    let max = grade.effective_max_score();
    if max == 0.0 {
        return 0.0;
    }
    grade.score / max * 100.0
}

/// Grade point average on a 0-4.0 scale, rounded to one decimal.
/// Returns 0 for no grades.
pub fn gpa(grades: &[Grade]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    let total: f64 = grades.iter().map(grade_percentage).sum();
    round_to_tenth(total / grades.len() as f64 / GPA_SCALE_DIVISOR)
}

/// Overall payment standing of a set of fees at `now`.
///
/// `Paid` when there are no fees or all are paid, `Overdue` when any unpaid
/// fee was due strictly before `now`, otherwise `Pending`. A fee without a
/// due date is never overdue.
pub fn fee_status(fees: &[Fee], now: DateTime<Utc>) -> FeeStatus {
    let mut unpaid = fees.iter().filter(|fee| !fee.is_paid()).peekable();
    if unpaid.peek().is_none() {
        return FeeStatus::Paid;
    }
    if unpaid.any(|fee| fee.is_past_due(now)) {
        FeeStatus::Overdue
    } else {
        FeeStatus::Pending
    }
}

/// Share of records marked present, as a percentage. 0 for no records.
pub fn attendance_percentage(records: &[Attendance]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let present = records.iter().filter(|r| r.is_present()).count();
    present as f64 / records.len() as f64 * 100.0
}

/// Sum of the amounts still owed.
pub fn outstanding_balance(fees: &[Fee]) -> f64 {
    fees.iter()
        .filter(|fee| !fee.is_paid())
        .map(|fee| fee.amount)
        .sum()
}

/// First `n` items of an already ordered list.
pub fn recent<T>(items: &[T], n: usize) -> &[T] {
    &items[..n.min(items.len())]
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use chrono::{Duration, NaiveDate};

    fn grade(score: f64, max_score: Option<f64>) -> Grade {
        Grade {
            score,
            max_score,
            ..Default::default()
        }
    }

    fn fee(status: FeeStatus, due_date: Option<NaiveDate>) -> Fee {
        Fee {
            amount: 100.0,
            status,
            due_date,
            ..Default::default()
        }
    }

    fn attendance(status: AttendanceStatus) -> Attendance {
        Attendance {
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_gpa_empty_is_zero() {
        assert_eq!(gpa(&[]), 0.0);
    }

    #[test]
    fn test_gpa_two_grades() {
        let grades = [grade(80.0, Some(100.0)), grade(90.0, Some(100.0))];
        assert_eq!(gpa(&grades), 3.4);
    }

    #[test]
    fn test_gpa_missing_max_uses_default() {
        assert_eq!(gpa(&[grade(75.0, None)]), 3.0);
        assert_eq!(gpa(&[grade(45.0, Some(50.0))]), 3.6);
    }

    #[test]
    fn test_gpa_zero_max_contributes_zero() {
        let grades = [grade(10.0, Some(0.0)), grade(100.0, Some(100.0))];
        assert_eq!(grade_percentage(&grades[0]), 0.0);
        assert_eq!(gpa(&grades), 2.0);
        assert!(gpa(&[grade(0.0, Some(0.0))]).is_finite());
    }

    #[test]
    fn test_gpa_rounds_to_one_decimal() {
        // 87% -> 3.48
        assert_eq!(gpa(&[grade(87.0, Some(100.0))]), 3.5);
        // 83% -> 3.32
        assert_eq!(gpa(&[grade(83.0, Some(100.0))]), 3.3);
    }

    #[test]
    fn test_fee_status_empty_and_all_paid() {
        let now = Utc::now();
        assert_eq!(fee_status(&[], now), FeeStatus::Paid);
        let fees = [
            fee(FeeStatus::Paid, Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())),
            fee(FeeStatus::Paid, None),
        ];
        assert_eq!(fee_status(&fees, now), FeeStatus::Paid);
    }

    #[test]
    fn test_fee_status_past_due_is_overdue() {
        let now = Utc::now();
        let yesterday = (now - Duration::days(1)).date_naive();
        let tomorrow = (now + Duration::days(1)).date_naive();
        assert_eq!(
            fee_status(&[fee(FeeStatus::Pending, Some(yesterday))], now),
            FeeStatus::Overdue
        );
        assert_eq!(
            fee_status(&[fee(FeeStatus::Pending, Some(tomorrow))], now),
            FeeStatus::Pending
        );
    }

    #[test]
    fn test_fee_status_ignores_paid_past_due() {
        let now = Utc::now();
        let last_year = (now - Duration::days(365)).date_naive();
        let next_week = (now + Duration::days(7)).date_naive();
        let fees = [
            fee(FeeStatus::Paid, Some(last_year)),
            fee(FeeStatus::Pending, Some(next_week)),
        ];
        assert_eq!(fee_status(&fees, now), FeeStatus::Pending);
        assert_eq!(fee_status(&[fee(FeeStatus::Overdue, None)], now), FeeStatus::Pending);
    }

    #[test]
    fn test_attendance_percentage() {
        assert_eq!(attendance_percentage(&[]), 0.0);

        let mut records: Vec<Attendance> = (0..8).map(|_| attendance(AttendanceStatus::Present)).collect();
        records.extend((0..2).map(|_| attendance(AttendanceStatus::Absent)));
        assert_eq!(attendance_percentage(&records), 80.0);

        let late = [attendance(AttendanceStatus::Late), attendance(AttendanceStatus::Present)];
        assert_eq!(attendance_percentage(&late), 50.0);
    }

    #[test]
    fn test_outstanding_balance() {
        let fees = [
            fee(FeeStatus::Paid, None),
            fee(FeeStatus::Pending, None),
            fee(FeeStatus::Overdue, None),
        ];
        assert_eq!(outstanding_balance(&fees), 200.0);
        assert_eq!(outstanding_balance(&[]), 0.0);
    }

    #[test]
    fn test_recent() {
        let items = [1, 2, 3, 4, 5, 6];
        assert_eq!(recent(&items, 3), &[1, 2, 3]);
        assert_eq!(recent(&items, 10).len(), 6);
        assert!(recent::<i32>(&[], 5).is_empty());
    }
}
