use chrono::{Datelike, Months, NaiveDate};

/// Calendar month containing `today`, as inclusive `(start, end)` dates.
pub fn month_period(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = first_of_month(today);
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(start);
    (start, end)
}

/// Due date for an invoice issued on `today`: `due_day` of the current month,
/// or of the next month when that day has already passed. Days past the end
/// of a short month clamp to its last day.
pub fn due_date_for(today: NaiveDate, due_day: u32) -> NaiveDate {
    let due_day = due_day.clamp(1, 31);
    let this_month = day_in_month(first_of_month(today), due_day);
    if this_month >= today {
        return this_month;
    }
    let next_month = first_of_month(today)
        .checked_add_months(Months::new(1))
        .unwrap_or(today);
    day_in_month(next_month, due_day)
}

/// Signed number of days from `today` until `due_date` (negative once overdue).
pub fn days_until(today: NaiveDate, due_date: NaiveDate) -> i64 {
    (due_date - today).num_days()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn day_in_month(month_start: NaiveDate, day: u32) -> NaiveDate {
    let mut day = day;
    loop {
        if let Some(date) = month_start.with_day(day) {
            return date;
        }
        if day <= 1 {
            return month_start;
        }
        day -= 1;
    }
}
