/// Names of the months, indexed by `month - 1`.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Rendered in place of a month name when the month is outside `1..=12`.
pub const INVALID_MONTH: &str = "Invalid Month";

/// Returns the English name of `month` (1-12), or [`INVALID_MONTH`].
pub fn month_name(month: u8) -> &'static str {
    match month {
        1..=12 => MONTH_NAMES[month as usize - 1],
        _ => INVALID_MONTH,
    }
}

/// Gregorian leap year rule.
pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` of `year`.
///
/// Months outside `1..=12` fall back to 31 so that a bogus month never shrinks the bound on the
/// day below what any real month allows.
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}
