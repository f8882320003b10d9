/// Semester values accepted by the backend, with display labels.
pub const SEMESTERS: &[(&str, &str)] = &[
    ("first", "First Semester"),
    ("second", "Second Semester"),
    ("third", "Third Semester"),
];

/// Exam type values accepted by the backend, with display labels.
pub const EXAM_TYPES: &[(&str, &str)] = &[
    ("midterm", "Midterm Exam"),
    ("final", "Final Exam"),
    ("quiz", "Quiz"),
    ("assignment", "Assignment"),
    ("test", "Test"),
    ("other", "Other"),
];

/// Largest accepted upload, in bytes (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Oldest exam year the archive accepts.
pub const MIN_YEAR: i32 = 2000;

/// Page size used by the portal listings.
pub const ITEMS_PER_PAGE: u32 = 12;

/// Display label for a semester value, or the value itself when unknown.
#[must_use]
pub fn semester_label(value: &str) -> &str {
    label(SEMESTERS, value)
}

/// Display label for an exam type value, or the value itself when unknown.
#[must_use]
pub fn exam_type_label(value: &str) -> &str {
    label(EXAM_TYPES, value)
}

fn label<'a>(table: &'static [(&'static str, &'static str)], value: &'a str) -> &'a str {
    table
        .iter()
        .find(|(v, _)| v.eq_ignore_ascii_case(value))
        .map_or(value, |&(_, l)| l)
}
