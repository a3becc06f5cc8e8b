pub mod attendance;
pub mod classes;
pub mod students;
pub mod subjects;
pub mod teachers;

pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
