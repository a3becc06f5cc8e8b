//! Roles and the capability table that gates every API operation.
//!
//! A caller's role comes from their `users` row; capabilities are fixed per
//! role and checked in handlers via `Identity::require`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    StudentsRead,
    StudentsWrite,
    TeachersRead,
    TeachersWrite,
    ClassesRead,
    ClassesWrite,
    SubjectsRead,
    SubjectsWrite,
    AttendanceRead,
    AttendanceWrite,
}

pub fn role_allows(role: Role, capability: Capability) -> bool {
    use Capability::*;
    match role {
        Role::Admin => true,
        Role::Teacher => matches!(
            capability,
            StudentsRead | TeachersRead | ClassesRead | SubjectsRead | AttendanceRead | AttendanceWrite
        ),
        Role::Student => matches!(
            capability,
            StudentsRead | ClassesRead | SubjectsRead | AttendanceRead
        ),
    }
}
