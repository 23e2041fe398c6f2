//! # 역할별 접근 표
//!
//! 역할(Role) × 동작(Action) 조합마다 허용 여부를 한 곳에 모아둔 순수 함수입니다.
//! 핸들러는 조건문을 직접 쓰지 않고 `require()`만 호출합니다.

use crate::error::AppError;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartSession,
    ViewLiveCode,
    StopSession,
    ListSessionRecords,
    MarkManually,
    ListClassroomSessions,
    CheckIn,
    ViewOwnAttendance,
    ManageUsers,
}

#[cfg(test)]
impl Action {
    pub const ALL: [Action; 9] = [
        Action::StartSession,
        Action::ViewLiveCode,
        Action::StopSession,
        Action::ListSessionRecords,
        Action::MarkManually,
        Action::ListClassroomSessions,
        Action::CheckIn,
        Action::ViewOwnAttendance,
        Action::ManageUsers,
    ];
}

pub fn permits(role: Role, action: Action) -> bool {
    use Action::*;

    match (role, action) {
        (Role::Admin, _) => true,
        (Role::Faculty, StartSession | ViewLiveCode | StopSession) => true,
        (Role::Faculty, ListSessionRecords | MarkManually | ListClassroomSessions) => true,
        (Role::Faculty, CheckIn | ViewOwnAttendance | ManageUsers) => false,
        (Role::Student, CheckIn | ViewOwnAttendance) => true,
        (Role::Student, _) => false,
    }
}

pub fn require(role: Role, action: Action) -> Result<(), AppError> {
    if permits(role, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' cannot perform {:?}",
            role.as_str(),
            action
        )))
    }
}
