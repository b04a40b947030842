use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BorrowRequest, Component, LoginSession, RequestStatus, User};

/// Dashboard figures, computed from whichever store answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_users: usize,
    pub active_users: usize,
    /// Number of login sessions ever recorded.
    pub total_logins: usize,
    /// Users with at least one active session.
    pub online_users: usize,
    pub total_requests: usize,
    pub pending_requests: usize,
    pub total_components: usize,
    pub overdue_items: usize,
}

impl SystemStats {
    pub fn compute(
        users: &[User],
        sessions: &[LoginSession],
        requests: &[BorrowRequest],
        components: &[Component],
        now: DateTime<Utc>,
    ) -> Self {
        let mut online: Vec<&str> = sessions
            .iter()
            .filter(|session| session.is_active)
            .map(|session| session.user_id.as_str())
            .collect();
        online.sort_unstable();
        online.dedup();

        SystemStats {
            total_users: users.len(),
            active_users: users.iter().filter(|user| user.is_active).count(),
            total_logins: sessions.len(),
            online_users: online.len(),
            total_requests: requests.len(),
            pending_requests: requests
                .iter()
                .filter(|request| request.status == RequestStatus::Pending)
                .count(),
            total_components: components.len(),
            overdue_items: requests.iter().filter(|request| request.is_overdue(now)).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::Role;

    fn user(id: &str, active: bool) -> User {
        User {
            id: id.into(),
            name: id.into(),
            email: format!("{id}@lab.test"),
            role: Role::Student,
            roll_no: None,
            mobile: None,
            registered_at: Utc::now(),
            login_count: 0,
            last_login_at: None,
            is_active: active,
        }
    }

    fn request(id: &str, status: RequestStatus, due: DateTime<Utc>) -> BorrowRequest {
        BorrowRequest {
            id: id.into(),
            student_id: "u1".into(),
            student_name: "u1".into(),
            component_id: "c1".into(),
            component_name: "c1".into(),
            quantity: 1,
            status,
            request_date: due - Duration::days(7),
            due_date: due,
            return_date: None,
            notes: None,
        }
    }

    #[test]
    fn counts_overdue_and_online() {
        let now = Utc::now();
        let users = [user("u1", true), user("u2", false)];
        let u1 = &users[0];
        let sessions = [
            LoginSession::open(u1, "Desktop", now),
            LoginSession::open(u1, "Mobile", now),
            LoginSession::open(u1, "Desktop", now - Duration::hours(3)).closed_at(now),
        ];
        let requests = [
            request("r1", RequestStatus::Approved, now - Duration::days(1)),
            request("r2", RequestStatus::Approved, now + Duration::days(1)),
            request("r3", RequestStatus::Returned, now - Duration::days(1)),
            request("r4", RequestStatus::Pending, now + Duration::days(1)),
        ];

        let stats = SystemStats::compute(&users, &sessions, &requests, &[], now);
        assert_eq!(
            stats,
            SystemStats {
                total_users: 2,
                active_users: 1,
                total_logins: 3,
                online_users: 1,
                total_requests: 4,
                pending_requests: 1,
                total_components: 0,
                overdue_items: 1,
            }
        );
    }
}
