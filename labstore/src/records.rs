use core::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Record;

/// The five collections the portal persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    User,
    Component,
    Request,
    Notification,
    LoginSession,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::User,
        RecordKind::Component,
        RecordKind::Request,
        RecordKind::Notification,
        RecordKind::LoginSession,
    ];

    /// Collection name used by both stores.
    pub fn collection(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Component => "components",
            Self::Request => "requests",
            Self::Notification => "notifications",
            Self::LoginSession => "loginSessions",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
}

impl RequestStatus {
    /// Whether a request in this status holds stock out of the component's available pool.
    pub fn holds_stock(self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

macro_rules! impl_value_from_enum {
    ($($ty:ty => { $($variant:ident => $name:literal),* $(,)? }),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    match value {
                        $(<$ty>::$variant => Value::from($name)),*
                    }
                }
            }
        )*
    };
}

impl_value_from_enum! {
    Role => { Student => "student", Staff => "staff" },
    RequestStatus => {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Returned => "returned",
    },
    NotificationKind => {
        Info => "info",
        Success => "success",
        Warning => "warning",
        Error => "error",
    },
}

#[derive(Record, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[kind(User)]
pub struct User {
    #[id]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub roll_no: Option<String>,
    pub mobile: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub registered_at: DateTime<Utc>,
    pub login_count: u32,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Record, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[kind(Component)]
pub struct Component {
    #[id]
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub total_quantity: u32,
    pub available_quantity: u32,
}

#[derive(Record, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[kind(Request)]
pub struct BorrowRequest {
    #[id]
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub component_id: String,
    pub component_name: String,
    pub quantity: u32,
    pub status: RequestStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub request_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub return_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl BorrowRequest {
    /// Approved and past its due date at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Approved && self.due_date < now
    }
}

#[derive(Record, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[kind(Notification)]
pub struct Notification {
    #[id]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Record, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[kind(LoginSession)]
pub struct LoginSession {
    #[id]
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub user_role: Role,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub login_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub logout_time: Option<DateTime<Utc>>,
    /// Milliseconds between login and logout.
    pub session_duration: Option<i64>,
    pub device_info: String,
    pub is_active: bool,
}

impl LoginSession {
    /// Opens a new active session for `user`.
    pub fn open(user: &User, device_info: impl Into<String>, now: DateTime<Utc>) -> Self {
        LoginSession {
            id: format!("session-{}", uuid::Uuid::new_v4()),
            user_id: user.id.clone(),
            user_email: user.email.clone(),
            user_name: user.name.clone(),
            user_role: user.role,
            login_time: now,
            logout_time: None,
            session_duration: None,
            device_info: device_info.into(),
            is_active: true,
        }
    }

    /// Returns this session closed at `now`.
    pub fn closed_at(mut self, now: DateTime<Utc>) -> Self {
        self.is_active = false;
        self.logout_time = Some(now);
        self.session_duration = Some((now - self.login_time).num_milliseconds());
        self
    }
}
