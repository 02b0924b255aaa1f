use serde::{Deserialize, Serialize};

use crate::store::StoreState;
use crate::types::{Role, Status, User};

/// Search box plus the status and role dropdowns. `None` means "All".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl UserFilter {
    /// Case-insensitive substring match over name, email and department.
    pub fn matches(&self, user: &User) -> bool {
        let term = self.search.trim().to_lowercase();
        let matches_search = term.is_empty()
            || user.name.to_lowercase().contains(&term)
            || user.email.to_lowercase().contains(&term)
            || user.department.to_lowercase().contains(&term);

        let matches_status = self.status.map_or(true, |s| user.status == s);
        let matches_role = self.role.map_or(true, |r| user.role == r);

        matches_search && matches_status && matches_role
    }

    pub fn apply<'a>(&self, users: &'a [User]) -> Vec<&'a User> {
        users.iter().filter(|u| self.matches(u)).collect()
    }
}

/// Header counters, always over the full list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

impl UserStats {
    pub fn from_users(users: &[User]) -> Self {
        let active = users.iter().filter(|u| u.status == Status::Active).count();
        Self {
            total: users.len(),
            active,
            inactive: users.len() - active,
        }
    }
}

/// What the console list page renders: "Showing {showing} of {total} users".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleView {
    pub users: Vec<User>,
    pub showing: usize,
    pub total: usize,
    pub stats: UserStats,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl ConsoleView {
    pub fn build(state: &StoreState, filter: &UserFilter) -> Self {
        let users: Vec<User> = filter.apply(&state.records).into_iter().cloned().collect();
        Self {
            showing: users.len(),
            total: state.records.len(),
            stats: UserStats::from_users(&state.records),
            users,
            is_loading: state.is_loading,
            error: state.last_error.clone(),
        }
    }
}

/// Body of the delete confirmation dialog.
pub fn delete_prompt(user: &User) -> String {
    format!(
        "Are you sure you want to delete {}? This action cannot be undone.",
        user.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str, department: &str, role: Role, status: Status) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@corp.io", name.to_lowercase()),
            role,
            department: department.to_string(),
            status,
            avatar: None,
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
        }
    }

    fn roster() -> Vec<User> {
        vec![
            user("1", "Ann", "Engineering", Role::Admin, Status::Active),
            user("2", "Bob", "Sales", Role::User, Status::Inactive),
            user("3", "Cleo", "Engineering", Role::Manager, Status::Active),
        ]
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let users = roster();

        let by_department = UserFilter {
            search: "ENGINEER".to_string(),
            ..Default::default()
        };
        assert_eq!(by_department.apply(&users).len(), 2);

        let by_email = UserFilter {
            search: "bob@corp".to_string(),
            ..Default::default()
        };
        let hits = by_email.apply(&users);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2");

        assert_eq!(UserFilter::default().apply(&users).len(), 3);
    }

    #[test]
    fn test_status_and_role_filters_combine() {
        let users = roster();
        let filter = UserFilter {
            search: "engineering".to_string(),
            status: Some(Status::Active),
            role: Some(Role::Manager),
        };

        let hits = filter.apply(&users);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Cleo");
    }

    #[test]
    fn test_view_counts_filtered_and_total() {
        let state = StoreState {
            records: roster(),
            is_loading: false,
            last_error: Some("network down".to_string()),
        };
        let filter = UserFilter {
            status: Some(Status::Inactive),
            ..Default::default()
        };

        let view = ConsoleView::build(&state, &filter);

        assert_eq!(view.showing, 1);
        assert_eq!(view.total, 3);
        assert_eq!(
            view.stats,
            UserStats {
                total: 3,
                active: 2,
                inactive: 1
            }
        );
        assert_eq!(view.error.as_deref(), Some("network down"));
    }

    #[test]
    fn test_delete_prompt_names_user() {
        let users = roster();
        assert_eq!(
            delete_prompt(&users[1]),
            "Are you sure you want to delete Bob? This action cannot be undone."
        );
    }
}
