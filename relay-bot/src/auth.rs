//! Allow-list of user ids permitted to trigger the bot.

use relay_core::User;
use std::collections::HashSet;
use tracing::warn;

/// Users allowed to talk to the bot. Empty means everyone.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    users: HashSet<i64>,
}

impl AllowList {
    pub fn new(users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    /// Parses a comma-separated id list such as `ALLOWED_USERS=123,456`. Blank entries are skipped.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut users = HashSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let id = part
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Invalid user id in allow-list: {:?}", part))?;
            users.insert(id);
        }
        Ok(Self { users })
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn can_interact(&self, user: &User) -> bool {
        if self.users.is_empty() || self.users.contains(&user.id) {
            return true;
        }
        warn!(user_id = user.id, username = ?user.username, "User not on allow-list");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> User {
        User {
            id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_empty_allows_everyone() {
        let list = AllowList::default();
        assert!(list.can_interact(&user(1)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_parse_and_check() {
        let list = AllowList::parse(" 10, 20 ,,").unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.can_interact(&user(10)));
        assert!(list.can_interact(&user(20)));
        assert!(!list.can_interact(&user(30)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(AllowList::parse("10,abc").is_err());
    }
}
