use uuid::Uuid;

use pairchat_types::models::User;

use crate::models::UserRow;
use crate::{MessageStore, Result};

impl MessageStore {
    pub fn user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_state(|state| Ok(state.user(id).map(UserRow::to_user)))
    }

    /// Full record including the password hash, for credential checks.
    pub fn user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_state(|state| Ok(state.users.iter().find(|u| u.username == username).cloned()))
    }

    /// The other participant of the pair. `None` if `id` is not a participant.
    pub fn counterpart_of(&self, id: Uuid) -> Result<Option<User>> {
        self.with_state(|state| {
            if state.user(id).is_none() {
                return Ok(None);
            }
            Ok(state.users.iter().find(|u| u.id != id).map(UserRow::to_user))
        })
    }

    pub fn users(&self) -> Result<Vec<User>> {
        self.with_state(|state| Ok(state.users.iter().map(UserRow::to_user).collect()))
    }
}
