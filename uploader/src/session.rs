//! The signed-in user as seen by the uploader.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Guests may browse but never upload.
    pub fn can_upload(&self) -> bool {
        self.role != Role::Guest
    }

    /// Whether a drag over the page should raise the full-page drop target.
    /// Drops aimed at a page-local dropzone are left to that dropzone.
    pub fn shows_drop_overlay(&self, over_local_dropzone: bool) -> bool {
        self.can_upload() && !over_local_dropzone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_cannot_upload() {
        let guest = Session::new("g", Role::Guest);
        assert!(!guest.can_upload());
        assert!(!guest.shows_drop_overlay(false));
    }

    #[test]
    fn test_overlay_yields_to_local_dropzone() {
        let user = Session::new("u", Role::User);
        assert!(user.shows_drop_overlay(false));
        assert!(!user.shows_drop_overlay(true));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" guest ".parse::<Role>(), Ok(Role::Guest));
        assert!("owner".parse::<Role>().is_err());
    }
}
