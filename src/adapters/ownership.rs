//! Ownership of newly rotated log files.
//!
//! The periodic job usually runs from root's crontab, but the inspection
//! tools and the web view run as the service user, so each new log file is
//! handed to that user (and the group of the same name, when it exists).

use std::io;
use std::path::Path;

use nix::unistd::{Gid, Group, Uid, User, chown};

/// A resolved `user:group` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOwner {
    user: String,
    uid: Uid,
    gid: Gid,
}

impl FileOwner {
    /// Resolve a user name through the system user database.
    pub fn lookup(user: &str) -> io::Result<Self> {
        let entry = User::from_name(user)?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such user '{user}'"))
        })?;
        let gid = Group::from_name(user)?.map_or(entry.gid, |g| g.gid);
        Ok(Self {
            user: user.to_owned(),
            uid: entry.uid,
            gid,
        })
    }

    /// The calling process's own uid/gid.  Applying it is a no-op chown,
    /// which keeps tests independent of the user database.
    pub fn current() -> Self {
        Self {
            user: String::from("(self)"),
            uid: Uid::effective(),
            gid: Gid::effective(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn apply(&self, path: &Path) -> io::Result<()> {
        chown(path, Some(self.uid), Some(self.gid)).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chown_to_self_succeeds() {
        let file = tempfile::NamedTempFile::new().unwrap();
        FileOwner::current().apply(file.path()).unwrap();
    }

    #[test]
    fn unknown_user_is_not_found() {
        let err = FileOwner::lookup("no-such-user-for-greenhouse-tests").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn root_resolves() {
        let root = FileOwner::lookup("root").unwrap();
        assert_eq!(root.user(), "root");
        assert_eq!(root.uid, Uid::from_raw(0));
    }
}
