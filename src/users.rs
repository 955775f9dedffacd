use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::User;

/// Read-only map from user id to user name, built once per run.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct UserDirectory {
    names: BTreeMap<String, String>,
}

/// Outcome of a directory lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserName<'a> {
    Found(&'a str),
    Unknown(&'a str),
}

impl fmt::Display for UserName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserName::Found(name) => f.write_str(name),
            UserName::Unknown(id) => write!(f, "{} (name unknown)", id),
        }
    }
}

impl UserDirectory {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        let names = users.into_iter().map(|u| (u.id, u.name)).collect();
        Self { names }
    }

    pub fn resolve<'a>(&'a self, id: &'a str) -> UserName<'a> {
        match self.names.get(id) {
            Some(name) => UserName::Found(name),
            None => UserName::Unknown(id),
        }
    }
}
