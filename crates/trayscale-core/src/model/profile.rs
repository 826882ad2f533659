// ── Login profiles ──
//
// The daemon can hold several logins (accounts or tailnets) and switch
// between them. Exactly one is current.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginProfile {
    pub id: ProfileId,
    /// Usually the login name; what the selector shows.
    pub name: String,
    pub tailnet: String,
}

/// The daemon's profiles, sorted by name, and which one is current.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profiles {
    pub current: Option<ProfileId>,
    pub all: Vec<LoginProfile>,
}

impl Profiles {
    /// `current` may be absent from `all` (a fresh daemon reports an empty
    /// current profile and no list); it is left out of the list either way.
    pub fn new(current: Option<LoginProfile>, mut all: Vec<LoginProfile>) -> Self {
        all.retain(|p| !p.id.as_str().is_empty());
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        all.dedup_by(|a, b| a.id == b.id);
        Self {
            current: current.map(|p| p.id).filter(|id| !id.as_str().is_empty()),
            all,
        }
    }

    pub fn get(&self, id: &ProfileId) -> Option<&LoginProfile> {
        self.all.iter().find(|p| &p.id == id)
    }

    pub fn current(&self) -> Option<&LoginProfile> {
        self.current.as_ref().and_then(|id| self.get(id))
    }

    pub fn current_index(&self) -> Option<usize> {
        let id = self.current.as_ref()?;
        self.all.iter().position(|p| &p.id == id)
    }

    /// A choice is only offered with more than one profile.
    pub fn can_switch(&self) -> bool {
        self.all.len() > 1
    }
}
