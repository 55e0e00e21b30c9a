use std::fmt;

use super::{Audit, GroupId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompetitionId(pub u64);

/// A competition, usually one per age or subject category of the site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Competition {
    pub id: CompetitionId,
    pub name: String,
    pub organizer_group: Option<GroupId>,
    pub audit: Audit,
}

#[derive(Debug)]
pub struct NewCompetition {
    pub name: String,
    pub organizer_group: Option<GroupId>,
}

impl fmt::Display for Competition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
