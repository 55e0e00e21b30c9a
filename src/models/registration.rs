use super::{Audit, Competition, CompetitionId, User, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserRegistrationId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrgRegistrationId(pub u64);

/// A user taking part in a competition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompetitionUserRegistration {
    pub id: UserRegistrationId,
    pub competition_id: CompetitionId,
    pub user_id: UserId,
    pub audit: Audit,
}

impl CompetitionUserRegistration {
    pub fn describe(&self, user: &User, competition: &Competition) -> String {
        format!("{user} competes in {competition}")
    }
}

/// An organizer helping with a competition. Only approved registrations grant
/// anything; new ones start unapproved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompetitionOrgRegistration {
    pub id: OrgRegistrationId,
    pub competition_id: CompetitionId,
    pub organizer_id: UserId,
    pub approved: bool,
    pub audit: Audit,
}

impl CompetitionOrgRegistration {
    pub fn describe(&self, organizer: &User, competition: &Competition) -> String {
        format!("{organizer} organizes {competition}")
    }
}
