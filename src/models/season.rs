use super::{types::UtcDateTime, Audit, Competition, CompetitionId};
use crate::utils::formatting::remove_accents;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeasonId(pub u64);

/// One season of a competition, typically autumn or spring. A season holds
/// the series published during its time window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Season {
    pub id: SeasonId,
    pub competition_id: CompetitionId,
    pub year: i32,
    pub number: i32,
    pub name: String,
    pub join_deadline: Option<UtcDateTime>,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
    pub audit: Audit,
}

#[derive(Debug)]
pub struct NewSeason {
    pub competition_id: CompetitionId,
    pub year: i32,
    pub number: i32,
    pub name: String,
    pub join_deadline: Option<UtcDateTime>,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl Season {
    /// Both ends of the window are exclusive.
    pub fn is_active_at(&self, now: UtcDateTime) -> bool {
        self.start < now && now < self.end
    }

    pub fn is_open_for_joining_at(&self, now: UtcDateTime) -> bool {
        self.join_deadline.map_or(true, |deadline| now <= deadline)
    }

    /// `"{name} ({competition} {year}-{number})"`, transliterated to ASCII.
    pub fn title(&self, competition: &Competition) -> String {
        format!(
            "{name} ({competition} {year}-{number})",
            name = remove_accents(&self.name),
            competition = remove_accents(&competition.name),
            year = self.year,
            number = self.number,
        )
    }
}
