mod accounts;
mod audit;
mod competition;
mod problems;
mod registration;
mod season;
mod series;

pub mod types;

pub use accounts::{GroupId, User, UserId};
pub use audit::Audit;
pub use competition::{Competition, CompetitionId, NewCompetition};
pub use problems::{ProblemId, ProblemSetId};
pub use registration::{
    CompetitionOrgRegistration, CompetitionUserRegistration, OrgRegistrationId,
    UserRegistrationId,
};
pub use season::{NewSeason, Season, SeasonId};
pub use series::{NewSeries, Series, SeriesId, SeriesValidationError};
