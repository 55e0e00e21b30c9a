use std::fmt;

use thiserror::Error;

use super::{types::UtcDateTime, Audit, ProblemSetId, SeasonId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeriesId(pub u64);

/// A numbered round of problems within a season.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Series {
    pub id: SeriesId,
    pub season_id: SeasonId,
    pub name: String,
    pub number: u16,
    pub problem_set: Option<ProblemSetId>,
    pub submission_deadline: Option<UtcDateTime>,
    pub is_active: bool,
    pub audit: Audit,
}

#[derive(Debug)]
pub struct NewSeries {
    pub season_id: SeasonId,
    pub name: String,
    pub number: u16,
    pub problem_set: Option<ProblemSetId>,
    pub submission_deadline: Option<UtcDateTime>,
    pub is_active: bool,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SeriesValidationError {
    #[error("Submission deadline must be set to make the series active")]
    MissingSubmissionDeadline,
    #[error("Corresponding set of problems must be set to make the series active")]
    MissingProblemSet,
    #[error("Series that is past its submission deadline cannot be made active")]
    PastSubmissionDeadline,
}

/// Checks run before any series is written. Only active series are
/// constrained.
fn check_activation(
    is_active: bool,
    submission_deadline: Option<UtcDateTime>,
    problem_set: Option<ProblemSetId>,
    now: UtcDateTime,
) -> Result<(), SeriesValidationError> {
    if !is_active {
        return Ok(());
    }

    let Some(deadline) = submission_deadline else {
        return Err(SeriesValidationError::MissingSubmissionDeadline);
    };

    if problem_set.is_none() {
        return Err(SeriesValidationError::MissingProblemSet);
    }

    if now > deadline {
        return Err(SeriesValidationError::PastSubmissionDeadline);
    }

    Ok(())
}

impl Series {
    pub fn is_past_submission_deadline(&self, now: UtcDateTime) -> bool {
        self.submission_deadline
            .is_some_and(|deadline| now > deadline)
    }

    pub fn clean(&self, now: UtcDateTime) -> Result<(), SeriesValidationError> {
        check_activation(
            self.is_active,
            self.submission_deadline,
            self.problem_set,
            now,
        )
    }
}

impl NewSeries {
    pub fn clean(&self, now: UtcDateTime) -> Result<(), SeriesValidationError> {
        check_activation(
            self.is_active,
            self.submission_deadline,
            self.problem_set,
            now,
        )
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
