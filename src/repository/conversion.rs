use sqlx::FromRow;
use thiserror::Error;
use time::{format_description::well_known::Iso8601, OffsetDateTime};

use crate::models::{
    types::UtcDateTime, Audit, CompetitionId, GroupId, OrgRegistrationId, ProblemId,
    ProblemSetId, SeasonId, SeriesId, User, UserId, UserRegistrationId,
};

pub trait DBConvertible: Sized {
    type DBType;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError>;

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError>;
}

#[derive(Debug, Error)]
pub enum DBFromConversionError {
    #[error("Failed to parse datetime: {0}")]
    DateTime(#[from] time::error::Parse),
    #[error("Invalid number: {0}")]
    InvalidNumber(i64),
}

#[derive(Debug, Error)]
pub enum DBToConversionError {
    #[error("Failed to format datetime")]
    DateTime(#[from] time::error::Format),
    #[error("Number does not fit the column: {0}")]
    InvalidNumber(u64),
}

/// Stored as fixed-width ISO 8601 in UTC, so SQL text comparison matches
/// chronological order.
impl DBConvertible for UtcDateTime {
    type DBType = String;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        let string = OffsetDateTime::from(*self).format(&Iso8601::DEFAULT)?;
        Ok(string)
    }

    fn from_db(db_value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        let datetime = OffsetDateTime::parse(db_value, &Iso8601::DEFAULT)?;
        Ok(UtcDateTime::from(datetime))
    }
}

impl<T: DBConvertible> DBConvertible for Option<T> {
    type DBType = Option<T::DBType>;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        self.as_ref().map(T::to_db).transpose()
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        value.as_ref().map(T::from_db).transpose()
    }
}

macro_rules! id_conversion {
    ($($id:ident),+ $(,)?) => {
        $(
            impl DBConvertible for $id {
                type DBType = i64;

                fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
                    i64::try_from(self.0).map_err(|_| DBToConversionError::InvalidNumber(self.0))
                }

                fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
                    u64::try_from(*value)
                        .map($id)
                        .map_err(|_| DBFromConversionError::InvalidNumber(*value))
                }
            }
        )+
    };
}

id_conversion!(
    CompetitionId,
    GroupId,
    OrgRegistrationId,
    ProblemId,
    ProblemSetId,
    SeasonId,
    SeriesId,
    UserId,
    UserRegistrationId,
);

impl DBConvertible for u16 {
    type DBType = i64;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(*self as _)
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        u16::try_from(*value).map_err(|_| DBFromConversionError::InvalidNumber(*value))
    }
}

impl DBConvertible for i32 {
    type DBType = i64;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(*self as _)
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        i32::try_from(*value).map_err(|_| DBFromConversionError::InvalidNumber(*value))
    }
}

/// Audit columns shared by every competition table.
#[derive(Debug, FromRow)]
pub struct SqlAudit {
    pub added_at: String,
    pub added_by: Option<i64>,
    pub modified_at: String,
    pub modified_by: Option<i64>,
}

impl DBConvertible for Audit {
    type DBType = SqlAudit;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(SqlAudit {
            added_at: self.added_at.to_db()?,
            added_by: self.added_by.to_db()?,
            modified_at: self.modified_at.to_db()?,
            modified_by: self.modified_by.to_db()?,
        })
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        Ok(Audit {
            added_at: UtcDateTime::from_db(&value.added_at)?,
            added_by: Option::<UserId>::from_db(&value.added_by)?,
            modified_at: UtcDateTime::from_db(&value.modified_at)?,
            modified_by: Option::<UserId>::from_db(&value.modified_by)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct SqlUser {
    pub id: i64,
    pub username: String,
}

impl DBConvertible for User {
    type DBType = SqlUser;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(SqlUser {
            id: self.id.to_db()?,
            username: self.username.clone(),
        })
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        Ok(User {
            id: UserId::from_db(&value.id)?,
            username: value.username.clone(),
        })
    }
}
