use sqlx::{query, query_as, FromRow, Pool, Sqlite};
use tracing::info;

use crate::models::{
    types::UtcDateTime, Audit, CompetitionId, CompetitionOrgRegistration,
    CompetitionUserRegistration, OrgRegistrationId, UserId, UserRegistrationId,
};

use super::conversion::{DBConvertible, DBFromConversionError, DBToConversionError, SqlAudit};

/// Competitor and organizer registrations of competitions.
pub struct RegistrationRepository {
    pool: Pool<Sqlite>,
}

impl RegistrationRepository {
    pub fn new(pool: Pool<Sqlite>) -> RegistrationRepository {
        RegistrationRepository { pool }
    }

    /// Registering twice returns the existing registration.
    #[tracing::instrument(skip(self))]
    pub async fn register_user(
        &self,
        competition_id: CompetitionId,
        user_id: UserId,
        audit: Audit,
    ) -> Result<CompetitionUserRegistration, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let registration = {
            let competition_id = competition_id.to_db()?;
            let user_id = user_id.to_db()?;
            let audit = audit.to_db()?;

            query(
                r#"
                    INSERT INTO competition_user_registrations (
                        competition_id,
                        user_id,
                        added_at,
                        added_by,
                        modified_at,
                        modified_by)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (competition_id, user_id) DO NOTHING
                "#,
            )
            .bind(competition_id)
            .bind(user_id)
            .bind(audit.added_at)
            .bind(audit.added_by)
            .bind(audit.modified_at)
            .bind(audit.modified_by)
            .execute(&mut *transaction)
            .await?;

            query_as::<_, SqlUserRegistration>(
                r#"
                    SELECT * FROM competition_user_registrations
                    WHERE competition_id = $1 AND user_id = $2
                "#,
            )
            .bind(competition_id)
            .bind(user_id)
            .fetch_one(&mut *transaction)
            .await?
        };

        transaction.commit().await?;

        Ok(CompetitionUserRegistration::from_db(&registration)?)
    }

    pub async fn list_user_registrations(
        &self,
        competition_id: CompetitionId,
    ) -> Result<Vec<CompetitionUserRegistration>, anyhow::Error> {
        let registrations = query_as::<_, SqlUserRegistration>(
            r#"
                SELECT * FROM competition_user_registrations
                WHERE competition_id = $1
                ORDER BY added_at, id
            "#,
        )
        .bind(competition_id.to_db()?)
        .fetch_all(&self.pool)
        .await?;

        registrations
            .iter()
            .map(|registration| Ok(CompetitionUserRegistration::from_db(registration)?))
            .collect()
    }

    pub async fn is_user_registered(
        &self,
        competition_id: CompetitionId,
        user_id: UserId,
    ) -> Result<bool, anyhow::Error> {
        let registration = query_as::<_, SqlUserRegistration>(
            r#"
                SELECT * FROM competition_user_registrations
                WHERE competition_id = $1 AND user_id = $2
            "#,
        )
        .bind(competition_id.to_db()?)
        .bind(user_id.to_db()?)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration.is_some())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_user_registration(
        &self,
        id: UserRegistrationId,
    ) -> Result<bool, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let query_result = query("DELETE FROM competition_user_registrations WHERE id = $1")
            .bind(id.to_db()?)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(query_result.rows_affected() > 0)
    }

    /// New organizer registrations wait for approval.
    #[tracing::instrument(skip(self))]
    pub async fn register_organizer(
        &self,
        competition_id: CompetitionId,
        organizer_id: UserId,
        audit: Audit,
    ) -> Result<CompetitionOrgRegistration, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let registration = {
            let competition_id = competition_id.to_db()?;
            let organizer_id = organizer_id.to_db()?;
            let audit = audit.to_db()?;

            query(
                r#"
                    INSERT INTO competition_org_registrations (
                        competition_id,
                        organizer_id,
                        approved,
                        added_at,
                        added_by,
                        modified_at,
                        modified_by)
                    VALUES ($1, $2, FALSE, $3, $4, $5, $6)
                    ON CONFLICT (competition_id, organizer_id) DO NOTHING
                "#,
            )
            .bind(competition_id)
            .bind(organizer_id)
            .bind(audit.added_at)
            .bind(audit.added_by)
            .bind(audit.modified_at)
            .bind(audit.modified_by)
            .execute(&mut *transaction)
            .await?;

            query_as::<_, SqlOrgRegistration>(
                r#"
                    SELECT * FROM competition_org_registrations
                    WHERE competition_id = $1 AND organizer_id = $2
                "#,
            )
            .bind(competition_id)
            .bind(organizer_id)
            .fetch_one(&mut *transaction)
            .await?
        };

        transaction.commit().await?;

        Ok(CompetitionOrgRegistration::from_db(&registration)?)
    }

    pub async fn list_org_registrations(
        &self,
        competition_id: CompetitionId,
    ) -> Result<Vec<CompetitionOrgRegistration>, anyhow::Error> {
        let registrations = query_as::<_, SqlOrgRegistration>(
            r#"
                SELECT * FROM competition_org_registrations
                WHERE competition_id = $1
                ORDER BY added_at, id
            "#,
        )
        .bind(competition_id.to_db()?)
        .fetch_all(&self.pool)
        .await?;

        registrations
            .iter()
            .map(|registration| Ok(CompetitionOrgRegistration::from_db(registration)?))
            .collect()
    }

    /// Unapproved organizer registrations of every competition, oldest first.
    pub async fn list_pending_org_registrations(
        &self,
    ) -> Result<Vec<CompetitionOrgRegistration>, anyhow::Error> {
        let registrations = query_as::<_, SqlOrgRegistration>(
            r#"
                SELECT * FROM competition_org_registrations
                WHERE NOT approved
                ORDER BY added_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        registrations
            .iter()
            .map(|registration| Ok(CompetitionOrgRegistration::from_db(registration)?))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_org_registration_approved(
        &self,
        id: OrgRegistrationId,
        approved: bool,
        editor: Option<UserId>,
        now: UtcDateTime,
    ) -> Result<CompetitionOrgRegistration, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let registration = query_as::<_, SqlOrgRegistration>(
            r#"
                UPDATE competition_org_registrations
                SET approved = $2,
                    modified_at = $3,
                    modified_by = $4
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(id.to_db()?)
        .bind(approved)
        .bind(now.to_db()?)
        .bind(editor.to_db()?)
        .fetch_optional(&mut *transaction)
        .await?;

        transaction.commit().await?;

        let Some(registration) = registration else {
            anyhow::bail!("Organizer registration {id:?} does not exist");
        };

        let registration = CompetitionOrgRegistration::from_db(&registration)?;
        info!(
            "Organizer {:?} of competition {:?} approved: {approved}",
            registration.organizer_id, registration.competition_id
        );

        Ok(registration)
    }
}

#[derive(Debug, FromRow)]
pub struct SqlUserRegistration {
    id: i64,
    competition_id: i64,
    user_id: i64,
    #[sqlx(flatten)]
    audit: SqlAudit,
}

impl DBConvertible for CompetitionUserRegistration {
    type DBType = SqlUserRegistration;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(SqlUserRegistration {
            id: self.id.to_db()?,
            competition_id: self.competition_id.to_db()?,
            user_id: self.user_id.to_db()?,
            audit: self.audit.to_db()?,
        })
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        Ok(CompetitionUserRegistration {
            id: UserRegistrationId::from_db(&value.id)?,
            competition_id: CompetitionId::from_db(&value.competition_id)?,
            user_id: UserId::from_db(&value.user_id)?,
            audit: Audit::from_db(&value.audit)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct SqlOrgRegistration {
    id: i64,
    competition_id: i64,
    organizer_id: i64,
    approved: bool,
    #[sqlx(flatten)]
    audit: SqlAudit,
}

impl DBConvertible for CompetitionOrgRegistration {
    type DBType = SqlOrgRegistration;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(SqlOrgRegistration {
            id: self.id.to_db()?,
            competition_id: self.competition_id.to_db()?,
            organizer_id: self.organizer_id.to_db()?,
            approved: self.approved,
            audit: self.audit.to_db()?,
        })
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        Ok(CompetitionOrgRegistration {
            id: OrgRegistrationId::from_db(&value.id)?,
            competition_id: CompetitionId::from_db(&value.competition_id)?,
            organizer_id: UserId::from_db(&value.organizer_id)?,
            approved: value.approved,
            audit: Audit::from_db(&value.audit)?,
        })
    }
}
