use sqlx::{query, query_as, FromRow, Pool, Sqlite};
use tracing::{info, warn};

use crate::models::{
    types::UtcDateTime, Audit, Competition, CompetitionId, GroupId, NewCompetition, UserId,
};

use super::conversion::{DBConvertible, DBFromConversionError, DBToConversionError, SqlAudit};

pub struct CompetitionRepository {
    pool: Pool<Sqlite>,
}

impl CompetitionRepository {
    pub fn new(pool: Pool<Sqlite>) -> CompetitionRepository {
        CompetitionRepository { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_competition(
        &self,
        new_competition: &NewCompetition,
        audit: Audit,
    ) -> Result<Competition, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let competition = {
            let organizer_group = new_competition.organizer_group.to_db()?;
            let audit = audit.to_db()?;

            query_as::<_, SqlCompetition>(
                r#"
                    INSERT INTO competitions (
                        name,
                        organizer_group,
                        added_at,
                        added_by,
                        modified_at,
                        modified_by)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING *
                "#,
            )
            .bind(&new_competition.name)
            .bind(organizer_group)
            .bind(audit.added_at)
            .bind(audit.added_by)
            .bind(audit.modified_at)
            .bind(audit.modified_by)
            .fetch_one(&mut *transaction)
            .await?
        };

        transaction.commit().await?;

        let competition = Competition::from_db(&competition)?;
        info!("Created competition {} ({:?})", competition.name, competition.id);

        Ok(competition)
    }

    pub async fn get_competition(
        &self,
        id: CompetitionId,
    ) -> Result<Option<Competition>, anyhow::Error> {
        let competition = query_as::<_, SqlCompetition>("SELECT * FROM competitions WHERE id = $1")
            .bind(id.to_db()?)
            .fetch_optional(&self.pool)
            .await?;

        match competition {
            Some(competition) => Ok(Some(Competition::from_db(&competition)?)),
            None => Ok(None),
        }
    }

    /// Names are not unique; the first competition by id wins.
    pub async fn get_competition_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Competition>, anyhow::Error> {
        let competition = query_as::<_, SqlCompetition>(
            "SELECT * FROM competitions WHERE name = $1 ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match competition {
            Some(competition) => Ok(Some(Competition::from_db(&competition)?)),
            None => Ok(None),
        }
    }

    pub async fn list_competitions(&self) -> Result<Vec<Competition>, anyhow::Error> {
        let competitions =
            query_as::<_, SqlCompetition>("SELECT * FROM competitions ORDER BY name, id")
                .fetch_all(&self.pool)
                .await?;

        competitions
            .iter()
            .map(|competition| Ok(Competition::from_db(competition)?))
            .collect()
    }

    #[tracing::instrument(skip(self, competition), fields(id = ?competition.id))]
    pub async fn update_competition(
        &self,
        competition: &mut Competition,
        editor: Option<UserId>,
        now: UtcDateTime,
    ) -> Result<(), anyhow::Error> {
        let mut audit = competition.audit;
        audit.touch(editor, now);

        let mut transaction = self.pool.begin().await?;

        let row = competition.to_db()?;
        let modified = audit.to_db()?;
        let query_result = query(
            r#"
                UPDATE competitions
                SET name = $2,
                    organizer_group = $3,
                    modified_at = $4,
                    modified_by = $5
                WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.name)
        .bind(row.organizer_group)
        .bind(modified.modified_at)
        .bind(modified.modified_by)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        if query_result.rows_affected() == 0 {
            anyhow::bail!("Competition {:?} does not exist", competition.id);
        }

        competition.audit = audit;

        Ok(())
    }

    /// Seasons, series and registrations go with the competition.
    #[tracing::instrument(skip(self))]
    pub async fn delete_competition(&self, id: CompetitionId) -> Result<bool, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let db_id = id.to_db()?;
        let query_result = query("DELETE FROM competitions WHERE id = $1")
            .bind(db_id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        let competitions_deleted = query_result.rows_affected();

        if competitions_deleted > 1 {
            warn!("Deleted more than one competition with id {db_id}");
        }

        Ok(competitions_deleted > 0)
    }
}

#[derive(Debug, FromRow)]
pub struct SqlCompetition {
    id: i64,
    name: String,
    organizer_group: Option<i64>,
    #[sqlx(flatten)]
    audit: SqlAudit,
}

impl DBConvertible for Competition {
    type DBType = SqlCompetition;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(SqlCompetition {
            id: self.id.to_db()?,
            name: self.name.clone(),
            organizer_group: self.organizer_group.to_db()?,
            audit: self.audit.to_db()?,
        })
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        Ok(Competition {
            id: CompetitionId::from_db(&value.id)?,
            name: value.name.clone(),
            organizer_group: Option::<GroupId>::from_db(&value.organizer_group)?,
            audit: Audit::from_db(&value.audit)?,
        })
    }
}
