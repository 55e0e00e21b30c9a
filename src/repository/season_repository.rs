use sqlx::{query, query_as, FromRow, Pool, Sqlite};
use tracing::{info, warn};

use crate::models::{
    types::UtcDateTime, Audit, CompetitionId, NewSeason, Season, SeasonId, User, UserId,
};

use super::conversion::{
    DBConvertible, DBFromConversionError, DBToConversionError, SqlAudit, SqlUser,
};

pub struct SeasonRepository {
    pool: Pool<Sqlite>,
}

impl SeasonRepository {
    pub fn new(pool: Pool<Sqlite>) -> SeasonRepository {
        SeasonRepository { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_season(
        &self,
        new_season: &NewSeason,
        audit: Audit,
    ) -> Result<Season, anyhow::Error> {
        if new_season.end <= new_season.start {
            anyhow::bail!(
                "Season {} would end ({}) before it starts ({})",
                new_season.name,
                new_season.end,
                new_season.start
            );
        }

        let mut transaction = self.pool.begin().await?;

        let season = {
            let competition_id = new_season.competition_id.to_db()?;
            let join_deadline = new_season.join_deadline.to_db()?;
            let start = new_season.start.to_db()?;
            let end = new_season.end.to_db()?;
            let audit = audit.to_db()?;

            query_as::<_, SqlSeason>(
                r#"
                    INSERT INTO seasons (
                        competition_id,
                        year,
                        number,
                        name,
                        join_deadline,
                        start_at,
                        end_at,
                        added_at,
                        added_by,
                        modified_at,
                        modified_by)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    RETURNING *
                "#,
            )
            .bind(competition_id)
            .bind(new_season.year)
            .bind(new_season.number)
            .bind(&new_season.name)
            .bind(join_deadline)
            .bind(start)
            .bind(end)
            .bind(audit.added_at)
            .bind(audit.added_by)
            .bind(audit.modified_at)
            .bind(audit.modified_by)
            .fetch_one(&mut *transaction)
            .await?
        };

        transaction.commit().await?;

        let season = Season::from_db(&season)?;
        info!("Created season {} ({:?})", season.name, season.id);

        Ok(season)
    }

    pub async fn get_season(&self, id: SeasonId) -> Result<Option<Season>, anyhow::Error> {
        let season = query_as::<_, SqlSeason>("SELECT * FROM seasons WHERE id = $1")
            .bind(id.to_db()?)
            .fetch_optional(&self.pool)
            .await?;

        match season {
            Some(season) => Ok(Some(Season::from_db(&season)?)),
            None => Ok(None),
        }
    }

    /// All seasons, grouped by competition name, then by year and number.
    pub async fn list_seasons(&self) -> Result<Vec<Season>, anyhow::Error> {
        let seasons = query_as::<_, SqlSeason>(
            r#"
                SELECT seasons.* FROM seasons
                JOIN competitions ON competitions.id = seasons.competition_id
                ORDER BY
                    competitions.name,
                    competitions.id,
                    seasons.year,
                    seasons.number,
                    seasons.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        seasons
            .iter()
            .map(|season| Ok(Season::from_db(season)?))
            .collect()
    }

    pub async fn list_competition_seasons(
        &self,
        competition_id: CompetitionId,
    ) -> Result<Vec<Season>, anyhow::Error> {
        let seasons = query_as::<_, SqlSeason>(
            r#"
                SELECT * FROM seasons
                WHERE competition_id = $1
                ORDER BY year, number, id
            "#,
        )
        .bind(competition_id.to_db()?)
        .fetch_all(&self.pool)
        .await?;

        seasons
            .iter()
            .map(|season| Ok(Season::from_db(season)?))
            .collect()
    }

    /// The season of the competition whose window strictly contains `now`.
    ///
    /// Overlapping seasons have no defined winner; the first one in listing
    /// order is returned and the overlap is logged.
    pub async fn get_active_season(
        &self,
        competition_id: CompetitionId,
        now: UtcDateTime,
    ) -> Result<Option<Season>, anyhow::Error> {
        let candidates = query_as::<_, SqlSeason>(
            r#"
                SELECT * FROM seasons
                WHERE competition_id = $1 AND start_at < $2 AND end_at > $2
                ORDER BY year, number, id
            "#,
        )
        .bind(competition_id.to_db()?)
        .bind(now.to_db()?)
        .fetch_all(&self.pool)
        .await?;

        if candidates.len() > 1 {
            let ids: Vec<i64> = candidates.iter().map(|season| season.id).collect();
            warn!(
                "Competition {competition_id:?} has overlapping active seasons at {now}: {ids:?}"
            );
        }

        match candidates.first() {
            Some(season) => Ok(Some(Season::from_db(season)?)),
            None => Ok(None),
        }
    }

    /// Everybody who submitted a solution to a problem of any series in the
    /// season, each user once.
    pub async fn get_competitors(&self, season_id: SeasonId) -> Result<Vec<User>, anyhow::Error> {
        let competitors = query_as::<_, SqlUser>(
            r#"
                SELECT DISTINCT users.id, users.username FROM users
                JOIN user_solutions ON user_solutions.user_id = users.id
                JOIN problem_set_problems
                    ON problem_set_problems.problem_id = user_solutions.problem_id
                JOIN series ON series.problem_set_id = problem_set_problems.problem_set_id
                WHERE series.season_id = $1
                ORDER BY users.username, users.id
            "#,
        )
        .bind(season_id.to_db()?)
        .fetch_all(&self.pool)
        .await?;

        competitors
            .iter()
            .map(|user| Ok(User::from_db(user)?))
            .collect()
    }

    #[tracing::instrument(skip(self, season), fields(id = ?season.id))]
    pub async fn update_season(
        &self,
        season: &mut Season,
        editor: Option<UserId>,
        now: UtcDateTime,
    ) -> Result<(), anyhow::Error> {
        if season.end <= season.start {
            anyhow::bail!(
                "Season {} would end ({}) before it starts ({})",
                season.name,
                season.end,
                season.start
            );
        }

        let mut audit = season.audit;
        audit.touch(editor, now);

        let mut transaction = self.pool.begin().await?;

        let row = season.to_db()?;
        let modified = audit.to_db()?;
        let query_result = query(
            r#"
                UPDATE seasons
                SET competition_id = $2,
                    year = $3,
                    number = $4,
                    name = $5,
                    join_deadline = $6,
                    start_at = $7,
                    end_at = $8,
                    modified_at = $9,
                    modified_by = $10
                WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.competition_id)
        .bind(row.year)
        .bind(row.number)
        .bind(row.name)
        .bind(row.join_deadline)
        .bind(row.start_at)
        .bind(row.end_at)
        .bind(modified.modified_at)
        .bind(modified.modified_by)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        if query_result.rows_affected() == 0 {
            anyhow::bail!("Season {:?} does not exist", season.id);
        }

        season.audit = audit;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_season(&self, id: SeasonId) -> Result<bool, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let query_result = query("DELETE FROM seasons WHERE id = $1")
            .bind(id.to_db()?)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(query_result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
pub struct SqlSeason {
    id: i64,
    competition_id: i64,
    year: i64,
    number: i64,
    name: String,
    join_deadline: Option<String>,
    start_at: String,
    end_at: String,
    #[sqlx(flatten)]
    audit: SqlAudit,
}

impl DBConvertible for Season {
    type DBType = SqlSeason;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(SqlSeason {
            id: self.id.to_db()?,
            competition_id: self.competition_id.to_db()?,
            year: self.year.to_db()?,
            number: self.number.to_db()?,
            name: self.name.clone(),
            join_deadline: self.join_deadline.to_db()?,
            start_at: self.start.to_db()?,
            end_at: self.end.to_db()?,
            audit: self.audit.to_db()?,
        })
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        Ok(Season {
            id: SeasonId::from_db(&value.id)?,
            competition_id: CompetitionId::from_db(&value.competition_id)?,
            year: i32::from_db(&value.year)?,
            number: i32::from_db(&value.number)?,
            name: value.name.clone(),
            join_deadline: Option::<UtcDateTime>::from_db(&value.join_deadline)?,
            start: UtcDateTime::from_db(&value.start_at)?,
            end: UtcDateTime::from_db(&value.end_at)?,
            audit: Audit::from_db(&value.audit)?,
        })
    }
}
