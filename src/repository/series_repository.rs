use sqlx::{query, query_as, FromRow, Pool, Sqlite};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    types::UtcDateTime, Audit, NewSeries, ProblemSetId, SeasonId, Series, SeriesId,
    SeriesValidationError, User, UserId,
};

use super::conversion::{
    DBConvertible, DBFromConversionError, DBToConversionError, SqlAudit, SqlUser,
};

pub struct SeriesRepository {
    pool: Pool<Sqlite>,
}

/// Saving a series either breaks the activation rules or fails in storage.
#[derive(Debug, Error)]
pub enum SeriesSaveError {
    #[error(transparent)]
    Invalid(#[from] SeriesValidationError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<sqlx::Error> for SeriesSaveError {
    fn from(error: sqlx::Error) -> Self {
        SeriesSaveError::Storage(error.into())
    }
}

impl From<DBToConversionError> for SeriesSaveError {
    fn from(error: DBToConversionError) -> Self {
        SeriesSaveError::Storage(error.into())
    }
}

impl From<DBFromConversionError> for SeriesSaveError {
    fn from(error: DBFromConversionError) -> Self {
        SeriesSaveError::Storage(error.into())
    }
}

impl SeriesRepository {
    pub fn new(pool: Pool<Sqlite>) -> SeriesRepository {
        SeriesRepository { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_series(
        &self,
        new_series: &NewSeries,
        audit: Audit,
        now: UtcDateTime,
    ) -> Result<Series, SeriesSaveError> {
        if let Err(error) = new_series.clean(now) {
            warn!("Rejected series {}: {error}", new_series.name);
            return Err(error.into());
        }

        let mut transaction = self.pool.begin().await?;

        let series = {
            let season_id = new_series.season_id.to_db()?;
            let number = new_series.number.to_db()?;
            let problem_set = new_series.problem_set.to_db()?;
            let submission_deadline = new_series.submission_deadline.to_db()?;
            let audit = audit.to_db()?;

            query_as::<_, SqlSeries>(
                r#"
                    INSERT INTO series (
                        season_id,
                        name,
                        number,
                        problem_set_id,
                        submission_deadline,
                        is_active,
                        added_at,
                        added_by,
                        modified_at,
                        modified_by)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    RETURNING *
                "#,
            )
            .bind(season_id)
            .bind(&new_series.name)
            .bind(number)
            .bind(problem_set)
            .bind(submission_deadline)
            .bind(new_series.is_active)
            .bind(audit.added_at)
            .bind(audit.added_by)
            .bind(audit.modified_at)
            .bind(audit.modified_by)
            .fetch_one(&mut *transaction)
            .await?
        };

        transaction.commit().await?;

        let series = Series::from_db(&series)?;
        info!("Created series {} ({:?})", series.name, series.id);

        Ok(series)
    }

    pub async fn get_series(&self, id: SeriesId) -> Result<Option<Series>, anyhow::Error> {
        let series = query_as::<_, SqlSeries>("SELECT * FROM series WHERE id = $1")
            .bind(id.to_db()?)
            .fetch_optional(&self.pool)
            .await?;

        match series {
            Some(series) => Ok(Some(Series::from_db(&series)?)),
            None => Ok(None),
        }
    }

    /// Series of the season by ascending submission deadline. Series without
    /// a deadline come last.
    pub async fn list_season_series(
        &self,
        season_id: SeasonId,
    ) -> Result<Vec<Series>, anyhow::Error> {
        let series = query_as::<_, SqlSeries>(
            r#"
                SELECT * FROM series
                WHERE season_id = $1
                ORDER BY submission_deadline NULLS LAST, number
            "#,
        )
        .bind(season_id.to_db()?)
        .fetch_all(&self.pool)
        .await?;

        series
            .iter()
            .map(|series| Ok(Series::from_db(series)?))
            .collect()
    }

    /// The series that is still open and closest to its deadline. When every
    /// deadline has passed, the series with the latest one. `None` only for a
    /// season without series.
    pub async fn get_series_nearest_deadline(
        &self,
        season_id: SeasonId,
        now: UtcDateTime,
    ) -> Result<Option<Series>, anyhow::Error> {
        let season_id = season_id.to_db()?;

        let open_series = query_as::<_, SqlSeries>(
            r#"
                SELECT * FROM series
                WHERE season_id = $1 AND submission_deadline > $2
                ORDER BY submission_deadline, number
                LIMIT 1
            "#,
        )
        .bind(season_id)
        .bind(now.to_db()?)
        .fetch_optional(&self.pool)
        .await?;

        let series = match open_series {
            Some(series) => Some(series),
            None => {
                query_as::<_, SqlSeries>(
                    r#"
                        SELECT * FROM series
                        WHERE season_id = $1
                        ORDER BY submission_deadline DESC NULLS LAST, number DESC
                        LIMIT 1
                    "#,
                )
                .bind(season_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        match series {
            Some(series) => Ok(Some(Series::from_db(&series)?)),
            None => Ok(None),
        }
    }

    pub async fn is_nearest_deadline(
        &self,
        series: &Series,
        now: UtcDateTime,
    ) -> Result<bool, anyhow::Error> {
        let nearest = self
            .get_series_nearest_deadline(series.season_id, now)
            .await?;

        Ok(nearest.is_some_and(|nearest| nearest.id == series.id))
    }

    /// Everybody who submitted a solution to a problem of the series' problem
    /// set, each user once. A series without problems has no competitors.
    pub async fn get_competitors(&self, series_id: SeriesId) -> Result<Vec<User>, anyhow::Error> {
        let competitors = query_as::<_, SqlUser>(
            r#"
                SELECT DISTINCT users.id, users.username FROM users
                JOIN user_solutions ON user_solutions.user_id = users.id
                JOIN problem_set_problems
                    ON problem_set_problems.problem_id = user_solutions.problem_id
                JOIN series ON series.problem_set_id = problem_set_problems.problem_set_id
                WHERE series.id = $1
                ORDER BY users.username, users.id
            "#,
        )
        .bind(series_id.to_db()?)
        .fetch_all(&self.pool)
        .await?;

        competitors
            .iter()
            .map(|user| Ok(User::from_db(user)?))
            .collect()
    }

    #[tracing::instrument(skip(self, series), fields(id = ?series.id))]
    pub async fn update_series(
        &self,
        series: &mut Series,
        editor: Option<UserId>,
        now: UtcDateTime,
    ) -> Result<(), SeriesSaveError> {
        if let Err(error) = series.clean(now) {
            warn!("Rejected series {}: {error}", series.name);
            return Err(error.into());
        }

        let mut audit = series.audit;
        audit.touch(editor, now);

        let mut transaction = self.pool.begin().await?;

        let row = series.to_db()?;
        let modified = audit.to_db()?;
        let query_result = query(
            r#"
                UPDATE series
                SET season_id = $2,
                    name = $3,
                    number = $4,
                    problem_set_id = $5,
                    submission_deadline = $6,
                    is_active = $7,
                    modified_at = $8,
                    modified_by = $9
                WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(row.season_id)
        .bind(row.name)
        .bind(row.number)
        .bind(row.problem_set_id)
        .bind(row.submission_deadline)
        .bind(row.is_active)
        .bind(modified.modified_at)
        .bind(modified.modified_by)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        if query_result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Series {:?} does not exist", series.id).into());
        }

        series.audit = audit;

        Ok(())
    }

    /// Flips the active flag of a stored series, going through the same
    /// validation as any other update.
    pub async fn set_active(
        &self,
        id: SeriesId,
        is_active: bool,
        editor: Option<UserId>,
        now: UtcDateTime,
    ) -> Result<Series, SeriesSaveError> {
        let Some(mut series) = self.get_series(id).await? else {
            return Err(anyhow::anyhow!("Series {id:?} does not exist").into());
        };

        series.is_active = is_active;
        self.update_series(&mut series, editor, now).await?;

        Ok(series)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_series(&self, id: SeriesId) -> Result<bool, anyhow::Error> {
        let mut transaction = self.pool.begin().await?;

        let query_result = query("DELETE FROM series WHERE id = $1")
            .bind(id.to_db()?)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(query_result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
pub struct SqlSeries {
    id: i64,
    season_id: i64,
    name: String,
    number: i64,
    problem_set_id: Option<i64>,
    submission_deadline: Option<String>,
    is_active: bool,
    #[sqlx(flatten)]
    audit: SqlAudit,
}

impl DBConvertible for Series {
    type DBType = SqlSeries;

    fn to_db(&self) -> Result<Self::DBType, DBToConversionError> {
        Ok(SqlSeries {
            id: self.id.to_db()?,
            season_id: self.season_id.to_db()?,
            name: self.name.clone(),
            number: self.number.to_db()?,
            problem_set_id: self.problem_set.to_db()?,
            submission_deadline: self.submission_deadline.to_db()?,
            is_active: self.is_active,
            audit: self.audit.to_db()?,
        })
    }

    fn from_db(value: &Self::DBType) -> Result<Self, DBFromConversionError> {
        Ok(Series {
            id: SeriesId::from_db(&value.id)?,
            season_id: SeasonId::from_db(&value.season_id)?,
            name: value.name.clone(),
            number: u16::from_db(&value.number)?,
            problem_set: Option::<ProblemSetId>::from_db(&value.problem_set_id)?,
            submission_deadline: Option::<UtcDateTime>::from_db(&value.submission_deadline)?,
            is_active: value.is_active,
            audit: Audit::from_db(&value.audit)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use map_macro::hash_set;
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::{
        models::{NewCompetition, NewSeason},
        repository::{fixtures, CompetitionRepository, SeasonRepository},
    };

    fn now() -> UtcDateTime {
        UtcDateTime::assume_utc(datetime!(2026-10-18 12:00))
    }

    async fn season(pool: &Pool<Sqlite>) -> SeasonId {
        let competition = CompetitionRepository::new(pool.clone())
            .create_competition(
                &NewCompetition {
                    name: "KMS".to_string(),
                    organizer_group: None,
                },
                Audit::new(None, now()),
            )
            .await
            .unwrap();

        SeasonRepository::new(pool.clone())
            .create_season(
                &NewSeason {
                    competition_id: competition.id,
                    year: 2026,
                    number: 1,
                    name: "Zimná časť".to_string(),
                    join_deadline: None,
                    start: now() - Duration::days(30),
                    end: now() + Duration::days(90),
                },
                Audit::new(None, now()),
            )
            .await
            .unwrap()
            .id
    }

    fn new_series(
        season_id: SeasonId,
        number: u16,
        submission_deadline: Option<UtcDateTime>,
    ) -> NewSeries {
        NewSeries {
            season_id,
            name: format!("{number}. séria"),
            number,
            problem_set: None,
            submission_deadline,
            is_active: false,
        }
    }

    async fn add_series(
        repository: &SeriesRepository,
        season_id: SeasonId,
        number: u16,
        submission_deadline: Option<UtcDateTime>,
    ) -> Series {
        repository
            .create_series(
                &new_series(season_id, number, submission_deadline),
                Audit::new(None, now()),
                now(),
            )
            .await
            .unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn active_series_without_deadline_is_not_saved() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let (problem_set, _) = fixtures::problem_set(&pool, "first", 1).await;
        let repository = SeriesRepository::new(pool);

        let mut series = new_series(season_id, 1, None);
        series.problem_set = Some(problem_set);
        series.is_active = true;

        let result = repository
            .create_series(&series, Audit::new(None, now()), now())
            .await;

        assert!(matches!(
            result,
            Err(SeriesSaveError::Invalid(
                SeriesValidationError::MissingSubmissionDeadline
            ))
        ));
        assert!(repository
            .list_season_series(season_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn active_series_without_problem_set_is_not_saved() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let repository = SeriesRepository::new(pool);

        let mut series = new_series(season_id, 1, Some(now() + Duration::days(7)));
        series.is_active = true;

        let result = repository
            .create_series(&series, Audit::new(None, now()), now())
            .await;

        assert!(matches!(
            result,
            Err(SeriesSaveError::Invalid(SeriesValidationError::MissingProblemSet))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn series_past_deadline_cannot_be_activated() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let (problem_set, _) = fixtures::problem_set(&pool, "first", 1).await;
        let repository = SeriesRepository::new(pool);

        let mut series = new_series(season_id, 1, Some(now() - Duration::days(1)));
        series.problem_set = Some(problem_set);
        let stored = repository
            .create_series(&series, Audit::new(None, now()), now())
            .await
            .unwrap();

        let result = repository.set_active(stored.id, true, None, now()).await;

        assert!(matches!(
            result,
            Err(SeriesSaveError::Invalid(
                SeriesValidationError::PastSubmissionDeadline
            ))
        ));
        assert!(!repository.get_series(stored.id).await.unwrap().unwrap().is_active);
    }

    #[test_log::test(tokio::test)]
    async fn complete_series_can_be_activated() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let editor = fixtures::user(&pool, "editor").await;
        let (problem_set, _) = fixtures::problem_set(&pool, "first", 1).await;
        let repository = SeriesRepository::new(pool);

        let mut series = new_series(season_id, 1, Some(now() + Duration::days(7)));
        series.problem_set = Some(problem_set);
        let stored = repository
            .create_series(&series, Audit::new(None, now()), now())
            .await
            .unwrap();

        let activated = repository
            .set_active(stored.id, true, Some(editor.id), now() + Duration::hours(1))
            .await
            .unwrap();

        assert!(activated.is_active);
        assert_eq!(activated.audit.modified_by, Some(editor.id));
        assert_eq!(
            repository.get_series(stored.id).await.unwrap(),
            Some(activated)
        );
    }

    #[test_log::test(tokio::test)]
    async fn deleting_problem_set_removes_its_series() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let (problem_set, _) = fixtures::problem_set(&pool, "first", 2).await;
        let repository = SeriesRepository::new(pool.clone());

        let mut series = new_series(season_id, 1, Some(now() + Duration::days(7)));
        series.problem_set = Some(problem_set);
        series.is_active = true;
        let stored = repository
            .create_series(&series, Audit::new(None, now()), now())
            .await
            .unwrap();

        query("DELETE FROM problem_sets WHERE id = $1")
            .bind(problem_set.to_db().unwrap())
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(repository.get_series(stored.id).await.unwrap(), None);
        assert!(repository
            .list_season_series(season_id)
            .await
            .unwrap()
            .iter()
            .all(|series| series.clean(now()).is_ok()));
    }

    #[test_log::test(tokio::test)]
    async fn rejected_update_keeps_previous_stamp() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let editor = fixtures::user(&pool, "editor").await;
        let repository = SeriesRepository::new(pool);

        let mut series = add_series(&repository, season_id, 1, None).await;
        let original_audit = series.audit;

        series.is_active = true;
        let invalid = repository
            .update_series(&mut series, Some(editor.id), now() + Duration::hours(1))
            .await;
        assert!(matches!(invalid, Err(SeriesSaveError::Invalid(_))));
        assert_eq!(series.audit, original_audit);

        series.is_active = false;
        repository.delete_series(series.id).await.unwrap();
        let missing = repository
            .update_series(&mut series, Some(editor.id), now() + Duration::hours(1))
            .await;
        assert!(matches!(missing, Err(SeriesSaveError::Storage(_))));
        assert_eq!(series.audit, original_audit);
    }

    #[test_log::test(tokio::test)]
    async fn number_is_unique_within_season() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let repository = SeriesRepository::new(pool);

        add_series(&repository, season_id, 1, Some(now())).await;

        let result = repository
            .create_series(
                &new_series(season_id, 1, Some(now() + Duration::days(1))),
                Audit::new(None, now()),
                now(),
            )
            .await;

        assert!(matches!(result, Err(SeriesSaveError::Storage(_))));
    }

    #[test_log::test(tokio::test)]
    async fn nearest_deadline_of_empty_season() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let repository = SeriesRepository::new(pool);

        assert_eq!(
            repository
                .get_series_nearest_deadline(season_id, now())
                .await
                .unwrap(),
            None
        );
    }

    #[test_log::test(tokio::test)]
    async fn nearest_deadline_is_earliest_open_series() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let repository = SeriesRepository::new(pool);

        add_series(&repository, season_id, 1, Some(now() - Duration::days(7))).await;
        add_series(&repository, season_id, 3, Some(now() + Duration::days(14))).await;
        let second = add_series(&repository, season_id, 2, Some(now() + Duration::days(7))).await;

        let nearest = repository
            .get_series_nearest_deadline(season_id, now())
            .await
            .unwrap();

        assert_eq!(nearest, Some(second.clone()));
        assert!(repository.is_nearest_deadline(&second, now()).await.unwrap());
    }

    #[test_log::test(tokio::test)]
    async fn nearest_deadline_falls_back_to_latest() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let repository = SeriesRepository::new(pool);

        let first = add_series(&repository, season_id, 1, Some(now() - Duration::days(14))).await;
        let last = add_series(&repository, season_id, 2, Some(now() - Duration::days(7))).await;
        add_series(&repository, season_id, 3, None).await;

        assert_eq!(
            repository
                .get_series_nearest_deadline(season_id, now())
                .await
                .unwrap(),
            Some(last.clone())
        );
        assert!(repository.is_nearest_deadline(&last, now()).await.unwrap());
        assert!(!repository.is_nearest_deadline(&first, now()).await.unwrap());
    }

    #[test_log::test(tokio::test)]
    async fn series_listed_by_deadline() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let repository = SeriesRepository::new(pool);

        add_series(&repository, season_id, 1, Some(now() + Duration::days(14))).await;
        add_series(&repository, season_id, 2, None).await;
        add_series(&repository, season_id, 3, Some(now() + Duration::days(7))).await;

        let numbers: Vec<u16> = repository
            .list_season_series(season_id)
            .await
            .unwrap()
            .into_iter()
            .map(|series| series.number)
            .collect();

        assert_eq!(numbers, [3, 1, 2]);
    }

    #[test_log::test(tokio::test)]
    async fn competitors_solving_several_problems_appear_once() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let (problem_set, problems) = fixtures::problem_set(&pool, "first", 3).await;
        let alice = fixtures::user(&pool, "alice").await;
        let bob = fixtures::user(&pool, "bob").await;
        fixtures::user(&pool, "idle").await;
        let repository = SeriesRepository::new(pool.clone());

        let mut series = new_series(season_id, 1, Some(now() + Duration::days(7)));
        series.problem_set = Some(problem_set);
        let series = repository
            .create_series(&series, Audit::new(None, now()), now())
            .await
            .unwrap();

        for problem in &problems {
            fixtures::solution(&pool, &alice, *problem, now()).await;
        }
        fixtures::solution(&pool, &alice, problems[0], now() + Duration::hours(1)).await;
        fixtures::solution(&pool, &bob, problems[2], now()).await;

        let competitors = repository.get_competitors(series.id).await.unwrap();
        let ids: HashSet<UserId> = competitors.iter().map(|user| user.id).collect();

        assert_eq!(competitors.len(), 2);
        assert_eq!(ids, hash_set! { alice.id, bob.id });
    }

    #[test_log::test(tokio::test)]
    async fn series_without_problem_set_has_no_competitors() {
        let pool = fixtures::pool().await;
        let season_id = season(&pool).await;
        let repository = SeriesRepository::new(pool);

        let series = add_series(&repository, season_id, 1, None).await;

        assert!(repository
            .get_competitors(series.id)
            .await
            .unwrap()
            .is_empty());
    }
}
