//! Rows owned by neighbouring applications, inserted directly for tests.

use sqlx::{query, query_scalar, SqlitePool};

use crate::{
    database::setup_in_memory_database,
    models::{types::UtcDateTime, GroupId, ProblemId, ProblemSetId, User, UserId},
    repository::conversion::DBConvertible,
};

pub async fn pool() -> SqlitePool {
    setup_in_memory_database()
        .await
        .expect("In-memory database should be set up")
}

pub async fn user(pool: &SqlitePool, username: &str) -> User {
    let id: i64 = query_scalar("INSERT INTO users (username) VALUES ($1) RETURNING id")
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap();

    User {
        id: UserId::from_db(&id).unwrap(),
        username: username.to_string(),
    }
}

pub async fn group(pool: &SqlitePool, name: &str) -> GroupId {
    let id: i64 = query_scalar("INSERT INTO user_groups (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap();

    GroupId::from_db(&id).unwrap()
}

/// Creates a problem set holding `problem_count` fresh problems.
pub async fn problem_set(
    pool: &SqlitePool,
    name: &str,
    problem_count: usize,
) -> (ProblemSetId, Vec<ProblemId>) {
    let set_id: i64 = query_scalar("INSERT INTO problem_sets (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap();

    let mut problems = Vec::with_capacity(problem_count);
    for index in 1..=problem_count {
        let problem_id: i64 = query_scalar("INSERT INTO problems (name) VALUES ($1) RETURNING id")
            .bind(format!("{name} / {index}"))
            .fetch_one(pool)
            .await
            .unwrap();

        query("INSERT INTO problem_set_problems (problem_set_id, problem_id) VALUES ($1, $2)")
            .bind(set_id)
            .bind(problem_id)
            .execute(pool)
            .await
            .unwrap();

        problems.push(ProblemId::from_db(&problem_id).unwrap());
    }

    (ProblemSetId::from_db(&set_id).unwrap(), problems)
}

pub async fn solution(pool: &SqlitePool, user: &User, problem: ProblemId, at: UtcDateTime) {
    query("INSERT INTO user_solutions (user_id, problem_id, submitted_at) VALUES ($1, $2, $3)")
        .bind(user.id.to_db().unwrap())
        .bind(problem.to_db().unwrap())
        .bind(at.to_db().unwrap())
        .execute(pool)
        .await
        .unwrap();
}
