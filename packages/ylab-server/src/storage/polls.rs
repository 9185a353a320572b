use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use ylab_core::api::VoteRequest;
use ylab_core::rules;
use ylab_core::{Poll, PollId, PollStatus, TeamId, Vote};

use super::rows::{poll_from_row, team_from_row, vote_from_row, POLL_COLUMNS, TEAM_COLUMNS, VOTE_COLUMNS};
use super::traits::{NewPoll, PollStore, StorageError, StorageResult};

/// PostgreSQL implementation of PollStore
pub struct PostgresPollStore {
    pool: PgPool,
}

impl PostgresPollStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema for polls and votes. Needs teams.
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id BIGSERIAL PRIMARY KEY,
                question TEXT NOT NULL,
                options JSONB NOT NULL,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                status VARCHAR(10) NOT NULL DEFAULT 'ouvert',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id BIGSERIAL PRIMARY KEY,
                team_id BIGINT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                poll_id BIGINT NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
                chosen_option TEXT NOT NULL,
                credit_staked BIGINT NOT NULL CHECK (credit_staked >= 1),
                vote_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (team_id, poll_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn poll_votes(&self, poll_id: PollId) -> StorageResult<Vec<Vote>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM votes WHERE poll_id = $1 ORDER BY vote_date",
            VOTE_COLUMNS
        ))
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(vote_from_row).collect()
    }

    async fn poll_only(&self, id: PollId) -> StorageResult<Poll> {
        let row = sqlx::query(&format!("SELECT {} FROM polls WHERE id = $1", POLL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::PollNotFound)?;

        poll_from_row(&row)
    }
}

#[async_trait]
impl PollStore for PostgresPollStore {
    async fn list_polls(&self, status: Option<PollStatus>) -> StorageResult<Vec<Poll>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM polls WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY start_date DESC",
            POLL_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(poll_from_row).collect()
    }

    async fn get_poll(&self, id: PollId) -> StorageResult<Poll> {
        let mut poll = self.poll_only(id).await?;
        poll.votes = Some(self.poll_votes(id).await?);
        Ok(poll)
    }

    async fn create_poll(&self, poll: NewPoll) -> StorageResult<Poll> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO polls (question, options, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            POLL_COLUMNS
        ))
        .bind(&poll.question)
        .bind(Json(poll.options.clone()))
        .bind(poll.start_date)
        .bind(poll.end_date)
        .bind(PollStatus::Open.as_str())
        .fetch_one(&self.pool)
        .await?;

        poll_from_row(&row)
    }

    async fn close_poll(&self, id: PollId) -> StorageResult<Poll> {
        let row = sqlx::query(&format!(
            "UPDATE polls SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            POLL_COLUMNS
        ))
        .bind(PollStatus::Closed.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::PollNotFound)?;

        poll_from_row(&row)
    }

    async fn list_team_votes(&self, team_id: TeamId) -> StorageResult<Vec<Vote>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM votes WHERE team_id = $1 ORDER BY vote_date DESC",
            VOTE_COLUMNS
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        let mut votes = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut vote = vote_from_row(row)?;
            vote.poll = Some(self.poll_only(vote.poll_id).await?);
            votes.push(vote);
        }
        Ok(votes)
    }

    async fn get_team_vote(&self, team_id: TeamId, poll_id: PollId) -> StorageResult<Vote> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM votes WHERE team_id = $1 AND poll_id = $2",
            VOTE_COLUMNS
        ))
        .bind(team_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::VoteNotFound)?;

        let mut vote = vote_from_row(&row)?;
        vote.poll = Some(self.poll_only(poll_id).await?);
        Ok(vote)
    }

    async fn cast_vote(&self, team_id: TeamId, vote: VoteRequest) -> StorageResult<Vote> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {} FROM teams WHERE id = $1 FOR UPDATE", TEAM_COLUMNS))
            .bind(team_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::TeamNotFound)?;
        let team = team_from_row(&row, "")?;

        let row = sqlx::query(&format!("SELECT {} FROM polls WHERE id = $1", POLL_COLUMNS))
            .bind(vote.poll_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::PollNotFound)?;
        let poll = poll_from_row(&row)?;

        let already_voted: bool = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM votes WHERE team_id = $1 AND poll_id = $2) AS voted",
        )
        .bind(team_id)
        .bind(vote.poll_id)
        .fetch_one(&mut *tx)
        .await?
        .try_get("voted")?;

        rules::check_vote(
            &poll,
            &vote.chosen_option,
            vote.credit_staked,
            team.credit,
            already_voted,
            Utc::now(),
        )?;

        sqlx::query("UPDATE teams SET credit = credit - $1, updated_at = NOW() WHERE id = $2")
            .bind(vote.credit_staked)
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO votes (team_id, poll_id, chosen_option, credit_staked, vote_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            VOTE_COLUMNS
        ))
        .bind(team_id)
        .bind(vote.poll_id)
        .bind(&vote.chosen_option)
        .bind(vote.credit_staked)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut recorded = vote_from_row(&row)?;
        recorded.poll = Some(poll);
        Ok(recorded)
    }
}
