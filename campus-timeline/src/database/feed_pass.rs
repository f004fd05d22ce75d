//! Connection-scoped state of one feed assembly pass
//!
//! A pass holds a single pooled connection for its whole duration. The
//! publisher relation (`temp.feed_publishers`) and the pass-local dedup
//! set (`temp.feed_seen_notes`) are SQLite TEMP tables, visible only to
//! that connection. `FeedPass::finish` drops both; a pass that is dropped
//! without finishing, or whose teardown fails, detaches its connection
//! from the pool so the tables die with it.

use super::models::{NoteId, PubId, Publication, UserId};
use crate::config::SEED_CHUNK_SIZE;
use crate::error::{AppError, Result};
use sqlx::pool::PoolConnection;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

/// Publisher predicate applied to every ledger lookup of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherFilter {
    /// No predicate
    Any,
    /// A single publisher
    Only(UserId),
    /// Publishers loaded into the pass relation
    Relation,
}

/// Exclusive bounds of a ledger scan; `None` is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanRange {
    pub floor: Option<PubId>,
    pub ceiling: Option<PubId>,
}

pub struct FeedPass {
    conn: Option<PoolConnection<Sqlite>>,
    filter: PublisherFilter,
}

impl FeedPass {
    /// Acquire a connection and create the pass relations on it
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let mut conn = pool.acquire().await?;

        sqlx::query("CREATE TEMP TABLE IF NOT EXISTS feed_publishers (user_id INTEGER PRIMARY KEY)")
            .execute(&mut *conn)
            .await?;
        sqlx::query("CREATE TEMP TABLE IF NOT EXISTS feed_seen_notes (note_id INTEGER PRIMARY KEY)")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM temp.feed_publishers")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM temp.feed_seen_notes")
            .execute(&mut *conn)
            .await?;

        Ok(Self {
            conn: Some(conn),
            filter: PublisherFilter::Any,
        })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .map(|conn| &mut **conn)
            .ok_or_else(|| AppError::Generic("feed pass already finished".to_string()))
    }

    pub fn filter(&self) -> PublisherFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: PublisherFilter) {
        self.filter = filter;
    }

    /// Materialize `{viewer} ∪ followed(viewer)` as the publisher relation
    /// and switch the pass to it. Returns the relation size.
    pub async fn load_followed(&mut self, viewer: UserId) -> Result<u64> {
        let conn = self.conn()?;

        sqlx::query("INSERT OR IGNORE INTO temp.feed_publishers (user_id) VALUES (?)")
            .bind(viewer)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO temp.feed_publishers (user_id)
            SELECT followed_id FROM follows WHERE follower_id = ?
            "#,
        )
        .bind(viewer)
        .execute(&mut *conn)
        .await?;

        let size: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM temp.feed_publishers")
            .fetch_one(&mut *conn)
            .await?;

        self.filter = PublisherFilter::Relation;

        Ok(size as u64)
    }

    /// Seed the pass-local dedup set, in chunks
    pub async fn exclude_notes(&mut self, notes: &[NoteId]) -> Result<()> {
        let conn = self.conn()?;

        for chunk in notes.chunks(SEED_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO temp.feed_seen_notes (note_id) ");
            builder.push_values(chunk, |mut row, note_id| {
                row.push_bind(*note_id);
            });
            builder.build().execute(&mut *conn).await?;
        }

        Ok(())
    }

    pub async fn exclude_note(&mut self, note_id: NoteId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO temp.feed_seen_notes (note_id) VALUES (?)")
            .bind(note_id)
            .execute(self.conn()?)
            .await?;

        Ok(())
    }

    /// Highest publication inside `range` matching the pass filter whose
    /// note is not in the dedup set
    pub async fn most_recent_before(&mut self, range: ScanRange) -> Result<Option<Publication>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, note_id, publisher_id, pub_type, published_at FROM publications WHERE 1 = 1",
        );

        if let Some(floor) = range.floor {
            builder.push(" AND id > ").push_bind(floor);
        }
        if let Some(ceiling) = range.ceiling {
            builder.push(" AND id < ").push_bind(ceiling);
        }

        match self.filter {
            PublisherFilter::Any => {}
            PublisherFilter::Only(user) => {
                builder.push(" AND publisher_id = ").push_bind(user);
            }
            PublisherFilter::Relation => {
                builder.push(" AND publisher_id IN (SELECT user_id FROM temp.feed_publishers)");
            }
        }

        builder.push(" AND note_id NOT IN (SELECT note_id FROM temp.feed_seen_notes)");
        builder.push(" ORDER BY id DESC LIMIT 1");

        let publication = builder
            .build_query_as::<Publication>()
            .fetch_optional(self.conn()?)
            .await?;

        Ok(publication)
    }

    pub async fn max_publication_id(&mut self) -> Result<Option<PubId>> {
        let max: Option<PubId> = sqlx::query_scalar("SELECT MAX(id) FROM publications")
            .fetch_one(self.conn()?)
            .await?;

        Ok(max)
    }

    /// Tear down the pass relations and return the connection to the pool
    pub async fn finish(mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        let dropped = async {
            sqlx::query("DROP TABLE IF EXISTS temp.feed_publishers")
                .execute(&mut *conn)
                .await?;
            sqlx::query("DROP TABLE IF EXISTS temp.feed_seen_notes")
                .execute(&mut *conn)
                .await?;
            Ok::<(), sqlx::Error>(())
        }
        .await;

        if let Err(e) = dropped {
            tracing::warn!("Failed to drop feed pass relations, closing connection: {}", e);
            drop(conn.detach());
        }
    }
}

impl Drop for FeedPass {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("Feed pass dropped before finish, closing its connection");
            drop(conn.detach());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::test_support::create_test_repo;
    use crate::database::{ContentRef, NoteKind, PubType, Repository};

    async fn seed(repo: &Repository) -> Vec<Publication> {
        let mut publications = Vec::new();
        for (content, author) in [(1, 1), (2, 2), (3, 3)] {
            let (_, original) = repo
                .create_note_with_original(&ContentRef::new(NoteKind::Post, content), author)
                .await
                .unwrap();
            publications.push(original);
        }
        publications
    }

    #[tokio::test]
    async fn test_most_recent_before_respects_range() {
        let repo = create_test_repo().await;
        let pubs = seed(&repo).await;
        let mut pass = FeedPass::begin(repo.pool()).await.unwrap();

        let top = pass.most_recent_before(ScanRange::default()).await.unwrap().unwrap();
        assert_eq!(top.id, pubs[2].id);

        let below = pass
            .most_recent_before(ScanRange { floor: None, ceiling: Some(pubs[2].id) })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(below.id, pubs[1].id);

        let above_floor = pass
            .most_recent_before(ScanRange { floor: Some(pubs[1].id), ceiling: Some(pubs[2].id) })
            .await
            .unwrap();
        assert!(above_floor.is_none());

        pass.finish().await;
    }

    #[tokio::test]
    async fn test_excluded_notes_are_skipped() {
        let repo = create_test_repo().await;
        let pubs = seed(&repo).await;
        let mut pass = FeedPass::begin(repo.pool()).await.unwrap();

        pass.exclude_notes(&[pubs[2].note_id, pubs[1].note_id]).await.unwrap();

        let found = pass.most_recent_before(ScanRange::default()).await.unwrap().unwrap();
        assert_eq!(found.id, pubs[0].id);

        pass.exclude_note(pubs[0].note_id).await.unwrap();
        assert!(pass.most_recent_before(ScanRange::default()).await.unwrap().is_none());

        pass.finish().await;
    }

    #[tokio::test]
    async fn test_followed_relation_includes_viewer() {
        let repo = create_test_repo().await;
        let pubs = seed(&repo).await;
        repo.follow(1, 2).await.unwrap();
        let mut pass = FeedPass::begin(repo.pool()).await.unwrap();

        let size = pass.load_followed(1).await.unwrap();
        assert_eq!(size, 2);
        assert_eq!(pass.filter(), PublisherFilter::Relation);

        let found = pass.most_recent_before(ScanRange::default()).await.unwrap().unwrap();
        assert_eq!(found.id, pubs[1].id);
        assert_eq!(found.pub_type, PubType::Original);

        pass.finish().await;
    }

    #[tokio::test]
    async fn test_finish_drops_relations() {
        let repo = create_test_repo().await;
        let mut pass = FeedPass::begin(repo.pool()).await.unwrap();
        pass.load_followed(1).await.unwrap();
        pass.finish().await;

        let mut conn = repo.pool().acquire().await.unwrap();
        let found: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_temp_master WHERE name IN ('feed_publishers', 'feed_seen_notes')",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        assert_eq!(found, 0);
    }
}
