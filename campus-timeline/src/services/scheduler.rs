/// Scheduler Service
/// Periodically removes expired session feed cursors using cron expressions
use crate::error::{AppError, Result};
use crate::services::cursor::SessionCursorStore;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Sweep frequency options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepFrequency {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl SweepFrequency {
    /// Convert frequency to cron expression
    pub fn to_cron(self) -> String {
        match self {
            SweepFrequency::Minutes(1) => "0 * * * * *".to_string(),
            SweepFrequency::Minutes(m) => format!("0 */{} * * * *", m),
            SweepFrequency::Hours(1) => "0 0 * * * *".to_string(),
            SweepFrequency::Hours(h) => format!("0 0 */{} * * *", h),
            // Daily sweeps run at 3 AM
            SweepFrequency::Days(1) => "0 0 3 * * *".to_string(),
            SweepFrequency::Days(d) => format!("0 0 3 */{} * *", d),
        }
    }
}

impl FromStr for SweepFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Formats: "5m", "2h", "3d" or legacy "daily", "weekly", "monthly"
        let s = s.trim().to_lowercase();

        match s.as_str() {
            "daily" => return Ok(SweepFrequency::Days(1)),
            "weekly" => return Ok(SweepFrequency::Days(7)),
            "monthly" => return Ok(SweepFrequency::Days(30)),
            _ => {}
        }

        let Some((split, unit)) = s.char_indices().last() else {
            return Err("Empty frequency string".to_string());
        };

        let value: u32 = s[..split]
            .parse()
            .map_err(|_| format!("Invalid number in frequency: {}", s))?;

        if value == 0 {
            return Err("Frequency value must be greater than 0".to_string());
        }

        match unit {
            'm' => Ok(SweepFrequency::Minutes(value)),
            'h' => Ok(SweepFrequency::Hours(value)),
            'd' => Ok(SweepFrequency::Days(value)),
            _ => Err(format!(
                "Invalid frequency unit '{}'. Use 'm' (minutes), 'h' (hours), or 'd' (days)",
                unit
            )),
        }
    }
}

/// Scheduler for the expired-cursor sweep
pub struct SweepScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    cursors: Arc<SessionCursorStore>,
    current_job_id: Arc<RwLock<Option<Uuid>>>,
}

impl SweepScheduler {
    pub async fn new(cursors: SessionCursorStore) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            cursors: Arc::new(cursors),
            current_job_id: Arc::new(RwLock::new(None)),
        })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Cursor sweep scheduler started");
        Ok(())
    }

    /// Schedule the sweep, replacing any previous schedule
    pub async fn schedule_sweep(&self, frequency: SweepFrequency, ttl: chrono::Duration) -> Result<()> {
        self.cancel_sweep().await?;

        let cron_expr = frequency.to_cron();
        let cursors = Arc::clone(&self.cursors);

        let job = Job::new_async(cron_expr.clone(), move |_uuid, _l| {
            let cursors = Arc::clone(&cursors);
            Box::pin(async move {
                tracing::debug!("Running scheduled cursor sweep");

                if let Err(e) = cursors.clear_expired(ttl).await {
                    tracing::error!("Cursor sweep failed: {}", e);
                }
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create sweep job: {}", e)))?;

        let job_id = job.guid();

        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to schedule job: {}", e)))?;

        let mut current_job = self.current_job_id.write().await;
        *current_job = Some(job_id);

        tracing::info!("Cursor sweep scheduled: {:?} ({})", frequency, cron_expr);
        Ok(())
    }

    /// Cancel the scheduled sweep
    pub async fn cancel_sweep(&self) -> Result<()> {
        let mut current_job = self.current_job_id.write().await;

        if let Some(job_id) = *current_job {
            let scheduler = self.scheduler.write().await;
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| AppError::Scheduler(format!("Failed to remove job: {}", e)))?;

            *current_job = None;
            tracing::info!("Cursor sweep schedule cancelled");
        }

        Ok(())
    }

    pub async fn is_scheduled(&self) -> bool {
        self.current_job_id.read().await.is_some()
    }

    /// Shutdown scheduler gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Cursor sweep scheduler shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::test_support::create_test_repo;

    #[test]
    fn test_frequency_parsing() {
        assert_eq!("30m".parse::<SweepFrequency>().unwrap(), SweepFrequency::Minutes(30));
        assert_eq!(" 12H ".parse::<SweepFrequency>().unwrap(), SweepFrequency::Hours(12));
        assert_eq!("daily".parse::<SweepFrequency>().unwrap(), SweepFrequency::Days(1));
        assert_eq!("weekly".parse::<SweepFrequency>().unwrap(), SweepFrequency::Days(7));
        assert!("0h".parse::<SweepFrequency>().is_err());
        assert!("".parse::<SweepFrequency>().is_err());
        assert!("5w".parse::<SweepFrequency>().is_err());
        assert!("h".parse::<SweepFrequency>().is_err());
    }

    #[test]
    fn test_cron_expressions() {
        assert_eq!(SweepFrequency::Minutes(1).to_cron(), "0 * * * * *");
        assert_eq!(SweepFrequency::Minutes(15).to_cron(), "0 */15 * * * *");
        assert_eq!(SweepFrequency::Hours(1).to_cron(), "0 0 * * * *");
        assert_eq!(SweepFrequency::Days(2).to_cron(), "0 0 3 */2 * *");
    }

    #[tokio::test]
    async fn test_schedule_and_cancel() {
        let cursors = SessionCursorStore::new(create_test_repo().await);
        let scheduler = SweepScheduler::new(cursors).await.unwrap();

        scheduler
            .schedule_sweep(SweepFrequency::Hours(1), chrono::Duration::hours(24))
            .await
            .unwrap();
        assert!(scheduler.is_scheduled().await);

        scheduler.cancel_sweep().await.unwrap();
        assert!(!scheduler.is_scheduled().await);
    }
}
