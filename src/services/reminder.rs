use crate::{
    config::Config,
    error::Result,
    models::{milestone::MilestoneStatus, notification::*},
    services::{store::MilestoneStore, NotificationService},
};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 单次提醒扫描的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 提醒调度器
///
/// 每次扫描 reminder_date 落在 `[today - catch_up_days, today + 1)` 内的里程碑，
/// 先占用 `(milestone, reminder_date)` 再发送通知，同一日期至多提醒一次。
#[derive(Clone)]
pub struct ReminderScheduler {
    milestones: Arc<dyn MilestoneStore>,
    notification_service: NotificationService,
    catch_up_days: i64,
    sweep_interval: Duration,
    sweep_timeout: Duration,
}

impl ReminderScheduler {
    pub fn new(
        milestones: Arc<dyn MilestoneStore>,
        notification_service: NotificationService,
        config: &Config,
    ) -> Self {
        Self {
            milestones,
            notification_service,
            catch_up_days: config.reminder_catch_up_days.max(0),
            sweep_interval: config.reminder_sweep_interval(),
            sweep_timeout: config.reminder_sweep_timeout(),
        }
    }

    pub async fn sweep(&self, today: NaiveDate) -> Result<SweepReport> {
        let from = today - ChronoDuration::days(self.catch_up_days);
        let until = today + ChronoDuration::days(1);

        let candidates = self
            .milestones
            .list_milestones_with_reminder_between(from, until)
            .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for milestone in candidates {
            let Some(reminder_date) = milestone.reminder_date else {
                report.skipped += 1;
                continue;
            };

            if milestone.status == MilestoneStatus::Completed || !milestone.reminder_pending() {
                report.skipped += 1;
                continue;
            }

            match self.milestones.claim_reminder(&milestone.id, reminder_date).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Reminder for milestone {} already sent", milestone.id);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!("Failed to claim reminder for milestone {}: {}", milestone.id, e);
                    report.failed += 1;
                    continue;
                }
            }

            let request = CreateNotificationRequest {
                recipient_id: milestone.student_id.clone(),
                milestone_id: Some(milestone.id.clone()),
                notification_type: NotificationType::MilestoneReminder,
                title: NotificationType::MilestoneReminder.default_title().to_string(),
                message: format!(
                    "Reminder: milestone \"{}\" is due on {}.",
                    milestone.title, milestone.due_date
                ),
            };

            match self.notification_service.create_notification(request).await {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    warn!("Failed to send reminder for milestone {}: {}", milestone.id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// 以当天日期执行一次扫描，受 sweep_timeout 约束
    pub async fn run_once(&self) -> Option<SweepReport> {
        let today = Utc::now().date_naive();

        match timeout(self.sweep_timeout, self.sweep(today)).await {
            Ok(Ok(report)) => {
                info!(
                    "Reminder sweep for {} finished: scanned={} sent={} skipped={} failed={}",
                    today, report.scanned, report.sent, report.skipped, report.failed
                );
                Some(report)
            }
            Ok(Err(e)) => {
                error!("Reminder sweep for {} failed: {}", today, e);
                None
            }
            Err(_) => {
                error!(
                    "Reminder sweep for {} exceeded {:?}, remaining reminders go out next run",
                    today, self.sweep_timeout
                );
                None
            }
        }
    }

    /// 启动后台任务，首次扫描立即执行
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Reminder scheduler started, interval {:?}", self.sweep_interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Reminder scheduler stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
