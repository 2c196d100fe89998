//! 定时调度
//!
//! 启动时立即执行一次，之后按 cron 表达式或固定间隔周期触发。每次运行在独立任务中执行，
//! 调度循环不等待其完成，上一轮未结束时下一轮照常触发。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use credit_block_shared::config::{JobConfig, JobSchedule};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{Result, WorkerError};
use crate::job::CreditBlockJob;

enum Trigger {
    Cron {
        expression: String,
        schedule: Schedule,
    },
    Every(chrono::Duration),
}

pub struct CreditBlockScheduler {
    name: String,
    trigger: Trigger,
    job: Arc<CreditBlockJob>,
}

impl CreditBlockScheduler {
    pub fn new(config: &JobConfig, job: Arc<CreditBlockJob>) -> Result<Self> {
        let trigger = match config.schedule() {
            JobSchedule::Cron(expression) => {
                let schedule =
                    Schedule::from_str(&expression).map_err(|e| WorkerError::InvalidSchedule {
                        expression: expression.clone(),
                        reason: e.to_string(),
                    })?;
                Trigger::Cron {
                    expression,
                    schedule,
                }
            }
            JobSchedule::Every(interval) => {
                let step =
                    chrono::Duration::from_std(interval).map_err(|e| WorkerError::InvalidSchedule {
                        expression: format!("every {}s", interval.as_secs()),
                        reason: e.to_string(),
                    })?;
                Trigger::Every(step)
            }
        };

        Ok(Self {
            name: config.name.clone(),
            trigger,
            job,
        })
    }

    /// cron 表达式，固定间隔调度时为 None
    pub fn expression(&self) -> Option<&str> {
        match &self.trigger {
            Trigger::Cron { expression, .. } => Some(expression),
            Trigger::Every(_) => None,
        }
    }

    fn describe(&self) -> String {
        match &self.trigger {
            Trigger::Cron { expression, .. } => format!("cron {expression}"),
            Trigger::Every(step) => format!("every {}m", step.num_minutes()),
        }
    }

    /// `after` 之后的下一个触发时间
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.trigger {
            Trigger::Cron { schedule, .. } => schedule.after(&after).next(),
            Trigger::Every(step) => after.checked_add_signed(*step),
        }
    }

    fn trigger(&self) {
        let job = Arc::clone(&self.job);
        let name = self.name.clone();
        tokio::spawn(async move {
            let reports = job.run_to_completion().await;
            info!(job = %name, orders = reports.len(), "定时任务本轮结束");
        });
    }

    /// 调度主循环，直到收到 shutdown 信号
    ///
    /// 已触发的运行不会被取消。
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let schedule = self.describe();
        info!(job = %self.name, schedule = %schedule, "定时任务已注册");

        let mut last_fire = Utc::now();
        self.trigger();

        loop {
            let now = Utc::now();
            // 以上次触发时间为下限，提前醒来时不会重复触发同一时刻
            let Some(next) = self.next_fire_after(now.max(last_fire)) else {
                warn!(job = %self.name, schedule = %schedule, "调度没有后续触发时间，停止");
                break;
            };
            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    info!(job = %self.name, fire_at = %next, "触发定时任务");
                    last_fire = next;
                    self.trigger();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(job = %self.name, "收到关闭信号，停止调度");
                        break;
                    }
                }
            }
        }
    }
}
