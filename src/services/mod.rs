use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future;
use teloxide::prelude::*;

use tokio_cron_scheduler::{Job, JobScheduler};

use crate::api::models::Prescription;
use crate::api::ApiClient;
use crate::sync::RxList;
use crate::utils::{escape_markdown, format_timestamp};

/// How far ahead a refill date may lie and still trigger a reminder.
/// Anything already overdue is always included.
const REFILL_WINDOW_DAYS: i64 = 7;

/// Schedules reminders for upcoming refills.
///
/// This function sets up a scheduled job that sweeps the prescription list
/// and sends a reminder for every record whose refill date is near. It uses
/// the `tokio_cron_scheduler` crate to create a job that runs daily at
/// 8:00 AM.
///
/// Parameters:
/// - `rx`: The shared prescription list to sweep.
/// - `bot`: A Telegram Bot instance for sending reminders.
/// - `reminder_chat_id`: The ChatId the reminders will be sent to.
///
/// The function performs the following steps:
/// 1. Creates a new JobScheduler instance.
/// 2. Defines a new asynchronous job that runs daily at 8:00 AM.
/// 3. The job calls the `check_and_notify_upcoming_refills` function.
/// 4. Adds the job to the scheduler and starts it.
///
/// Returns:
/// - `Ok(())` if the job is successfully scheduled and started.
/// - An error if any step fails.
pub async fn schedule_refill_reminders(
    rx: Arc<RxList<ApiClient>>,
    bot: Bot,
    reminder_chat_id: ChatId,
) -> Result<(), crate::Error> {
    // Create a new JobScheduler
    let sched = JobScheduler::new().await?;

    // Define the job to run daily at 8:00 AM
    let job = Job::new_async("0 0 8 * * *", move |_uuid, _l| {
        let bot = bot.clone();
        let rx = Arc::clone(&rx);
        Box::pin(async move {
            match check_and_notify_upcoming_refills(&rx, &bot, reminder_chat_id).await {
                Ok(_) => log::info!("Refill reminder sweep completed successfully"),
                Err(e) => log::error!("Error during refill reminder sweep: {}", e),
            }
        })
    })
    .map_err(|e| {
        log::error!("Failed to create job: {}", e);
        e
    })?;

    // Add the job to the scheduler
    sched.add(job).await.map_err(|e| {
        log::error!("Failed to add job to scheduler: {}", e);
        e
    })?;

    // Start the scheduler in a separate task
    tokio::spawn(async move {
        if let Err(e) = sched.start().await {
            log::error!("Scheduler error: {}", e);
        }
    });

    log::info!("Refill reminder scheduler started successfully");
    Ok(())
}

/// Sweeps the prescription list and sends reminders for near refills.
///
/// The sweep refreshes the list first so reminders reflect the backend's
/// current state; if the refresh fails the last known list is used instead.
/// The `refill` timestamps themselves come from the backend verbatim, the
/// sweep only compares them against the reminder window.
async fn check_and_notify_upcoming_refills(
    rx: &RxList<ApiClient>,
    bot: &Bot,
    chat_id: ChatId,
) -> Result<(), crate::Error> {
    if let Err(e) = rx.refresh().await {
        log::warn!("Refresh before reminder sweep failed, using the last known list: {}", e);
    }

    let snapshot = rx.snapshot();
    let due: Vec<&Prescription> = snapshot
        .iter()
        .filter(|prescription| refill_is_near(&prescription.refill))
        .collect();

    // Create a vector to store all the reminder futures
    let reminder_futures: Vec<_> = due
        .iter()
        .map(|prescription| send_refill_reminder(bot, chat_id, prescription))
        .collect();

    // Execute all reminder futures concurrently
    let results = future::join_all(reminder_futures).await;

    // Check if any reminders failed
    for result in results {
        if let Err(e) = result {
            log::error!("Failed to send reminder: {}", e);
        }
    }

    Ok(())
}

/// Whether a backend-supplied refill timestamp falls inside the reminder
/// window. Timestamps that do not parse never trigger a reminder.
fn refill_is_near(refill: &str) -> bool {
    match DateTime::parse_from_rfc3339(refill) {
        Ok(timestamp) => {
            timestamp.with_timezone(&Utc) <= Utc::now() + Duration::days(REFILL_WINDOW_DAYS)
        }
        Err(_) => false,
    }
}

/// Sends a reminder about one upcoming refill to the specified chat.
///
/// The message carries the prescription's name, its refill date, and the
/// remaining dose count, with Markdown special characters escaped.
async fn send_refill_reminder(
    bot: &Bot,
    chat_id: ChatId,
    prescription: &Prescription,
) -> Result<(), teloxide::RequestError> {
    let escaped_name = escape_markdown(&prescription.name);
    let formatted_date = escape_markdown(&format_timestamp(&prescription.refill));
    let message = format!(
        "⚠️ *Refill Reminder*\n\n\
        *Name:* `{}`\n\
        *Refill due:* `{}`\n\
        *Doses left:* `{}`\n\
        Please arrange the refill in time\\.",
        escaped_name,
        formatted_date,
        escape_markdown(&format!("{:.2}", prescription.count)),
    );

    bot.send_message(chat_id, message)
        .parse_mode(teloxide::types::ParseMode::MarkdownV2)
        .await?;

    Ok(())
}
