use teloxide::{prelude::*, types::Message};

use crate::api::models::Prescription;
use crate::sync::SharedRxList;
use crate::utils::format_timestamp;
use crate::{Error, I18n, MyDialogue};

/// Renders the current prescription list to the chat.
///
/// This reads the synchronizer's current snapshot and formats one block per
/// record, with the fields in their declared order: name, count, refill,
/// rate, quantity, updated. No network traffic happens here; the snapshot
/// is whatever the last successful operation produced.
///
/// # Arguments
///
/// * `bot` - The Bot instance used to send the reply.
/// * `msg` - The message that asked for the list.
/// * `rx` - The shared prescription list.
/// * `i18n` - The internationalization (i18n) instance for translations.
pub async fn list_prescriptions(
    bot: Bot,
    msg: Message,
    rx: SharedRxList,
    i18n: I18n,
) -> ResponseResult<()> {
    log::info!("Listing prescriptions");
    let lang = language_of(&msg);
    let snapshot = rx.snapshot();

    bot.send_message(msg.chat.id, render_list(&snapshot, &lang, &i18n))
        .await?;

    Ok(())
}

/// Re-derives the list from the backend, then renders the result.
///
/// A failed refresh leaves the previous list in place, so the reply in that
/// case reports the failure instead of pretending the list changed.
pub async fn refresh_prescriptions(
    bot: Bot,
    msg: Message,
    rx: SharedRxList,
    i18n: I18n,
) -> ResponseResult<()> {
    log::info!("Refreshing prescriptions");
    let lang = language_of(&msg);

    match rx.refresh().await {
        Ok(records) => {
            bot.send_message(msg.chat.id, render_list(&records, &lang, &i18n))
                .await?;
        }
        Err(e) => {
            log::warn!("Refresh failed: {}", e);
            bot.send_message(
                msg.chat.id,
                "Refresh failed; the list was left as it was. Try again later.",
            )
            .await?;
        }
    }

    Ok(())
}

/// Deletes one prescription by name and reports the outcome.
pub async fn delete_prescription(
    bot: Bot,
    msg: Message,
    rx: SharedRxList,
    name: String,
) -> ResponseResult<()> {
    log::info!("Deleting prescription {}", name);

    match rx.delete(&name).await {
        Ok(()) => {
            bot.send_message(msg.chat.id, format!("🗑 Deleted {}.", name))
                .await?;
        }
        Err(e) => {
            log::warn!("Delete of {} failed: {}", name, e);
            bot.send_message(msg.chat.id, format!("Could not delete {}: {}", name, e))
                .await?;
        }
    }

    Ok(())
}

/// Dialogue endpoint for the create form.
///
/// Expects one message of the shape `<name> <quantity> <rate>`. Anything
/// with a different number of fields re-prompts and keeps the form open.
/// Once an attempt has been made the dialogue exits whether or not the
/// backend accepted the record, so a failed create still clears the form.
///
/// # Arguments
///
/// * `bot` - The Bot instance used to send replies.
/// * `dialogue` - The dialogue holding the form state.
/// * `msg` - The user's form input.
/// * `rx` - The shared prescription list.
pub async fn create_prescription(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    rx: SharedRxList,
) -> Result<(), Error> {
    let text = msg.text().unwrap_or_default();
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 3 {
        bot.send_message(
            msg.chat.id,
            "Send the new prescription as: <name> <quantity> <rate>",
        )
        .await?;
        return Ok(());
    }
    let (name, quantity, rate) = (fields[0], fields[1], fields[2]);

    match rx.create(name, quantity, rate).await {
        Ok(created) => {
            log::info!("Created prescription {}", created.name);
            bot.send_message(
                msg.chat.id,
                format!(
                    "💊 Added {} (quantity {}, rate {}).",
                    created.name, created.quantity, created.rate
                ),
            )
            .await?;
        }
        Err(e) => {
            log::warn!("Create of {} failed: {}", name, e);
            bot.send_message(msg.chat.id, format!("Could not add {}: {}", name, e))
                .await?;
        }
    }

    // The form closes on both outcomes.
    dialogue.exit().await?;
    Ok(())
}

/// Dialogue endpoint for the edit form.
///
/// Expects one message of the shape `<quantity> <rate>` where `-` leaves a
/// field unchanged. With both fields left unchanged nothing is sent to the
/// backend at all. The dialogue exits once an attempt has settled.
pub async fn edit_prescription(
    bot: Bot,
    dialogue: MyDialogue,
    name: String,
    msg: Message,
    rx: SharedRxList,
) -> Result<(), Error> {
    let text = msg.text().unwrap_or_default();
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 2 {
        bot.send_message(
            msg.chat.id,
            "Send the changes as: <quantity> <rate>, with - for a field to keep",
        )
        .await?;
        return Ok(());
    }
    let quantity = if fields[0] == "-" { "" } else { fields[0] };
    let rate = if fields[1] == "-" { "" } else { fields[1] };

    match rx.update(&name, quantity, rate).await {
        Ok(Some(updated)) => {
            log::info!("Updated prescription {}", updated.name);
            bot.send_message(
                msg.chat.id,
                format!(
                    "✏️ Updated {} (quantity {}, rate {}).",
                    updated.name, updated.quantity, updated.rate
                ),
            )
            .await?;
        }
        Ok(None) => {
            bot.send_message(msg.chat.id, "Nothing to change; both fields were kept.")
                .await?;
        }
        Err(e) => {
            log::warn!("Update of {} failed: {}", name, e);
            bot.send_message(msg.chat.id, format!("Could not update {}: {}", name, e))
                .await?;
        }
    }

    dialogue.exit().await?;
    Ok(())
}

fn language_of(msg: &Message) -> String {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.clone())
        .unwrap_or_else(|| "en".to_string())
}

fn render_list(records: &[Prescription], lang: &str, i18n: &I18n) -> String {
    if records.is_empty() {
        return i18n.get(lang, "no_prescriptions");
    }

    let body = records
        .iter()
        .map(render_prescription)
        .collect::<Vec<String>>()
        .join("\n\n");

    format!("{}\n\n{}", i18n.get(lang, "list_header"), body)
}

fn render_prescription(rx: &Prescription) -> String {
    format!(
        "💊 *{}*\n   Count: {:.2}\n   Refill: {}\n   Rate: {}\n   Quantity: {}\n   Updated: {}",
        rx.name,
        rx.count,
        format_timestamp(&rx.refill),
        rx.rate,
        rx.quantity,
        format_timestamp(&rx.updated),
    )
}
