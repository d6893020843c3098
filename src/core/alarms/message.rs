use super::model::Alarm;
use crate::core::model::{duration_string, ServerTime, TimeWindow};

/// "will be up in 4:07", "is currently up for the next 12:30" or
/// "is always up".
pub fn delay_string(window: &TimeWindow, now: ServerTime) -> String {
    match window.end {
        None => "is always up".to_string(),
        Some(_) if now < window.start => {
            format!("will be up in {}", duration_string(window.start.seconds_since(now)))
        }
        Some(end) => format!("is currently up for the next {}", duration_string(end.seconds_since(now))),
    }
}

/// Expand the chat template for a fired alarm. An empty template means no
/// message.
pub fn format_alarm_message(
    format: &str,
    alarm: &Alarm,
    item_name: &str,
    location_name: Option<&str>,
    window: &TimeWindow,
    now: ServerTime,
) -> Option<String> {
    if format.trim().is_empty() {
        return None;
    }
    let message = format
        .replace("{Alarm}", &alarm.name)
        .replace("{Item}", item_name)
        .replace("{Offset}", &alarm.offset_seconds.to_string())
        .replace("{DelayString}", &delay_string(window, now))
        .replace("{Location}", location_name.unwrap_or_default());
    Some(message.trim_end().to_string())
}
