use chrono::{DateTime, Duration, Utc};

use super::notification_models::{Notification, Repeat};

/// When the occurrence after `notification` is due.
///
/// Always offset from the nominal `scheduled_time`, never from the moment of
/// dispatch, so late deliveries do not drift the series.
pub fn next_occurrence(notification: &Notification) -> Option<DateTime<Utc>> {
    let step = match notification.repeat {
        Repeat::None => return None,
        Repeat::Daily => Duration::days(1),
        Repeat::Weekly => Duration::weeks(1),
    };

    notification.scheduled_time.checked_add_signed(step)
}
