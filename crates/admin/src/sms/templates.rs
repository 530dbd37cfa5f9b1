//! SMS texts per intent and locale.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};

use foodbank_core::{Locale, SmsIntent};

/// Values substituted into a message.
#[derive(Debug, Clone)]
pub struct SmsContext<'a> {
    pub first_name: &'a str,
    pub location_name: Option<&'a str>,
    pub pickup_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Render the text for `intent` in the household's language.
///
/// Times are shown in `tz`, the organization's operating zone.
#[must_use]
pub fn render<Tz>(intent: SmsIntent, locale: Locale, ctx: &SmsContext<'_>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let name = ctx.first_name;
    let location = ctx.location_name.unwrap_or_default();
    let (date, start, end) = ctx.pickup_window.map_or_else(
        || (String::new(), String::new(), String::new()),
        |(earliest, latest)| {
            let earliest = earliest.with_timezone(tz);
            let latest = latest.with_timezone(tz);
            (
                earliest.format("%Y-%m-%d").to_string(),
                earliest.format("%H:%M").to_string(),
                latest.format("%H:%M").to_string(),
            )
        },
    );

    match (intent, locale) {
        (SmsIntent::PickupReminder, Locale::Sv) => format!(
            "Hej {name}! Påminnelse: ditt matpaket kan hämtas {date} mellan {start} och {end} på {location}."
        ),
        (SmsIntent::PickupReminder, Locale::En) => format!(
            "Hi {name}! Reminder: your food parcel can be collected on {date} between {start} and {end} at {location}."
        ),
        (SmsIntent::Enrolment, Locale::Sv) => format!(
            "Hej {name}! Du är nu registrerad hos matbanken. Vi skickar ett SMS inför varje utlämning."
        ),
        (SmsIntent::Enrolment, Locale::En) => format!(
            "Hi {name}! You are now registered with the food bank. We will text you before each pickup."
        ),
        (SmsIntent::ParcelCancelled, Locale::Sv) => format!(
            "Hej {name}! Din hämtning {date} kl {start} på {location} är inställd."
        ),
        (SmsIntent::ParcelCancelled, Locale::En) => format!(
            "Hi {name}! Your pickup on {date} at {start} at {location} has been cancelled."
        ),
        (SmsIntent::ParcelUpdated, Locale::Sv) => format!(
            "Hej {name}! Din hämtning är flyttad till {date} mellan {start} och {end} på {location}."
        ),
        (SmsIntent::ParcelUpdated, Locale::En) => format!(
            "Hi {name}! Your pickup has moved to {date} between {start} and {end} at {location}."
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_reminder_uses_local_time() {
        let ctx = SmsContext {
            first_name: "Anna",
            location_name: Some("Centrum"),
            pickup_window: Some((at("2026-10-20T08:00:00Z"), at("2026-10-20T09:30:00Z"))),
        };
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let text = render(SmsIntent::PickupReminder, Locale::Sv, &ctx, &tz);
        assert_eq!(
            text,
            "Hej Anna! Påminnelse: ditt matpaket kan hämtas 2026-10-20 mellan 10:00 och 11:30 på Centrum."
        );
    }

    #[test]
    fn test_english_enrolment() {
        let ctx = SmsContext {
            first_name: "Sam",
            location_name: None,
            pickup_window: None,
        };
        let text = render(SmsIntent::Enrolment, Locale::En, &ctx, &Utc);
        assert!(text.starts_with("Hi Sam!"));
    }
}
