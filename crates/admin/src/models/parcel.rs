//! Food parcel models.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use foodbank_core::{HouseholdId, ParcelId, PickupLocationId, is_upcoming};

/// A scheduled pickup for a household.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodParcel {
    pub id: ParcelId,
    pub household_id: HouseholdId,
    pub pickup_location_id: PickupLocationId,
    pub earliest_pickup_time: DateTime<Utc>,
    pub latest_pickup_time: DateTime<Utc>,
    pub is_picked_up: bool,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub picked_up_by: Option<String>,
    pub no_show_at: Option<DateTime<Utc>>,
    pub no_show_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Where a parcel stands from the point of view of staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelState {
    Cancelled,
    PickedUp,
    NoShow,
    /// Pickup date is today or later.
    Upcoming,
    /// Pickup date has passed without an outcome being recorded.
    Unresolved,
}

impl FoodParcel {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether a pickup or no-show has been recorded.
    #[must_use]
    pub const fn has_outcome(&self) -> bool {
        self.is_picked_up || self.no_show_at.is_some()
    }

    #[must_use]
    pub fn is_upcoming<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        is_upcoming(self.earliest_pickup_time, now)
    }

    #[must_use]
    pub fn state<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ParcelState {
        if self.is_cancelled() {
            ParcelState::Cancelled
        } else if self.is_picked_up {
            ParcelState::PickedUp
        } else if self.no_show_at.is_some() {
            ParcelState::NoShow
        } else if self.is_upcoming(now) {
            ParcelState::Upcoming
        } else {
            ParcelState::Unresolved
        }
    }
}

/// A parcel as listed on the household page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelView {
    #[serde(flatten)]
    pub parcel: FoodParcel,
    pub location_name: String,
    pub is_upcoming: bool,
    pub state: ParcelState,
}

impl ParcelView {
    #[must_use]
    pub fn new<Tz: TimeZone>(parcel: FoodParcel, location_name: String, now: &DateTime<Tz>) -> Self {
        Self {
            is_upcoming: parcel.is_upcoming(now),
            state: parcel.state(now),
            parcel,
            location_name,
        }
    }
}

/// Request body for scheduling a parcel.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleParcelInput {
    pub pickup_location_id: PickupLocationId,
    pub earliest_pickup_time: DateTime<Utc>,
    pub latest_pickup_time: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn parcel(earliest: &str) -> FoodParcel {
        let earliest = at(earliest);
        FoodParcel {
            id: ParcelId::generate(),
            household_id: HouseholdId::generate(),
            pickup_location_id: PickupLocationId::generate(),
            earliest_pickup_time: earliest,
            latest_pickup_time: earliest + chrono::Duration::minutes(30),
            is_picked_up: false,
            picked_up_at: None,
            picked_up_by: None,
            no_show_at: None,
            no_show_by: None,
            deleted_at: None,
            deleted_by: None,
            created_by: None,
            created_at: earliest - chrono::Duration::days(7),
        }
    }

    #[test]
    fn test_morning_parcel_is_upcoming_in_the_afternoon() {
        let now = at("2026-10-19T15:00:00Z");
        let p = parcel("2026-10-19T09:00:00Z");
        assert!(p.is_upcoming(&now));
        assert_eq!(p.state(&now), ParcelState::Upcoming);
    }

    #[test]
    fn test_state_precedence() {
        let now = at("2026-10-19T15:00:00Z");

        let mut p = parcel("2026-10-18T09:00:00Z");
        assert_eq!(p.state(&now), ParcelState::Unresolved);

        p.no_show_at = Some(now);
        assert_eq!(p.state(&now), ParcelState::NoShow);

        p.deleted_at = Some(now);
        assert_eq!(p.state(&now), ParcelState::Cancelled);
    }

    #[test]
    fn test_view_flattens_parcel_fields() {
        let now = at("2026-10-19T15:00:00Z");
        let view = ParcelView::new(parcel("2026-10-20T09:00:00Z"), "Centrum".to_string(), &now);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["location_name"], "Centrum");
        assert_eq!(json["is_upcoming"], true);
        assert_eq!(json["state"], "upcoming");
        assert!(json.get("earliest_pickup_time").is_some());
    }
}
