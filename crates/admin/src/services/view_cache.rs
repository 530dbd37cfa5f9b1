//! Cached household views.
//!
//! The detail page and the list are cached for a short time and invalidated
//! by every write that changes what they show. Entries remember the local
//! date they were built on; upcoming flags change at midnight, so an entry
//! from another day is a miss.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;

use foodbank_core::HouseholdId;

use crate::models::{HouseholdDetail, HouseholdSummary};

/// Values stored in the view cache.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Detail(NaiveDate, Arc<HouseholdDetail>),
    List(NaiveDate, Arc<Vec<HouseholdSummary>>),
}

/// Short-lived cache for household pages.
#[derive(Clone)]
pub struct ViewCache {
    cache: Cache<String, CacheValue>,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

fn detail_key(id: HouseholdId) -> String {
    format!("household:{id}")
}

fn list_key(include_anonymized: bool) -> String {
    format!("households:anonymized={include_anonymized}")
}

impl ViewCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1000).time_to_live(ttl).build(),
        }
    }

    pub async fn detail(&self, id: HouseholdId, today: NaiveDate) -> Option<Arc<HouseholdDetail>> {
        match self.cache.get(&detail_key(id)).await {
            Some(CacheValue::Detail(day, detail)) if day == today => Some(detail),
            _ => None,
        }
    }

    pub async fn put_detail(&self, id: HouseholdId, today: NaiveDate, detail: Arc<HouseholdDetail>) {
        self.cache
            .insert(detail_key(id), CacheValue::Detail(today, detail))
            .await;
    }

    pub async fn list(
        &self,
        include_anonymized: bool,
        today: NaiveDate,
    ) -> Option<Arc<Vec<HouseholdSummary>>> {
        match self.cache.get(&list_key(include_anonymized)).await {
            Some(CacheValue::List(day, list)) if day == today => Some(list),
            _ => None,
        }
    }

    pub async fn put_list(
        &self,
        include_anonymized: bool,
        today: NaiveDate,
        list: Arc<Vec<HouseholdSummary>>,
    ) {
        self.cache
            .insert(list_key(include_anonymized), CacheValue::List(today, list))
            .await;
    }

    /// Drop the household's detail view and both list views.
    pub async fn invalidate_household(&self, id: HouseholdId) {
        self.cache.invalidate(&detail_key(id)).await;
        self.invalidate_lists().await;
    }

    pub async fn invalidate_lists(&self) {
        self.cache.invalidate(&list_key(false)).await;
        self.cache.invalidate(&list_key(true)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn summary(id: HouseholdId) -> HouseholdSummary {
        HouseholdSummary {
            id,
            first_name: "Anna".to_string(),
            last_name: "Andersson".to_string(),
            phone_number: "+46701234567".to_string(),
            postal_code: "12345".to_string(),
            created_at: Utc::now(),
            anonymized_at: None,
            next_pickup: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_invalidate_household_drops_lists() {
        let cache = ViewCache::default();
        let id = HouseholdId::generate();
        cache.put_list(false, day(19), Arc::new(vec![summary(id)])).await;
        cache.put_list(true, day(19), Arc::new(vec![summary(id)])).await;
        assert!(cache.list(false, day(19)).await.is_some());

        cache.invalidate_household(id).await;
        assert!(cache.list(false, day(19)).await.is_none());
        assert!(cache.list(true, day(19)).await.is_none());
    }

    #[tokio::test]
    async fn test_list_from_yesterday_is_a_miss() {
        let cache = ViewCache::default();
        let id = HouseholdId::generate();
        cache.put_list(false, day(19), Arc::new(vec![summary(id)])).await;

        assert!(cache.list(false, day(20)).await.is_none());
        assert!(cache.list(false, day(19)).await.is_some());
    }

    #[tokio::test]
    async fn test_detail_miss_for_unknown_household() {
        let cache = ViewCache::default();
        assert!(cache.detail(HouseholdId::generate(), day(19)).await.is_none());
    }
}
