//! In-memory [`ProgressStore`] for tests and local runs.
//!
//! Besides plain storage it can simulate an unavailable backend
//! ([`MemoryStore::set_unavailable`]) and hold link loads until released
//! ([`MemoryStore::pause`]), which lets tests observe a computation while
//! it is in flight.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use incentive_core::campaign::{Campaign, Link, LinkedTransaction, Transaction};
use incentive_core::store::{CampaignFilter, ProgressStore, StoreError};
use incentive_core::types::DbId;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

#[derive(Default)]
struct MemoryData {
    campaigns: BTreeMap<DbId, Campaign>,
    transactions: BTreeMap<DbId, Transaction>,
    links: Vec<Link>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
    unavailable: AtomicBool,
    gate: Arc<RwLock<()>>,
    link_loads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    /// Insert or replace a campaign definition.
    pub fn upsert_campaign(&self, campaign: Campaign) {
        self.data().campaigns.insert(campaign.id, campaign);
    }

    /// Returns `false` when the campaign does not exist.
    pub fn set_campaign_active(&self, campaign_id: DbId, is_active: bool) -> bool {
        match self.data().campaigns.get_mut(&campaign_id) {
            Some(campaign) => {
                campaign.is_active = is_active;
                true
            }
            None => false,
        }
    }

    pub fn upsert_transaction(&self, transaction: Transaction) {
        self.data().transactions.insert(transaction.id, transaction);
    }

    pub fn remove_transaction(&self, transaction_id: DbId) {
        self.data().transactions.remove(&transaction_id);
    }

    /// Link a transaction to a campaign, reactivating an existing link.
    /// Returns the link id.
    pub fn link(&self, campaign_id: DbId, transaction_id: DbId) -> DbId {
        let mut data = self.data();
        if let Some(existing) = data
            .links
            .iter_mut()
            .find(|l| l.campaign_id == campaign_id && l.transaction_id == transaction_id)
        {
            existing.is_active = true;
            existing.linked_at = Utc::now();
            return existing.id;
        }

        let id = data.links.len() as DbId + 1;
        data.links.push(Link {
            id,
            campaign_id,
            transaction_id,
            is_active: true,
            linked_at: Utc::now(),
        });
        id
    }

    /// Returns `false` when no active link matched.
    pub fn deactivate_link(&self, campaign_id: DbId, transaction_id: DbId) -> bool {
        let mut data = self.data();
        match data.links.iter_mut().find(|l| {
            l.campaign_id == campaign_id && l.transaction_id == transaction_id && l.is_active
        }) {
            Some(link) => {
                link.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Make every read fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `list_active_links` calls so far.
    pub fn link_loads(&self) -> usize {
        self.link_loads.load(Ordering::SeqCst)
    }

    /// Hold every `list_active_links` call until the guard is dropped.
    pub async fn pause(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn get_campaign(&self, id: DbId) -> Result<Option<Campaign>, StoreError> {
        self.check_available()?;
        Ok(self.data().campaigns.get(&id).cloned())
    }

    async fn list_active_links(
        &self,
        campaign_id: DbId,
    ) -> Result<Vec<LinkedTransaction>, StoreError> {
        self.link_loads.fetch_add(1, Ordering::SeqCst);
        let _open = self.gate.read().await;
        self.check_available()?;

        let data = self.data();
        Ok(data
            .links
            .iter()
            .filter(|l| l.campaign_id == campaign_id && l.is_active)
            .map(|l| LinkedTransaction {
                link: l.clone(),
                transaction: data.transactions.get(&l.transaction_id).cloned(),
            })
            .collect())
    }

    async fn campaigns_for_transaction(
        &self,
        transaction_id: DbId,
    ) -> Result<Vec<DbId>, StoreError> {
        self.check_available()?;
        let mut ids: Vec<DbId> = self
            .data()
            .links
            .iter()
            .filter(|l| l.transaction_id == transaction_id && l.is_active)
            .map(|l| l.campaign_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn list_campaign_ids(&self, filter: &CampaignFilter) -> Result<Vec<DbId>, StoreError> {
        self.check_available()?;
        Ok(self
            .data()
            .campaigns
            .values()
            .filter(|c| filter.include_inactive || c.is_active)
            .filter(|c| filter.user_id.is_none() || c.user_id == filter.user_id)
            .map(|c| c.id)
            .collect())
    }
}
