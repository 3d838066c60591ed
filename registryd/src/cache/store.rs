use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use shared::types::Service;

/// Result of recording a discovery in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Empty address or name; nothing was stored
    Rejected,
    /// First time this address was seen
    Discovered,
    /// Known address now advertising a different name
    Renamed { previous: String },
    /// Known address, same name; only the expiry moved
    Refreshed,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    expires_at: Instant,
}

/// In-memory service table keyed by advertised address.
///
/// Every operation takes the current instant from the caller so that expiry
/// is fully determined by the inputs.
pub struct ServiceStore {
    entries: HashMap<String, Entry>,
    ttl: Duration,
    next_sweep: Instant,
}

impl ServiceStore {
    pub fn new(ttl: Duration, now: Instant) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            next_sweep: now + ttl,
        }
    }

    /// Insert or refresh the service advertised at `address`.
    /// Runs a sweep first when the amortized sweep is due.
    pub fn upsert(&mut self, address: &str, name: &str, now: Instant) -> UpsertOutcome {
        if address.is_empty() || name.is_empty() {
            return UpsertOutcome::Rejected;
        }

        if now >= self.next_sweep {
            self.sweep(now);
        }

        let expires_at = now + self.ttl;
        match self.entries.get_mut(address) {
            Some(entry) if entry.name == name => {
                entry.expires_at = expires_at;
                UpsertOutcome::Refreshed
            }
            Some(entry) => {
                let previous = std::mem::replace(&mut entry.name, name.to_string());
                entry.expires_at = expires_at;
                UpsertOutcome::Renamed { previous }
            }
            None => {
                self.entries.insert(
                    address.to_string(),
                    Entry {
                        name: name.to_string(),
                        expires_at,
                    },
                );
                UpsertOutcome::Discovered
            }
        }
    }

    /// Remove every entry whose expiry is at or before `now`.
    /// Returns the number of entries removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.next_sweep = now + self.ttl;
        before - self.entries.len()
    }

    /// Sorted copy of all live services. Expired entries are swept first.
    pub fn snapshot(&mut self, now: Instant) -> Vec<Service> {
        self.sweep(now);

        let mut services: Vec<Service> = self
            .entries
            .iter()
            .map(|(address, entry)| Service::new(entry.name.clone(), address.clone()))
            .collect();
        // Address breaks name ties so equal sets always serialize identically
        services.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.address.cmp(&b.address)));
        services
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
