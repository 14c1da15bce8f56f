//! Per-zone manual-control windows.
//!
//! A zone is either automatic or holds a single manual window. Windows are
//! only ever extended by new manual activity; they end on an explicit clear
//! or when a tick observes `expires_at <= now`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::{
    persist::{ManualStateKind, PersistedZoneTimer},
    types::{ManualControlState, Notification, ZoneId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ManualWindow {
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTransition {
    Started {
        zone_id: ZoneId,
        expires_at: DateTime<Utc>,
    },
    Extended {
        zone_id: ZoneId,
        expires_at: DateTime<Utc>,
    },
    Expired {
        zone_id: ZoneId,
    },
    Cleared {
        zone_id: ZoneId,
    },
}

impl TimerTransition {
    pub fn zone_id(&self) -> &str {
        match self {
            Self::Started { zone_id, .. }
            | Self::Extended { zone_id, .. }
            | Self::Expired { zone_id }
            | Self::Cleared { zone_id } => zone_id,
        }
    }

    pub fn into_notification(self) -> Notification {
        match self {
            Self::Started {
                zone_id,
                expires_at,
            } => Notification::ManualOverrideStarted {
                zone_id,
                expires_at,
            },
            Self::Extended {
                zone_id,
                expires_at,
            } => Notification::ManualOverrideExtended {
                zone_id,
                expires_at,
            },
            Self::Expired { zone_id } => Notification::ManualOverrideExpired { zone_id },
            Self::Cleared { zone_id } => Notification::ManualOverrideCleared { zone_id },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualTimers {
    windows: BTreeMap<ZoneId, ManualWindow>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, zone_id: &str) -> ManualControlState {
        match self.windows.get(zone_id) {
            Some(window) => ManualControlState::Manual {
                started_at: window.started_at,
                expires_at: window.expires_at,
            },
            None => ManualControlState::Automatic,
        }
    }

    pub fn is_manual(&self, zone_id: &str) -> bool {
        self.windows.contains_key(zone_id)
    }

    pub fn active_count(&self) -> usize {
        self.windows.len()
    }

    /// Starts a window, or pushes an existing one out to `now + duration`.
    /// Returns `None` when the existing window already runs at least as long.
    pub fn manual_change_detected(
        &mut self,
        zone_id: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Option<TimerTransition> {
        let expires_at = now + duration.max(Duration::zero());

        match self.windows.get_mut(zone_id) {
            Some(window) if window.expires_at > now => {
                if expires_at <= window.expires_at {
                    return None;
                }
                window.expires_at = expires_at;
                Some(TimerTransition::Extended {
                    zone_id: zone_id.to_string(),
                    expires_at,
                })
            }
            _ => {
                self.windows.insert(
                    zone_id.to_string(),
                    ManualWindow {
                        started_at: now,
                        expires_at,
                    },
                );
                Some(TimerTransition::Started {
                    zone_id: zone_id.to_string(),
                    expires_at,
                })
            }
        }
    }

    /// Idempotent: clearing an automatic zone returns `None`.
    pub fn clear(&mut self, zone_id: &str) -> Option<TimerTransition> {
        self.windows
            .remove(zone_id)
            .map(|_| TimerTransition::Cleared {
                zone_id: zone_id.to_string(),
            })
    }

    pub fn clear_all(&mut self) -> Vec<TimerTransition> {
        std::mem::take(&mut self.windows)
            .into_keys()
            .map(|zone_id| TimerTransition::Cleared { zone_id })
            .collect()
    }

    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<TimerTransition> {
        let due: Vec<ZoneId> = self
            .windows
            .iter()
            .filter(|(_, window)| window.expires_at <= now)
            .map(|(zone_id, _)| zone_id.clone())
            .collect();

        due.into_iter()
            .map(|zone_id| {
                self.windows.remove(&zone_id);
                TimerTransition::Expired { zone_id }
            })
            .collect()
    }

    pub fn retain_zones<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.windows.retain(|zone_id, _| keep(zone_id));
    }

    pub fn snapshot<'a, I>(&self, zone_ids: I) -> Vec<PersistedZoneTimer>
    where
        I: IntoIterator<Item = &'a str>,
    {
        zone_ids
            .into_iter()
            .map(|zone_id| match self.windows.get(zone_id) {
                Some(window) => PersistedZoneTimer {
                    zone_id: zone_id.to_string(),
                    manual_state: ManualStateKind::Manual,
                    started_at: Some(window.started_at),
                    expires_at: Some(window.expires_at),
                },
                None => PersistedZoneTimer::automatic(zone_id),
            })
            .collect()
    }

    /// Replaces all windows from persisted entries. Entries that have already
    /// elapsed come back automatic and produce no transitions. Returns the
    /// number of windows restored.
    pub fn restore(&mut self, entries: &[PersistedZoneTimer], now: DateTime<Utc>) -> usize {
        self.windows.clear();

        for entry in entries {
            if entry.manual_state != ManualStateKind::Manual {
                continue;
            }
            let Some(expires_at) = entry.expires_at.filter(|expires_at| *expires_at > now) else {
                continue;
            };
            let started_at = entry
                .started_at
                .filter(|started_at| *started_at <= expires_at)
                .unwrap_or(now);

            self.windows.insert(
                entry.zone_id.clone(),
                ManualWindow {
                    started_at,
                    expires_at,
                },
            );
        }

        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 11, 3, hour, minute, 0).unwrap()
    }

    #[test]
    fn first_change_starts_a_window() {
        let mut timers = ManualTimers::new();
        let transition = timers.manual_change_detected("kitchen_island", Duration::minutes(30), at(18, 0));

        assert_eq!(
            transition,
            Some(TimerTransition::Started {
                zone_id: "kitchen_island".to_string(),
                expires_at: at(18, 30),
            })
        );
        assert_eq!(
            timers.state("kitchen_island"),
            ManualControlState::Manual {
                started_at: at(18, 0),
                expires_at: at(18, 30),
            }
        );
    }

    #[test]
    fn repeated_changes_never_shorten_the_window() {
        let mut timers = ManualTimers::new();
        timers.manual_change_detected("main_living", Duration::minutes(45), at(18, 0));

        assert_eq!(
            timers.manual_change_detected("main_living", Duration::minutes(30), at(18, 5)),
            None
        );
        assert_eq!(timers.state("main_living").expires_at(), Some(at(18, 45)));

        let extended = timers.manual_change_detected("main_living", Duration::minutes(30), at(18, 20));
        assert_eq!(
            extended,
            Some(TimerTransition::Extended {
                zone_id: "main_living".to_string(),
                expires_at: at(18, 50),
            })
        );
        // Start time is kept across extensions.
        assert_eq!(
            timers.state("main_living"),
            ManualControlState::Manual {
                started_at: at(18, 0),
                expires_at: at(18, 50),
            }
        );
    }

    #[test]
    fn expires_on_the_exact_deadline() {
        let mut timers = ManualTimers::new();
        timers.manual_change_detected("bedroom_primary", Duration::minutes(30), at(21, 0));

        assert!(timers.expire_due(at(21, 29)).is_empty());
        assert_eq!(
            timers.expire_due(at(21, 30)),
            vec![TimerTransition::Expired {
                zone_id: "bedroom_primary".to_string()
            }]
        );
        assert_eq!(timers.state("bedroom_primary"), ManualControlState::Automatic);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut timers = ManualTimers::new();
        timers.manual_change_detected("accent_spots", Duration::minutes(30), at(19, 0));

        assert!(timers.clear("accent_spots").is_some());
        assert_eq!(timers.clear("accent_spots"), None);
        assert_eq!(timers.clear("never_manual"), None);
    }

    #[test]
    fn clear_all_reports_each_zone_once() {
        let mut timers = ManualTimers::new();
        timers.manual_change_detected("a", Duration::minutes(10), at(8, 0));
        timers.manual_change_detected("b", Duration::minutes(10), at(8, 0));

        let cleared: Vec<String> = timers
            .clear_all()
            .iter()
            .map(|transition| transition.zone_id().to_string())
            .collect();

        assert_eq!(cleared, vec!["a".to_string(), "b".to_string()]);
        assert!(timers.clear_all().is_empty());
    }

    #[test]
    fn restore_normalizes_stale_windows() {
        let now = at(12, 0);
        let entries = vec![
            PersistedZoneTimer {
                zone_id: "main_living".to_string(),
                manual_state: ManualStateKind::Manual,
                started_at: Some(at(11, 20)),
                expires_at: Some(at(11, 50)),
            },
            PersistedZoneTimer {
                zone_id: "kitchen_island".to_string(),
                manual_state: ManualStateKind::Manual,
                started_at: Some(at(11, 45)),
                expires_at: Some(at(12, 15)),
            },
            PersistedZoneTimer {
                zone_id: "accent_spots".to_string(),
                manual_state: ManualStateKind::Manual,
                started_at: None,
                expires_at: None,
            },
            PersistedZoneTimer::automatic("bedroom_primary"),
        ];

        let mut timers = ManualTimers::new();
        assert_eq!(timers.restore(&entries, now), 1);

        assert_eq!(timers.state("main_living"), ManualControlState::Automatic);
        assert_eq!(timers.state("accent_spots"), ManualControlState::Automatic);
        assert_eq!(timers.state("kitchen_island").expires_at(), Some(at(12, 15)));
        // Nothing left to expire or replay.
        assert!(timers.expire_due(now).is_empty());
    }

    #[test]
    fn snapshot_lists_every_requested_zone() {
        let mut timers = ManualTimers::new();
        timers.manual_change_detected("a", Duration::minutes(10), at(8, 0));

        let snapshot = timers.snapshot(["a", "b"]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].manual_state, ManualStateKind::Manual);
        assert_eq!(snapshot[0].expires_at, Some(at(8, 10)));
        assert_eq!(snapshot[1], PersistedZoneTimer::automatic("b"));
    }
}
