//! The match-and-decide core of the access loop.
//!
//! Owns the roster cache (loaded once at startup, extended only on a
//! successful registration), the matching policy, and the debounce
//! window that keeps a continuous presence from re-triggering the
//! door and the access log on every frame.

use std::time::{Duration, Instant};

use thiserror::Error;

use porteiro_core::{Matcher, NearestMatcher, Resident, Signal, Signature};
use porteiro_store::{RosterStore, StoreError};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("no face detected")]
    NoFace,
    #[error("{0} faces detected, registration requires exactly one")]
    AmbiguousFaces(usize),
    // Fail closed: a resident that did not persist is not enrolled.
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of assessing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Granted {
        resident_id: i64,
        name: String,
        distance: f64,
        /// First grant outside the debounce window: the access event was
        /// logged and the door side effect triggered.
        fresh: bool,
    },
    Denied,
}

impl Decision {
    pub fn signal(&self) -> Signal {
        match self {
            Decision::Granted { .. } => Signal::Authorized,
            Decision::Denied => Signal::Denied,
        }
    }
}

pub struct AccessController {
    store: RosterStore,
    /// Roster metadata, insertion order. Parallel to `gallery`.
    residents: Vec<Resident>,
    /// Signatures in matcher order. Parallel to `residents`.
    gallery: Vec<Signature>,
    matcher: NearestMatcher,
    debounce: Duration,
    last_granted: Option<Instant>,
}

impl AccessController {
    /// Load the roster from the store and build the in-memory cache.
    pub fn new(
        store: RosterStore,
        matcher: NearestMatcher,
        debounce: Duration,
    ) -> Result<Self, ControllerError> {
        let residents = store.all_residents()?;
        let gallery = residents.iter().map(|r| r.signature.clone()).collect();
        tracing::info!(count = residents.len(), "roster loaded");
        Ok(Self {
            store,
            residents,
            gallery,
            matcher,
            debounce,
            last_granted: None,
        })
    }

    pub fn roster_len(&self) -> usize {
        self.residents.len()
    }

    /// Decide one frame given the signatures of every detected face.
    ///
    /// The first signature that matches the roster grants access; an
    /// empty slice (no face) and an all-miss frame both come out as
    /// [`Decision::Denied`] with nothing logged. A grant within the
    /// debounce window of the previous fresh grant refreshes the signal
    /// but suppresses the event row and the door trigger.
    pub fn assess(
        &mut self,
        signatures: &[Signature],
        now: Instant,
    ) -> Result<Decision, ControllerError> {
        for probe in signatures {
            let Some(found) = self.matcher.best_match(&self.gallery, probe) else {
                continue;
            };
            let resident = &self.residents[found.index];

            let fresh = match self.last_granted {
                None => true,
                Some(t) => now.duration_since(t) > self.debounce,
            };

            if fresh {
                self.store.append_access_event(Some(resident.id), true)?;
                self.last_granted = Some(now);
                tracing::info!(
                    resident = %resident.name,
                    block = %resident.block,
                    unit = %resident.unit,
                    distance = found.distance,
                    "access granted, door released"
                );
            } else {
                tracing::debug!(
                    resident = %resident.name,
                    "repeat match inside debounce window, door trigger suppressed"
                );
            }

            return Ok(Decision::Granted {
                resident_id: resident.id,
                name: resident.name.clone(),
                distance: found.distance,
                fresh,
            });
        }

        Ok(Decision::Denied)
    }

    /// Register a new resident from a registration frame.
    ///
    /// Requires exactly one detected face. Persists first, then extends
    /// the cache, so a store failure leaves the roster exactly as it was.
    pub fn register(
        &mut self,
        signatures: &[Signature],
        name: &str,
        unit: &str,
        block: &str,
    ) -> Result<i64, RegistrationError> {
        let signature = match signatures {
            [] => return Err(RegistrationError::NoFace),
            [one] => one,
            many => return Err(RegistrationError::AmbiguousFaces(many.len())),
        };

        let id = self.store.insert_resident(name, unit, block, signature)?;

        self.residents.push(Resident {
            id,
            name: name.to_string(),
            unit: unit.to_string(),
            block: block.to_string(),
            signature: signature.clone(),
        });
        self.gallery.push(signature.clone());

        tracing::info!(resident = name, id, "resident registered");
        Ok(id)
    }

    #[cfg(test)]
    fn event_count(&self) -> i64 {
        self.store.access_event_count().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use porteiro_core::{Metric, SIGNATURE_DIM};

    fn sig(first: f64) -> Signature {
        let mut v = vec![0.0; SIGNATURE_DIM];
        v[0] = first;
        Signature::new(v).unwrap()
    }

    fn controller_with(residents: &[(&str, f64)]) -> AccessController {
        let store = RosterStore::open_in_memory().unwrap();
        for (name, first) in residents {
            store
                .insert_resident(name, "101", "B", &sig(*first))
                .unwrap();
        }
        AccessController::new(
            store,
            NearestMatcher::new(0.6, Metric::Euclidean),
            Duration::from_secs(3),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_roster_always_denied() {
        let mut c = controller_with(&[]);
        let t0 = Instant::now();
        for i in 0..10 {
            let d = c
                .assess(&[sig(0.0)], t0 + Duration::from_millis(i * 100))
                .unwrap();
            assert_eq!(d, Decision::Denied);
        }
        assert_eq!(c.event_count(), 0);
    }

    #[test]
    fn test_no_face_is_denied_without_logging() {
        let mut c = controller_with(&[("Ana", 0.0)]);
        let d = c.assess(&[], Instant::now()).unwrap();
        assert_eq!(d, Decision::Denied);
        assert_eq!(c.event_count(), 0);
    }

    #[test]
    fn test_exact_match_grants_and_logs_once() {
        let mut c = controller_with(&[("Ana", 0.0)]);
        let t0 = Instant::now();

        let d = c.assess(&[sig(0.0)], t0).unwrap();
        match d {
            Decision::Granted {
                name,
                distance,
                fresh,
                ..
            } => {
                assert_eq!(name, "Ana");
                assert_eq!(distance, 0.0);
                assert!(fresh);
            }
            other => panic!("expected grant, got {other:?}"),
        }
        assert_eq!(c.event_count(), 1);
    }

    #[test]
    fn test_debounce_suppresses_repeats_but_keeps_signal() {
        let mut c = controller_with(&[("Ana", 0.0)]);
        let t0 = Instant::now();

        assert!(matches!(
            c.assess(&[sig(0.0)], t0).unwrap(),
            Decision::Granted { fresh: true, .. }
        ));

        // 10 repeats inside the 3s window: signal stays authorized,
        // no extra event rows.
        for i in 1..=10 {
            let d = c
                .assess(&[sig(0.0)], t0 + Duration::from_millis(i * 250))
                .unwrap();
            assert_eq!(d.signal(), Signal::Authorized);
            assert!(matches!(d, Decision::Granted { fresh: false, .. }));
        }
        assert_eq!(c.event_count(), 1);
    }

    #[test]
    fn test_debounce_boundary_is_exclusive() {
        let mut c = controller_with(&[("Ana", 0.0)]);
        let t0 = Instant::now();
        c.assess(&[sig(0.0)], t0).unwrap();

        // Exactly Δ later: still suppressed (strictly-greater rule).
        let d = c.assess(&[sig(0.0)], t0 + Duration::from_secs(3)).unwrap();
        assert!(matches!(d, Decision::Granted { fresh: false, .. }));
        assert_eq!(c.event_count(), 1);

        // Past Δ: fresh again.
        let d = c
            .assess(&[sig(0.0)], t0 + Duration::from_millis(3001))
            .unwrap();
        assert!(matches!(d, Decision::Granted { fresh: true, .. }));
        assert_eq!(c.event_count(), 2);
    }

    #[test]
    fn test_debounce_window_restarts_on_fresh_grant() {
        let mut c = controller_with(&[("Ana", 0.0)]);
        let t0 = Instant::now();
        c.assess(&[sig(0.0)], t0).unwrap();
        c.assess(&[sig(0.0)], t0 + Duration::from_secs(4)).unwrap();
        // 2s after the second fresh grant: suppressed relative to it.
        let d = c.assess(&[sig(0.0)], t0 + Duration::from_secs(6)).unwrap();
        assert!(matches!(d, Decision::Granted { fresh: false, .. }));
        assert_eq!(c.event_count(), 2);
    }

    #[test]
    fn test_unknown_face_is_denied() {
        let mut c = controller_with(&[("Ana", 0.0)]);
        let d = c.assess(&[sig(5.0)], Instant::now()).unwrap();
        assert_eq!(d, Decision::Denied);
        assert_eq!(d.signal(), Signal::Denied);
        assert_eq!(c.event_count(), 0);
    }

    #[test]
    fn test_first_matching_face_of_many_decides() {
        let mut c = controller_with(&[("Ana", 0.0), ("Bruno", 2.0)]);
        // Two faces in frame: a stranger first, then Bruno.
        let d = c.assess(&[sig(9.0), sig(2.0)], Instant::now()).unwrap();
        match d {
            Decision::Granted { name, .. } => assert_eq!(name, "Bruno"),
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[test]
    fn test_register_success_extends_cache() {
        let mut c = controller_with(&[]);
        let id = c.register(&[sig(1.0)], "Carla", "303", "C").unwrap();
        assert_eq!(c.roster_len(), 1);

        // The new resident is matchable immediately, no store reload.
        let d = c.assess(&[sig(1.0)], Instant::now()).unwrap();
        match d {
            Decision::Granted {
                resident_id, name, ..
            } => {
                assert_eq!(resident_id, id);
                assert_eq!(name, "Carla");
            }
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[test]
    fn test_register_rejects_zero_faces() {
        let mut c = controller_with(&[]);
        assert!(matches!(
            c.register(&[], "Carla", "303", "C"),
            Err(RegistrationError::NoFace)
        ));
        assert_eq!(c.roster_len(), 0);
        assert!(c.store.all_residents().unwrap().is_empty());
    }

    #[test]
    fn test_register_rejects_multiple_faces() {
        let mut c = controller_with(&[]);
        assert!(matches!(
            c.register(&[sig(1.0), sig(2.0)], "Carla", "303", "C"),
            Err(RegistrationError::AmbiguousFaces(2))
        ));
        assert_eq!(c.roster_len(), 0);
        assert!(c.store.all_residents().unwrap().is_empty());
    }

    #[test]
    fn test_registered_signature_roundtrips_through_store() {
        let mut c = controller_with(&[]);
        let s = sig(0.123456789);
        c.register(&[s.clone()], "Carla", "303", "C").unwrap();

        let persisted = c.store.all_residents().unwrap();
        assert_eq!(persisted[0].signature.to_bytes(), s.to_bytes());
    }
}
