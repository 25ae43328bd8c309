//! Memory backing policy.
//!
//! Resolves the caller's [`MemoryBackingPreference`] into one of the three
//! [`MemoryBackingStrategy`] variants. Overcommit dominates deferred commit:
//! deferred commit only refines virtualized backing, so it is ignored when
//! overcommit is turned off.

use crate::types::{GuestPlatform, MemoryBackingPreference, MemoryBackingStrategy};

/// Overcommit is on unless the caller explicitly turns it off, on every
/// guest platform.
const DEFAULT_ALLOW_OVERCOMMIT: bool = true;

/// Selects the memory backing strategy for a utility VM.
///
/// Total and side-effect free: every combination of set and unset
/// preferences resolves to a strategy.
pub fn select(
    preference: MemoryBackingPreference,
    guest_platform: GuestPlatform,
) -> MemoryBackingStrategy {
    let allow_overcommit = preference
        .allow_overcommit
        .unwrap_or(DEFAULT_ALLOW_OVERCOMMIT);

    if !allow_overcommit {
        if preference.enable_deferred_commit == Some(true) {
            tracing::debug!(
                platform = %guest_platform,
                "deferred commit ignored because overcommit is disabled"
            );
        }
        return MemoryBackingStrategy::PhysicallyBacked;
    }

    if preference.enable_deferred_commit == Some(true) {
        MemoryBackingStrategy::VirtualDeferredCommit
    } else {
        MemoryBackingStrategy::VirtualOvercommit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PLATFORMS: [GuestPlatform; 2] = [GuestPlatform::Linux, GuestPlatform::Windows];
    const TRI_STATE: [Option<bool>; 3] = [None, Some(true), Some(false)];

    fn pref(allow: Option<bool>, deferred: Option<bool>) -> MemoryBackingPreference {
        MemoryBackingPreference::new(allow, deferred)
    }

    mod scenarios {
        use super::*;

        #[test]
        fn implicit_default_is_virtual() {
            for platform in PLATFORMS {
                assert_eq!(
                    select(pref(None, None), platform),
                    MemoryBackingStrategy::VirtualOvercommit
                );
            }
        }

        #[test]
        fn explicit_default_is_virtual() {
            for platform in PLATFORMS {
                assert_eq!(
                    select(pref(Some(true), Some(false)), platform),
                    MemoryBackingStrategy::VirtualOvercommit
                );
            }
        }

        #[test]
        fn overcommit_with_deferred_commit_is_virtual_deferred() {
            for platform in PLATFORMS {
                assert_eq!(
                    select(pref(Some(true), Some(true)), platform),
                    MemoryBackingStrategy::VirtualDeferredCommit
                );
            }
        }

        #[test]
        fn no_overcommit_is_physical() {
            for platform in PLATFORMS {
                assert_eq!(
                    select(pref(Some(false), Some(false)), platform),
                    MemoryBackingStrategy::PhysicallyBacked
                );
            }
        }

        #[test]
        fn no_overcommit_overrides_deferred_commit() {
            for platform in PLATFORMS {
                assert_eq!(
                    select(pref(Some(false), Some(true)), platform),
                    MemoryBackingStrategy::PhysicallyBacked
                );
            }
        }

        #[test]
        fn deferred_commit_alone_implies_overcommit() {
            assert_eq!(
                select(pref(None, Some(true)), GuestPlatform::Linux),
                MemoryBackingStrategy::VirtualDeferredCommit
            );
        }
    }

    #[test]
    fn every_combination_resolves_consistently() {
        for platform in PLATFORMS {
            for allow in TRI_STATE {
                for deferred in TRI_STATE {
                    let strategy = select(pref(allow, deferred), platform);
                    assert_eq!(
                        strategy.allows_overcommit(),
                        allow != Some(false),
                        "{allow:?}/{deferred:?} on {platform}"
                    );
                    if strategy.uses_deferred_commit() {
                        assert!(strategy.allows_overcommit());
                    }
                }
            }
        }
    }

    fn tri_state() -> impl Strategy<Value = Option<bool>> {
        prop_oneof![Just(None), any::<bool>().prop_map(Some)]
    }

    fn platform() -> impl Strategy<Value = GuestPlatform> {
        prop_oneof![Just(GuestPlatform::Linux), Just(GuestPlatform::Windows)]
    }

    proptest! {
        #[test]
        fn disabled_overcommit_dominates(deferred in tri_state(), platform in platform()) {
            prop_assert_eq!(
                select(pref(Some(false), deferred), platform),
                MemoryBackingStrategy::PhysicallyBacked
            );
        }

        #[test]
        fn deferred_commit_iff_requested_and_overcommit_allowed(
            allow in tri_state(),
            deferred in tri_state(),
            platform in platform(),
        ) {
            let strategy = select(pref(allow, deferred), platform);
            let expected = allow != Some(false) && deferred == Some(true);
            prop_assert_eq!(strategy == MemoryBackingStrategy::VirtualDeferredCommit, expected);
        }

        #[test]
        fn selection_is_deterministic(
            allow in tri_state(),
            deferred in tri_state(),
            platform in platform(),
        ) {
            let preference = pref(allow, deferred);
            prop_assert_eq!(select(preference, platform), select(preference, platform));
        }
    }
}
