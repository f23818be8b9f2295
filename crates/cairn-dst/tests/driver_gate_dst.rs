//! DST tests for the capability driver gate
//!
//! Feeds seeded random platform versions through both gate policies and
//! checks the state machine against a plain model.

use cairn_core::GatePolicy;
use cairn_dst::DeterministicRng;
use cairn_operator::{evaluate, DriverGate, GateState, PlatformVersion};

const MIN: PlatformVersion = PlatformVersion {
    major: 1,
    minor: 13,
};

fn random_version(rng: &DeterministicRng) -> PlatformVersion {
    PlatformVersion::new(rng.next_range(0, 3) as u32, rng.next_range(0, 30) as u32)
}

#[test]
fn test_sticky_gate_matches_model() {
    let rng = DeterministicRng::from_env_or_random();
    for _ in 0..200 {
        let gate = DriverGate::new(GatePolicy::Sticky, MIN);
        let mut ever_unsupported = false;

        for _ in 0..20 {
            let version = random_version(&rng);
            ever_unsupported |= !evaluate(version.major, version.minor, MIN.major, MIN.minor);

            let expected = if ever_unsupported {
                GateState::Closed
            } else {
                GateState::Open
            };
            assert_eq!(gate.check(version), expected, "seed {}", rng.seed());
            assert_eq!(gate.rbd_enabled(), expected == GateState::Open);
        }
    }
}

#[test]
fn test_reevaluating_gate_tracks_latest_version() {
    let rng = DeterministicRng::from_env_or_random();
    let gate = DriverGate::new(GatePolicy::Reevaluate, MIN);

    for _ in 0..2000 {
        let version = random_version(&rng);
        let expected = if version >= MIN {
            GateState::Open
        } else {
            GateState::Closed
        };
        assert_eq!(gate.check(version), expected, "seed {}", rng.seed());
        assert_eq!(gate.state(), expected);
    }
}
