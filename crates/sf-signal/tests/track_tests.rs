//! Track storage integration tests
//!
//! - Stripe layout stays ordered and gap-free under random edits
//! - Content matches a flat reference model
//! - Delete cases on stripe boundaries

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use sf_core::{Sample, SampleRange};
use sf_signal::{STRIPE_LENGTH_MAXIMUM, Signal, SignalEvent, Track};

const SEEDS: [u64; 4] = [1, 7, 42, 20240611];
const OPERATIONS: usize = 300;

fn random_block(rng: &mut ChaCha8Rng, max: usize) -> Vec<Sample> {
    let len = rng.random_range(0..=max);
    (0..len).map(|_| rng.random_range(-1000..1000)).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RANDOMIZED EDITS AGAINST A REFERENCE MODEL
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_random_edits_keep_stripe_invariants() {
    for seed in SEEDS {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let track = Track::new();
        let mut model: Vec<Sample> = Vec::new();

        for step in 0..OPERATIONS {
            let len = model.len();
            match rng.random_range(0..5) {
                0 => {
                    let block = random_block(&mut rng, 5000);
                    track.append(&block).unwrap();
                    model.extend_from_slice(&block);
                }
                1 => {
                    let offset = rng.random_range(0..=len);
                    let block = random_block(&mut rng, 5000);
                    track.insert(offset as u64, &block).unwrap();
                    model.splice(offset..offset, block);
                }
                2 => {
                    let offset = rng.random_range(0..=len);
                    let count = rng.random_range(0..=(len - offset));
                    track.delete_range(offset as u64, count as u64).unwrap();
                    model.drain(offset..offset + count);
                }
                3 => {
                    let offset = rng.random_range(0..=len);
                    let block = random_block(&mut rng, len - offset);
                    track.overwrite(offset as u64, &block).unwrap();
                    model[offset..offset + block.len()].copy_from_slice(&block);
                }
                _ => {
                    let offset = rng.random_range(0..=len);
                    let count = rng.random_range(0..3000);
                    track.insert_space(offset as u64, count as u64).unwrap();
                    model.splice(offset..offset, std::iter::repeat_n(0, count));
                }
            }

            assert!(track.check_invariants(), "seed {} step {}", seed, step);
            assert_eq!(track.length(), model.len() as u64, "seed {} step {}", seed, step);
        }
        assert_eq!(track.read(0, model.len() as u64).unwrap(), model, "seed {}", seed);
    }
}

#[test]
fn test_out_of_range_edits_leave_track_untouched() {
    let track = Track::new();
    track.append(&[1, 2, 3, 4, 5]).unwrap();
    let before = track.stripe_layout();

    assert!(track.delete_range(3, 3).is_err());
    assert!(track.insert(6, &[1]).is_err());
    assert!(track.overwrite(4, &[1, 1]).is_err());
    assert!(track.read(0, 6).is_err());

    assert_eq!(track.stripe_layout(), before);
    assert_eq!(track.read(0, 5).unwrap(), vec![1, 2, 3, 4, 5]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRIPE BOUNDARIES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_delete_exactly_one_stripe() {
    let track = Track::new();
    track.append_stripe(32768).unwrap();
    track.append_stripe(32768).unwrap();
    track.append_stripe(32768).unwrap();
    track.delete_range(32768, 32768).unwrap();
    assert_eq!(track.length(), 65536);
    assert_eq!(
        track.stripe_layout(),
        vec![SampleRange::new(0, 32768), SampleRange::new(32768, 32768)]
    );
}

#[test]
fn test_delete_everything_leaves_no_stripes() {
    let track = Track::new();
    track.append_stripe(100).unwrap();
    track.append_stripe(200).unwrap();
    track.delete_range(0, 300).unwrap();
    assert_eq!(track.length(), 0);
    assert_eq!(track.stripe_count(), 0);
    assert!(track.check_invariants());
}

#[test]
fn test_append_beyond_maximum_creates_new_stripes() {
    let track = Track::new();
    track.append_stripe(STRIPE_LENGTH_MAXIMUM as u64 - 10).unwrap();
    track.append(&vec![3; 100]).unwrap();
    assert_eq!(track.length(), STRIPE_LENGTH_MAXIMUM as u64 + 90);
    assert!(track.stripe_count() >= 2);
    assert!(track.check_invariants());
    assert_eq!(track.read(STRIPE_LENGTH_MAXIMUM as u64 - 10, 100).unwrap(), vec![3; 100]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNAL LEVEL
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_delete_range_emits_single_event() {
    let signal = Signal::new();
    let track = signal.append_track(0).unwrap();
    track.append_stripe(1000).unwrap();
    track.append_stripe(1000).unwrap();
    track.append_stripe(1000).unwrap();

    let events = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&events);
    signal.set_event_sink(std::sync::Arc::new(move |e: &SignalEvent| sink.lock().push(e.clone())));

    signal.delete_range(0, 500, 2000).unwrap();
    assert_eq!(
        *events.lock(),
        vec![SignalEvent::SamplesDeleted { track: 0, range: SampleRange::new(500, 2000) }]
    );
}
