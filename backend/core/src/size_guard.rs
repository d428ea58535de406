//! Size Guard: admission check against the per-task payload ceiling.

use thiserror::Error;

/// Maximum aggregate payload size of one task, in bytes.
pub const MAX_TASK_BYTES: u64 = 2_000_000_000;

/// Why a candidate payload was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{committed} + {candidate} bytes exceeds the {limit} byte limit")]
pub struct Rejection {
    pub committed: u64,
    pub candidate: u64,
    pub limit: u64,
}

/// Outcome of [`admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject(Rejection),
}

impl Admission {
    pub fn is_accept(&self) -> bool {
        matches!(self, Admission::Accept)
    }

    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Admission::Accept => Ok(()),
            Admission::Reject(r) => Err(r),
        }
    }
}

/// Accept iff `committed + candidate <= MAX_TASK_BYTES`.
pub fn admit(committed: u64, candidate: u64) -> Admission {
    admit_within(committed, candidate, MAX_TASK_BYTES)
}

/// Same check against an explicit ceiling.
pub fn admit_within(committed: u64, candidate: u64, limit: u64) -> Admission {
    match committed.checked_add(candidate) {
        Some(total) if total <= limit => Admission::Accept,
        _ => Admission::Reject(Rejection {
            committed,
            candidate,
            limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_up_to_the_ceiling() {
        assert!(admit(0, MAX_TASK_BYTES).is_accept());
        assert!(admit(1_999_999_999, 1).is_accept());
    }

    #[test]
    fn rejects_one_byte_over() {
        assert_eq!(
            admit(1_999_999_999, 2),
            Admission::Reject(Rejection {
                committed: 1_999_999_999,
                candidate: 2,
                limit: MAX_TASK_BYTES,
            })
        );
    }

    #[test]
    fn overflow_is_a_rejection() {
        assert!(!admit(u64::MAX, 1).is_accept());
    }

    #[test]
    fn running_total_never_exceeds_ceiling() {
        // Greedy acceptance over an arbitrary size sequence.
        let sizes = [700_000_000u64, 900_000_000, 500_000_000, 399_999_999, 1, 1, 0, 2];
        let mut committed = 0u64;
        for size in sizes {
            if admit(committed, size).is_accept() {
                committed += size;
            }
            assert!(committed <= MAX_TASK_BYTES);
        }
        assert_eq!(committed, MAX_TASK_BYTES);
    }
}
