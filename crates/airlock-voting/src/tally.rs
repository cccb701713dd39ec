//! Tally rules over revealed votes (spec §4.3). Thresholds are supplied by
//! the caller's `Config` rather than hard-coded, but the arithmetic matches
//! the spec's defaults exactly (`approval_threshold=7`, `rejection_threshold=4`).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TallyOutcome {
    Pending,
    Approved,
    Rejected,
}

/// Running counts over a guardian set of fixed size `guardian_count`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub approve: u8,
    pub reject: u8,
    pub abstain: u8,
}

impl Tally {
    pub fn revealed(&self) -> u8 {
        self.approve + self.reject + self.abstain
    }

    pub fn pending(&self, guardian_count: u8) -> u8 {
        guardian_count.saturating_sub(self.revealed())
    }

    /// Approved iff `approve >= approval_threshold`; rejected iff
    /// `reject > guardian_count - approval_threshold` (i.e.
    /// `reject >= rejection_threshold`); otherwise still pending. Both
    /// conditions can never hold simultaneously since the thresholds sum to
    /// `guardian_count + 1` (spec §4.3, "ties are impossible by construction").
    pub fn outcome(&self, approval_threshold: u8, rejection_threshold: u8) -> TallyOutcome {
        if self.approve >= approval_threshold {
            TallyOutcome::Approved
        } else if self.reject >= rejection_threshold {
            TallyOutcome::Rejected
        } else {
            TallyOutcome::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_threshold_approval_is_sufficient() {
        let tally = Tally {
            approve: 7,
            reject: 0,
            abstain: 0,
        };
        assert_eq!(tally.outcome(7, 4), TallyOutcome::Approved);
    }

    #[test]
    fn exactly_one_over_threshold_rejection_is_sufficient() {
        let tally = Tally {
            approve: 0,
            reject: 4,
            abstain: 0,
        };
        assert_eq!(tally.outcome(7, 4), TallyOutcome::Rejected);
    }

    #[test]
    fn below_both_thresholds_is_pending() {
        let tally = Tally {
            approve: 6,
            reject: 3,
            abstain: 1,
        };
        assert_eq!(tally.outcome(7, 4), TallyOutcome::Pending);
    }

    #[test]
    fn pending_counts_down_from_guardian_count() {
        let tally = Tally {
            approve: 3,
            reject: 1,
            abstain: 0,
        };
        assert_eq!(tally.pending(10), 6);
    }
}
