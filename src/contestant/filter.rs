use std::str::FromStr;

use super::types::{Committee, CommitteeId, Contestant};

/// Contestants a committee can still grade: assigned to it and not yet
/// submitted, in the order the store returned them.
pub fn committee_roster(contestants: &[Contestant], committee_id: &CommitteeId) -> Vec<Contestant> {
    contestants
        .iter()
        .filter(|c| &c.committee_id == committee_id && !c.submitted)
        .cloned()
        .collect()
}

/// Submission filter for the results listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Submitted,
    Pending,
}

impl StatusFilter {
    pub fn matches(&self, contestant: &Contestant) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Submitted => contestant.submitted,
            StatusFilter::Pending => !contestant.submitted,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "submitted" | "done" => Ok(StatusFilter::Submitted),
            "pending" => Ok(StatusFilter::Pending),
            other => Err(format!(
                "unknown status '{}' (expected all, submitted, pending)",
                other
            )),
        }
    }
}

/// Filter contestants for the administrator's results listing.
pub fn filter_results<'a>(
    contestants: &'a [Contestant],
    committee_id: Option<&CommitteeId>,
    status: StatusFilter,
) -> Vec<&'a Contestant> {
    contestants
        .iter()
        .filter(|c| committee_id.map_or(true, |id| &c.committee_id == id))
        .filter(|c| status.matches(c))
        .collect()
}

/// Committees that grade contestants (the admin pseudo-committee is hidden).
pub fn grading_committees(committees: &[Committee]) -> Vec<&Committee> {
    committees.iter().filter(|c| !c.is_admin()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contestant::ContestantId;
    use serde_json::json;

    fn contestant(id: &str, committee: &str, submitted: bool) -> Contestant {
        serde_json::from_value(json!({
            "id": id,
            "committee_id": committee,
            "submitted": submitted
        }))
        .unwrap()
    }

    #[test]
    fn test_roster_keeps_committee_and_unsubmitted_in_order() {
        let all = vec![
            contestant("P1", "1", false),
            contestant("P2", "2", false),
            contestant("P3", "1", true),
            contestant("P4", "1", false),
        ];

        let roster = committee_roster(&all, &CommitteeId::from("1"));
        let ids: Vec<&ContestantId> = roster.iter().map(|c| &c.id).collect();
        assert_eq!(ids, vec![&ContestantId::from("P1"), &ContestantId::from("P4")]);
    }

    #[test]
    fn test_roster_empty_for_unknown_committee() {
        let all = vec![contestant("P1", "1", false)];
        assert!(committee_roster(&all, &CommitteeId::from("9")).is_empty());
    }

    #[test]
    fn test_filter_results_by_committee_and_status() {
        let all = vec![
            contestant("P1", "1", false),
            contestant("P2", "2", true),
            contestant("P3", "1", true),
        ];

        assert_eq!(filter_results(&all, None, StatusFilter::All).len(), 3);
        assert_eq!(filter_results(&all, None, StatusFilter::Submitted).len(), 2);
        assert_eq!(filter_results(&all, None, StatusFilter::Pending).len(), 1);

        let committee = CommitteeId::from("1");
        let submitted = filter_results(&all, Some(&committee), StatusFilter::Submitted);
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].id, ContestantId::from("P3"));
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!(" Submitted ".parse::<StatusFilter>(), Ok(StatusFilter::Submitted));
        assert_eq!("pending".parse::<StatusFilter>(), Ok(StatusFilter::Pending));
        assert!("graded".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_grading_committees_hide_admin() {
        let committees: Vec<Committee> = serde_json::from_value(json!([
            { "Committee": "admin", "Password": "a" },
            { "Committee": "1", "Password": "b" }
        ]))
        .unwrap();

        let visible = grading_committees(&committees);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id.as_str(), "1");
    }
}
