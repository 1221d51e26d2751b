/// `status_deal` as reconciliation sees it. DB-authoritative: the engine
/// only ever recognizes these four shapes and treats anything else as an
/// unhandled status to log and skip (spec §9 Open Question 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealStatus {
    New,
    Accepted,
    DealLose,
    Other(String),
}

impl DealStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "NEW" => DealStatus::New,
            "ACCEPTED" => DealStatus::Accepted,
            "DEAL_LOSE" => DealStatus::DealLose,
            other => DealStatus::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> String {
        match self {
            DealStatus::New => "NEW".to_string(),
            DealStatus::Accepted => "ACCEPTED".to_string(),
            DealStatus::DealLose => "DEAL_LOSE".to_string(),
            DealStatus::Other(raw) => raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_statuses() {
        for raw in ["NEW", "ACCEPTED", "DEAL_LOSE"] {
            assert_eq!(DealStatus::from_wire(raw).as_wire(), raw);
        }
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status = DealStatus::from_wire("WON");
        assert_eq!(status, DealStatus::Other("WON".to_string()));
        assert_eq!(status.as_wire(), "WON");
    }
}
