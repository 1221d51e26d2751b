use std::fmt;

/// Every entity kind named in the data model (spec §3). Used as the `Kind`
/// half of the `(Kind, external_id)` keys the coordination cache and the
/// ingest pipeline pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Deal,
    Lead,
    Company,
    Contact,
    User,
    Product,
    ProductLine,
    TimelineComment,
    CommunicationChannel,
    CommunicationChannelType,
    DealStage,
    Department,
    Manager,
    AdditionalInfo,
    ProductAgreementSupervisor,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Deal => "Deal",
            EntityKind::Lead => "Lead",
            EntityKind::Company => "Company",
            EntityKind::Contact => "Contact",
            EntityKind::User => "User",
            EntityKind::Product => "Product",
            EntityKind::ProductLine => "ProductLine",
            EntityKind::TimelineComment => "TimelineComment",
            EntityKind::CommunicationChannel => "CommunicationChannel",
            EntityKind::CommunicationChannelType => "CommunicationChannelType",
            EntityKind::DealStage => "DealStage",
            EntityKind::Department => "Department",
            EntityKind::Manager => "Manager",
            EntityKind::AdditionalInfo => "AdditionalInfo",
            EntityKind::ProductAgreementSupervisor => "ProductAgreementSupervisor",
        };
        write!(f, "{name}")
    }
}
