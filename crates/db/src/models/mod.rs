pub mod additional_info;
pub mod communication_channel;
pub mod company;
pub mod contact;
pub mod deal;
pub mod deal_stage;
pub mod department;
pub mod lead;
pub mod manager;
pub mod product;
pub mod product_agreement_supervisor;
pub mod product_line;
pub mod timeline_comment;
pub mod user;

pub use additional_info::AdditionalInfo;
pub use communication_channel::{ChannelKind, CommunicationChannel, CommunicationChannelType};
pub use company::Company;
pub use contact::Contact;
pub use deal::Deal;
pub use deal_stage::{DealStage, SemanticStage};
pub use department::Department;
pub use lead::Lead;
pub use manager::Manager;
pub use product::Product;
pub use product_agreement_supervisor::ProductAgreementSupervisor;
pub use product_line::ProductLine;
pub use timeline_comment::TimelineComment;
pub use user::User;
