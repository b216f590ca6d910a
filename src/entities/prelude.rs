pub use super::proposal_statuses::Entity as ProposalStatuses;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::users::Entity as Users;
