//! `SeaORM` Entity for subscriptions table
//!
//! Both `proposal_id` and `user_id` carry unique constraints in the schema.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(unique)]
    pub proposal_id: Option<i32>,
    #[sea_orm(unique)]
    pub user_id: Option<Uuid>,
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::proposal_statuses::Entity",
        from = "Column::ProposalId",
        to = "super::proposal_statuses::Column::ProposalId"
    )]
    ProposalStatuses,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Uuid"
    )]
    Users,
}

impl Related<super::proposal_statuses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProposalStatuses.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
