//! Memoized results of durable steps, keyed by `(workflow_id, checkpoint_key)`.
//!
//! A step that has already produced a checkpoint is never re-run after a
//! crash; [`crate::durable::DurableStore::run_checkpointed`] reads the
//! stored payload back instead.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workflow_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub workflow_id: String,
    pub checkpoint_key: String,
    pub payload_json: String,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
