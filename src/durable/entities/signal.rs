//! Inbound human decisions queued for a running workflow.
//!
//! Rows are produced by the signal surface (§4.5) and drained in FIFO order
//! by [`crate::durable::DurableStore::await_signal`].

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workflow_signals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub workflow_id: String,
    pub signal_type: String,
    pub payload_json: String,
    pub consumed: bool,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
