//! Batch delete/restore of polymorphic children owned by one entity.
//!
//! A morph relation named `commentable` stores the owner in
//! `commentable_type` (the owner's `morph_type()`) and `commentable_id`.
//! Rows are handled one at a time so per-entity hooks run for each.

use crate::error::{RepoError, RepoResult};
use crate::model::entity::{Entity, EntityId};
use crate::repo::repository::{ensure_soft_deletes, Repository};
use log::info;

impl<E: Entity> Repository<'_, E> {
    /// Deletes every row of `relation` owned by `owner`; returns how many
    /// rows were actually deleted.
    ///
    /// Predicates already on the builder narrow the match further.
    pub fn delete_morphs_by_entity<O: Entity>(
        &mut self,
        owner: &O,
        relation: &str,
        force_delete: bool,
    ) -> RepoResult<usize> {
        let owner_id = match morph_owner_id(owner, relation) {
            Ok(owner_id) => owner_id,
            Err(err) => {
                self.reset_builder();
                return Err(err);
            }
        };
        self.scope_to_owner::<O>(relation, owner_id);
        let children = self.get(&[])?;

        let mut deleted = 0;
        for child in &children {
            let done = if force_delete {
                self.force_delete_entity(child)?
            } else {
                self.delete_entity(child)?
            };
            if done {
                deleted += 1;
            }
        }

        info!(
            "event=morph_delete module=repo status=ok table={} relation={} owner_type={} matched={} deleted={} force={}",
            E::table_name(),
            relation,
            O::morph_type(),
            children.len(),
            deleted,
            force_delete
        );
        Ok(deleted)
    }

    /// Restores every trashed row of `relation` owned by `owner`; returns
    /// how many rows were restored.
    ///
    /// # Errors
    /// - `ModelNotSoftDeletable` when `E` lacks soft delete.
    pub fn restore_morphs_by_entity<O: Entity>(
        &mut self,
        owner: &O,
        relation: &str,
    ) -> RepoResult<usize> {
        let owner_id = match morph_owner_id(owner, relation)
            .and_then(|owner_id| ensure_soft_deletes::<E>().map(|_| owner_id))
        {
            Ok(owner_id) => owner_id,
            Err(err) => {
                self.reset_builder();
                return Err(err);
            }
        };
        self.only_trashed()?;
        self.scope_to_owner::<O>(relation, owner_id);
        let children = self.get(&[])?;

        let mut restored = 0;
        for child in &children {
            if self.restore_entity(child)? {
                restored += 1;
            }
        }

        info!(
            "event=morph_restore module=repo status=ok table={} relation={} owner_type={} matched={} restored={}",
            E::table_name(),
            relation,
            O::morph_type(),
            children.len(),
            restored
        );
        Ok(restored)
    }

    fn scope_to_owner<O: Entity>(&mut self, relation: &str, owner_id: EntityId) {
        let type_column = format!("{relation}_type");
        let id_column = format!("{relation}_id");
        self.where_group(|group| {
            group
                .where_eq(&type_column, O::morph_type().to_string())
                .where_eq(&id_column, owner_id);
        });
    }
}

fn morph_owner_id<O: Entity>(owner: &O, relation: &str) -> RepoResult<EntityId> {
    owner.id().ok_or_else(|| {
        RepoError::InvalidArgument(format!(
            "owner [{}] of relation `{relation}` has no id",
            O::table_name()
        ))
    })
}
