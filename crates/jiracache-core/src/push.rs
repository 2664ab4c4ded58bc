use jiracache_protocol::Push;

use crate::selection::{Ctx, SelectionController};

/// Applies one server-initiated message. Returns whether anything the user
/// can see changed.
pub fn dispatch(push: Push, selection: &mut SelectionController, ctx: &mut Ctx<'_>) -> bool {
    match push {
        Push::Update(issue) => {
            let key = issue.key.clone();
            ctx.cache.merge(issue);
            selection.refresh_from_cache(&key, ctx.cache)
        }
        Push::UpdateRaw(issue) => selection.apply_raw_update(issue),
        Push::UpdateSearch { query, entries } => {
            selection.apply_search_update(&query, entries, ctx)
        }
        Push::Unknown { tag } => {
            tracing::debug!(%tag, "ignoring unknown push");
            false
        }
    }
}
