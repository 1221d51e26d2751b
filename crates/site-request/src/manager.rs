use sqlx::PgPool;
use tracing::info;

use db::models::deal::Deal;
use db::models::manager::Manager;

use crate::error::SiteRequestError;

/// Picks the manager with the fewest prospective-stage deals among the
/// configured assignment pool, breaking ties by `iteration_order` (spec
/// §4.9 step 2). Managers with zero deals are treated as equally loaded.
pub async fn least_loaded_manager(pool: &PgPool) -> Result<i64, SiteRequestError> {
    let managers = Manager::list_active_in_order(pool).await?;
    if managers.is_empty() {
        return Err(SiteRequestError::NoManagerAvailable);
    }

    let external_ids: Vec<i64> = managers.iter().map(|m| m.external_id).collect();
    let tally = Deal::tally_prospective_by_assigned(pool, &external_ids).await?;

    let chosen = managers
        .iter()
        .min_by_key(|m| tally.get(&m.external_id).copied().unwrap_or(0))
        .expect("managers is non-empty");

    info!(
        manager_external_id = chosen.external_id,
        deal_count = tally.get(&chosen.external_id).copied().unwrap_or(0),
        "selected least-loaded manager for site request"
    );
    Ok(chosen.external_id)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    #[test]
    fn tie_break_favors_lower_tally() {
        let mut tally: HashMap<i64, i64> = HashMap::new();
        tally.insert(33, 4);
        tally.insert(35, 1);
        tally.insert(13, 1);
        let ids = [33i64, 35, 13];
        let chosen = ids.iter().min_by_key(|id| tally.get(id).copied().unwrap_or(0)).copied();
        assert_eq!(chosen, Some(35));
    }
}
