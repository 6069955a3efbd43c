//! Turns a year range into checkpointed units of work.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use legisync_core::result::AppResult;
use legisync_database::CheckpointStore;
use legisync_entity::checkpoint::{Checkpoint, CheckpointMetadata, CheckpointStatus, DataType};
use legisync_entity::execution::BackfillRequest;

/// One unit of backfill work before it has a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedUnit {
    /// Category.
    pub data_type: DataType,
    /// Year, or `None` for the roster.
    pub year: Option<i32>,
}

/// Checkpoints to execute, in order.
#[derive(Debug, Clone, Default)]
pub struct BackfillPlan {
    /// Unfinished checkpoints from earlier runs, oldest first.
    pub resumed: Vec<Checkpoint>,
    /// Checkpoints created for this request.
    pub created: Vec<Checkpoint>,
    /// Units skipped because a completed checkpoint already covers them.
    pub skipped: usize,
}

impl BackfillPlan {
    /// Every checkpoint in execution order: resumed work first, then new
    /// work, both oldest first.
    pub fn into_checkpoints(self) -> Vec<Checkpoint> {
        let mut all = self.resumed;
        all.extend(self.created);
        all
    }

    /// Number of checkpoints to execute.
    pub fn len(&self) -> usize {
        self.resumed.len() + self.created.len()
    }

    /// Whether there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plans historical backfills.
#[derive(Debug, Clone)]
pub struct BackfillPlanner {
    checkpoints: Arc<dyn CheckpointStore>,
}

impl BackfillPlanner {
    /// Creates a new planner.
    pub fn new(checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self { checkpoints }
    }

    /// Units covered by a request, by priority then year: the roster,
    /// then bills per year, then expenses per year.
    pub fn units(request: &BackfillRequest) -> Vec<PlannedUnit> {
        let mut units = Vec::new();
        if request.categories.legislators {
            units.push(PlannedUnit {
                data_type: DataType::Legislators,
                year: None,
            });
        }
        if request.categories.bills {
            units.extend(request.years().map(|year| PlannedUnit {
                data_type: DataType::Bills,
                year: Some(year),
            }));
        }
        if request.categories.expenses {
            units.extend(request.years().map(|year| PlannedUnit {
                data_type: DataType::Expenses,
                year: Some(year),
            }));
        }
        units
    }

    /// Collect unfinished checkpoints, then create checkpoints for the
    /// units of `request` not already pending. Units whose latest
    /// checkpoint completed are skipped unless the request is forced.
    /// A failed unit gets a fresh checkpoint that picks up where the failed
    /// one stopped; forced requests start every unit from the beginning.
    pub async fn plan(&self, request: &BackfillRequest, execution_id: Option<Uuid>) -> AppResult<BackfillPlan> {
        let resumed = self.checkpoints.list_pending().await?;
        if !resumed.is_empty() {
            info!(count = resumed.len(), "Resuming unfinished checkpoints");
        }

        let mut plan = BackfillPlan {
            resumed,
            ..BackfillPlan::default()
        };

        for unit in Self::units(request) {
            if plan.resumed.iter().any(|cp| cp.covers(unit.data_type, unit.year)) {
                continue;
            }
            let mut failed = None;
            if !request.force {
                let latest = self
                    .checkpoints
                    .latest_for_unit(unit.data_type, unit.year)
                    .await?;
                match latest {
                    Some(cp) if cp.status == CheckpointStatus::Completed => {
                        debug!(data_type = %unit.data_type, year = ?unit.year, "Unit already completed");
                        plan.skipped += 1;
                        continue;
                    }
                    Some(cp) if cp.status == CheckpointStatus::Failed => failed = Some(cp),
                    _ => {}
                }
            }

            let metadata = CheckpointMetadata {
                year: unit.year,
                priority: unit.data_type.priority(),
                execution_id,
            };
            let mut checkpoint = self.checkpoints.create(unit.data_type, metadata).await?;
            if let Some(previous) = failed.filter(|cp| cp.progress.processed_items > 0) {
                checkpoint.seed_from(&previous)?;
                self.checkpoints.update(&checkpoint).await?;
                info!(
                    unit = %checkpoint.unit_label(),
                    failed_checkpoint = %previous.id,
                    processed = checkpoint.progress.processed_items,
                    "Retrying failed unit from its last position"
                );
            }
            plan.created.push(checkpoint);
        }

        info!(
            resumed = plan.resumed.len(),
            created = plan.created.len(),
            skipped = plan.skipped,
            "Backfill planned"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legisync_core::config::CategoryToggles;

    #[test]
    fn test_units_are_ordered_by_priority_then_year() {
        let request = BackfillRequest::new(2022, 2023, "test");
        let units = BackfillPlanner::units(&request);
        let labels: Vec<_> = units
            .iter()
            .map(|u| (u.data_type.priority(), u.year))
            .collect();
        assert_eq!(
            labels,
            vec![(1, None), (2, Some(2022)), (2, Some(2023)), (3, Some(2022)), (3, Some(2023))]
        );
    }

    #[test]
    fn test_units_respect_category_toggles() {
        let mut request = BackfillRequest::new(2024, 2024, "test");
        request.categories = CategoryToggles {
            legislators: false,
            bills: true,
            expenses: false,
            votes: true,
        };
        let units = BackfillPlanner::units(&request);
        assert_eq!(
            units,
            vec![PlannedUnit {
                data_type: DataType::Bills,
                year: Some(2024)
            }]
        );
    }
}
