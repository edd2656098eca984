//! Runtime id management.
//!
//! Task ids follow the form `<stage>-<index>-<attempt>`, where `index` is the
//! shard within the stage and `attempt` counts retries. Control-message ids
//! are process-wide unique and monotonically increasing.

use crate::{PlanError, Result};
use std::sync::atomic::{AtomicI64, Ordering};

static NEXT_MESSAGE_ID: AtomicI64 = AtomicI64::new(1);

/// Compose a task id from its stage id, shard index and attempt number.
pub fn generate_task_id(stage_id: &str, index: u32, attempt: u32) -> String {
    format!("{stage_id}-{index}-{attempt}")
}

/// The shard index encoded in `task_id`.
pub fn task_index(task_id: &str) -> Result<u32> {
    let mut parts = task_id.rsplitn(3, '-');
    let _attempt = parts
        .next()
        .ok_or_else(|| PlanError::MalformedTaskId(task_id.to_string()))?;
    let index = parts
        .next()
        .ok_or_else(|| PlanError::MalformedTaskId(task_id.to_string()))?;
    index
        .parse()
        .map_err(|_| PlanError::MalformedTaskId(task_id.to_string()))
}

/// The stage id encoded in `task_id`.
pub fn stage_id(task_id: &str) -> Result<&str> {
    task_id
        .rsplitn(3, '-')
        .nth(2)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PlanError::MalformedTaskId(task_id.to_string()))
}

/// A fresh process-wide unique control-message id.
pub fn generate_message_id() -> i64 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_round_trip() {
        let task_id = generate_task_id("Stage2", 3, 0);
        assert_eq!(task_id, "Stage2-3-0");
        assert_eq!(task_index(&task_id).unwrap(), 3);
        assert_eq!(stage_id(&task_id).unwrap(), "Stage2");
    }

    #[test]
    fn test_stage_id_may_contain_dashes() {
        let task_id = generate_task_id("map-stage-7", 1, 2);
        assert_eq!(task_index(&task_id).unwrap(), 1);
        assert_eq!(stage_id(&task_id).unwrap(), "map-stage-7");
    }

    #[test]
    fn test_malformed_task_id() {
        assert!(task_index("no_separators").is_err());
        assert!(task_index("stage-x-0").is_err());
        assert!(stage_id("3-0").is_err());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = generate_message_id();
        let b = generate_message_id();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
