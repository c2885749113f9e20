use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "incomplete")]
    #[sqlx(rename = "incomplete")]
    Incomplete,
    #[serde(rename = "complete")]
    #[sqlx(rename = "complete")]
    Complete,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Incomplete => write!(f, "incomplete"),
            TaskStatus::Complete => write!(f, "complete"),
        }
    }
}

/// Assignment/completion state layered over a checklist item, keyed by the
/// item's stable id. Checklist items themselves are regenerated whenever trip
/// attributes change; this row is what survives regeneration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub trip_id: String,
    pub task_id: String,
    pub status: TaskStatus,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<String>,
    pub completed_by: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskAssignment {
    pub fn new(trip_id: String, task_id: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            trip_id,
            task_id,
            status: TaskStatus::Incomplete,
            assigned_to: None,
            assigned_by: None,
            assigned_at: None,
            completed_by: None,
            completed_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Unconditionally (re-)assign. Any prior assignee is replaced outright;
    /// a task never has more than one active assignee.
    pub fn assign(&mut self, assigned_to: String, assigned_by: String) {
        let now = Utc::now().to_rfc3339();
        self.assigned_to = Some(assigned_to);
        self.assigned_by = Some(assigned_by);
        self.assigned_at = Some(now.clone());
        self.updated_at = now;
    }

    /// Clear the assignment. Completion history stays: who finished a task is
    /// audit data, independent of whether anyone currently owns it.
    pub fn unassign(&mut self) {
        self.assigned_to = None;
        self.assigned_by = None;
        self.assigned_at = None;
        self.updated_at = Utc::now().to_rfc3339();
    }

    pub fn complete(&mut self, completed_by: String) {
        let now = Utc::now().to_rfc3339();
        self.status = TaskStatus::Complete;
        self.completed_by = Some(completed_by);
        self.completed_at = Some(now.clone());
        self.updated_at = now;
    }

    pub fn uncomplete(&mut self) {
        self.status = TaskStatus::Incomplete;
        self.completed_by = None;
        self.completed_at = None;
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// Comments are append-only; there is no edit or delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskComment {
    pub id: String,
    pub trip_id: String,
    pub task_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
}

impl TaskComment {
    pub fn new(
        trip_id: String,
        task_id: String,
        author_id: String,
        author_name: String,
        content: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trip_id,
            task_id,
            author_id,
            author_name,
            content,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A base checklist item as supplied by the (external) checklist generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessItem {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub category: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub is_custom: bool,
}

/// A checklist item with the assignment ledger overlaid on top.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedReadinessItem {
    #[serde(flatten)]
    pub item: ReadinessItem,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<String>,
    pub completed_by: Option<String>,
    pub completed_at: Option<String>,
    pub comments: Vec<TaskComment>,
}

/// Overlay ledger state onto base items. Purely derived: the base slice is
/// never mutated, items without ledger rows pass through with empty overlay.
pub fn enhance_items(
    base: &[ReadinessItem],
    assignments: &[TaskAssignment],
    comments: &[TaskComment],
) -> Vec<EnhancedReadinessItem> {
    base.iter()
        .map(|item| {
            let ledger = assignments.iter().find(|a| a.task_id == item.id);
            let mut enhanced = EnhancedReadinessItem {
                item: item.clone(),
                assigned_to: None,
                assigned_by: None,
                assigned_at: None,
                completed_by: None,
                completed_at: None,
                comments: comments
                    .iter()
                    .filter(|c| c.task_id == item.id)
                    .cloned()
                    .collect(),
            };
            if let Some(a) = ledger {
                enhanced.item.status = a.status;
                enhanced.assigned_to = a.assigned_to.clone();
                enhanced.assigned_by = a.assigned_by.clone();
                enhanced.assigned_at = a.assigned_at.clone();
                enhanced.completed_by = a.completed_by.clone();
                enhanced.completed_at = a.completed_at.clone();
            }
            enhanced
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTaskStats {
    pub assigned: usize,
    pub completed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub completed: usize,
    pub overdue: usize,
    pub by_member: BTreeMap<String, MemberTaskStats>,
}

/// Aggregate counts over an enhanced item list. An urgent item that is still
/// incomplete counts as overdue.
pub fn task_stats(items: &[EnhancedReadinessItem]) -> TaskStats {
    let mut stats = TaskStats {
        total: items.len(),
        ..Default::default()
    };

    for item in items {
        let completed = item.item.status == TaskStatus::Complete;
        if completed {
            stats.completed += 1;
        } else if item.item.urgent {
            stats.overdue += 1;
        }

        match &item.assigned_to {
            Some(member) => {
                stats.assigned += 1;
                let entry = stats.by_member.entry(member.clone()).or_default();
                entry.assigned += 1;
                if !completed {
                    entry.pending += 1;
                }
            }
            None => stats.unassigned += 1,
        }

        if let Some(member) = &item.completed_by {
            stats.by_member.entry(member.clone()).or_default().completed += 1;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, urgent: bool) -> ReadinessItem {
        ReadinessItem {
            id: id.to_string(),
            title: format!("Task {id}"),
            subtitle: None,
            category: "documents".to_string(),
            status: TaskStatus::Incomplete,
            urgent,
            is_custom: false,
        }
    }

    fn assignment(task_id: &str) -> TaskAssignment {
        TaskAssignment::new("trip-1".to_string(), task_id.to_string())
    }

    #[test]
    fn reassign_replaces_assignee_outright() {
        let mut a = assignment("t1");
        a.assign("alice@x.com".to_string(), "owner@x.com".to_string());
        a.assign("bob@x.com".to_string(), "owner@x.com".to_string());
        assert_eq!(a.assigned_to.as_deref(), Some("bob@x.com"));

        // Unassign-then-reassign lands in the same state as a direct reassign.
        let mut b = assignment("t1");
        b.assign("alice@x.com".to_string(), "owner@x.com".to_string());
        b.unassign();
        b.assign("bob@x.com".to_string(), "owner@x.com".to_string());
        assert_eq!(b.assigned_to, a.assigned_to);
        assert_eq!(b.assigned_by, a.assigned_by);
    }

    #[test]
    fn unassign_preserves_completion_history() {
        let mut a = assignment("t1");
        a.assign("alice@x.com".to_string(), "owner@x.com".to_string());
        a.complete("alice@x.com".to_string());
        a.unassign();

        assert_eq!(a.assigned_to, None);
        assert_eq!(a.assigned_by, None);
        assert_eq!(a.assigned_at, None);
        assert_eq!(a.status, TaskStatus::Complete);
        assert_eq!(a.completed_by.as_deref(), Some("alice@x.com"));
        assert!(a.completed_at.is_some());
    }

    #[test]
    fn uncomplete_clears_completion_keeps_assignment() {
        let mut a = assignment("t1");
        a.assign("alice@x.com".to_string(), "owner@x.com".to_string());
        a.complete("alice@x.com".to_string());
        a.uncomplete();

        assert_eq!(a.status, TaskStatus::Incomplete);
        assert_eq!(a.completed_by, None);
        assert_eq!(a.completed_at, None);
        assert_eq!(a.assigned_to.as_deref(), Some("alice@x.com"));
    }

    #[test]
    fn enhance_overlays_without_touching_base() {
        let base = vec![item("t1", false), item("t2", false)];
        let mut a = assignment("t1");
        a.assign("alice@x.com".to_string(), "owner@x.com".to_string());
        a.complete("alice@x.com".to_string());
        let comment = TaskComment::new(
            "trip-1".to_string(),
            "t1".to_string(),
            "alice@x.com".to_string(),
            "Alice".to_string(),
            "done!".to_string(),
        );

        let enhanced = enhance_items(&base, &[a], &[comment]);

        assert_eq!(enhanced[0].item.status, TaskStatus::Complete);
        assert_eq!(enhanced[0].assigned_to.as_deref(), Some("alice@x.com"));
        assert_eq!(enhanced[0].comments.len(), 1);
        assert_eq!(enhanced[1].assigned_to, None);
        assert!(enhanced[1].comments.is_empty());

        // Base items are read-only input.
        assert_eq!(base[0].status, TaskStatus::Incomplete);
    }

    #[test]
    fn stats_count_members_and_overdue() {
        let base = vec![item("t1", true), item("t2", false), item("t3", true)];
        let mut a1 = assignment("t1");
        a1.assign("alice@x.com".to_string(), "owner@x.com".to_string());
        let mut a2 = assignment("t2");
        a2.assign("alice@x.com".to_string(), "owner@x.com".to_string());
        a2.complete("alice@x.com".to_string());

        let enhanced = enhance_items(&base, &[a1, a2], &[]);
        let stats = task_stats(&enhanced);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.assigned, 2);
        assert_eq!(stats.unassigned, 1);
        assert_eq!(stats.completed, 1);
        // t1 (urgent, incomplete) and t3 (urgent, incomplete) are overdue.
        assert_eq!(stats.overdue, 2);

        let alice = &stats.by_member["alice@x.com"];
        assert_eq!(alice.assigned, 2);
        assert_eq!(alice.completed, 1);
        assert_eq!(alice.pending, 1);
    }
}
