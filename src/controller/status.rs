//! Status state machine.
//!
//! Pure operations on [`RedisFailoverStatus`]: phase changes, the bounded
//! condition history and the recorded master. Nothing here performs I/O;
//! callers persist the status afterwards.

use jiff::Timestamp;

use crate::crd::{Condition, ConditionType, Phase, RedisFailoverStatus};

/// Maximum number of conditions kept in the history.
pub const MAX_CONDITIONS: usize = 10;

/// Reason recorded when only resources changed.
pub const RESOURCES_CHANGED_REASON: &str = "Change the resources/limits";

impl RedisFailoverStatus {
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn set_master(&mut self, master: impl Into<String>) {
        self.master = master.into();
    }

    /// Append a Ready condition unless the history already ends with one.
    pub fn set_ready_condition(&mut self) {
        self.append_coalesced(ConditionType::Ready);
    }

    /// Append a NotReady condition unless the history already ends with one.
    pub fn set_not_ready_condition(&mut self) {
        self.append_coalesced(ConditionType::NotReady);
    }

    pub fn append_updating_redis_condition(&mut self, reason: &str) {
        self.append_condition(ConditionType::UpdatingRedis, reason.to_string());
    }

    pub fn append_updating_sentinel_condition(&mut self, reason: &str) {
        self.append_condition(ConditionType::UpdatingSentinel, reason.to_string());
    }

    pub fn append_scaling_redis_up_condition(&mut self, from: i32, to: i32) {
        self.append_condition(ConditionType::ScalingRedisUp, scaling_reason(from, to));
    }

    pub fn append_scaling_redis_down_condition(&mut self, from: i32, to: i32) {
        self.append_condition(ConditionType::ScalingRedisDown, scaling_reason(from, to));
    }

    pub fn append_scaling_sentinel_up_condition(&mut self, from: i32, to: i32) {
        self.append_condition(ConditionType::ScalingSentinelUp, scaling_reason(from, to));
    }

    pub fn append_scaling_sentinel_down_condition(&mut self, from: i32, to: i32) {
        self.append_condition(
            ConditionType::ScalingSentinelDown,
            scaling_reason(from, to),
        );
    }

    /// Most recent condition, if any.
    pub fn last_condition(&self) -> Option<&Condition> {
        self.conditions.last()
    }

    pub fn is_last_condition_ready(&self) -> bool {
        self.last_condition()
            .is_some_and(|c| c.r#type == ConditionType::Ready)
    }

    fn append_coalesced(&mut self, condition_type: ConditionType) {
        if self
            .last_condition()
            .is_some_and(|c| c.r#type == condition_type)
        {
            return;
        }
        self.append_condition(condition_type, String::new());
    }

    /// Push a condition, evicting the oldest entries beyond [`MAX_CONDITIONS`].
    fn append_condition(&mut self, condition_type: ConditionType, reason: String) {
        self.conditions.push(Condition {
            r#type: condition_type,
            reason,
            transition_time: Timestamp::now().to_string(),
        });
        if self.conditions.len() > MAX_CONDITIONS {
            let excess = self.conditions.len() - MAX_CONDITIONS;
            self.conditions.drain(..excess);
        }
    }
}

fn scaling_reason(from: i32, to: i32) -> String {
    format!("Current size: {}, desired size: {}", from, to)
}
